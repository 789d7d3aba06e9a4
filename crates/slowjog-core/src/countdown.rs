//! Countdown engine.
//!
//! The engine is a small state machine over [`RunState`]. It does not own a
//! timer: whoever drives it arms a one-second ticker while
//! [`CountdownEngine::needs_ticker`] is true and calls
//! [`CountdownEngine::tick`] from it.
//!
//! Every command goes through [`transition`], a total table over
//! `(RunState, Command)`. Commands that make no sense in the current state
//! are ignored and reported back as [`Outcome::Ignored`]; they never fail.
//!
//! ```
//! use slowjog_core::{CountdownEngine, Outcome, RunState};
//!
//! let mut engine = CountdownEngine::default();
//! engine.configure(0, 2);
//! engine.start();
//! engine.tick();
//! let outcome = engine.tick();
//!
//! assert!(matches!(outcome, Outcome::Completed(ref r) if r.duration_sec() == 2));
//! assert_eq!(engine.state(), RunState::Idle);
//! ```

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{SystemClock, WallClock};
use crate::format::format_duration;
use crate::records::SessionRecord;

/// Interval of the driving ticker, in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 1_000;

/// Run state of a countdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Configure,
    Start,
    Tick,
    Expire,
    Pause,
    Reset,
}

/// Result of looking up a command in the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the given state.
    Apply(RunState),
    /// Leave the state untouched.
    Ignore(&'static str),
}

/// The transition table.
pub fn transition(state: RunState, command: Command) -> Transition {
    use Command as C;
    use RunState::{Idle, Paused, Running};
    use Transition::{Apply, Ignore};

    match (state, command) {
        (Running, C::Configure) => Ignore("cannot reconfigure a running countdown"),
        (Idle | Paused, C::Configure) => Apply(Idle),

        (Running, C::Start) => Ignore("countdown already running"),
        (Idle | Paused, C::Start) => Apply(Running),

        (Running, C::Tick) => Apply(Running),
        (Idle | Paused, C::Tick) => Ignore("countdown not running"),

        (Running, C::Expire) => Apply(Idle),
        (Idle | Paused, C::Expire) => Ignore("countdown not running"),

        (Running, C::Pause) => Apply(Paused),
        (Idle | Paused, C::Pause) => Ignore("countdown not running"),

        (Idle | Running | Paused, C::Reset) => Apply(Idle),
    }
}

/// Decrements a remaining-seconds value, flooring at zero.
pub fn tick(remaining: u64) -> u64 {
    remaining.saturating_sub(1)
}

/// What a command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command was accepted; the engine is now in `state`.
    Applied { state: RunState },
    /// The command was not valid in the current state.
    Ignored { reason: &'static str },
    /// The countdown reached zero and produced a record.
    Completed(SessionRecord),
}

impl Outcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }

    /// The completed record, if any.
    pub fn record(&self) -> Option<&SessionRecord> {
        match self {
            Self::Completed(record) => Some(record),
            _ => None,
        }
    }
}

/// Point-in-time view of the engine for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub total_seconds: u64,
    pub remaining_seconds: u64,
    pub state: RunState,
    pub display: String,
}

/// Countdown state owned by one controller.
#[derive(Debug)]
pub struct CountdownEngine<C = SystemClock> {
    total_seconds: u64,
    remaining_seconds: u64,
    state: RunState,
    clock: C,
    ids: RecordIds,
}

impl Default for CountdownEngine<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: WallClock> CountdownEngine<C> {
    /// Creates an idle engine with a zero duration.
    pub fn new(clock: C) -> Self {
        Self {
            total_seconds: 0,
            remaining_seconds: 0,
            state: RunState::Idle,
            clock,
            ids: RecordIds::default(),
        }
    }

    /// Sets the duration from minutes and seconds.
    ///
    /// Minutes below zero become zero; seconds are clamped to `0..=59`. The
    /// remaining time is reset to the new total.
    pub fn configure(&mut self, minutes: i64, seconds: i64) -> Outcome {
        let next = match self.check(Command::Configure) {
            Ok(next) => next,
            Err(ignored) => return ignored,
        };
        let minutes = minutes.max(0).unsigned_abs();
        let seconds = seconds.clamp(0, 59).unsigned_abs();
        self.total_seconds = minutes.saturating_mul(60).saturating_add(seconds);
        self.remaining_seconds = self.total_seconds;
        self.state = next;
        debug!(total = self.total_seconds, "countdown configured");
        Outcome::Applied { state: next }
    }

    /// Starts or resumes the countdown.
    pub fn start(&mut self) -> Outcome {
        let next = match self.check(Command::Start) {
            Ok(next) => next,
            Err(ignored) => return ignored,
        };
        if self.remaining_seconds == 0 {
            debug!("start ignored: nothing left to count down");
            return Outcome::Ignored {
                reason: "nothing left to count down",
            };
        }
        let resumed = self.state == RunState::Paused;
        self.state = next;
        info!(remaining = self.remaining_seconds, resumed, "countdown started");
        Outcome::Applied { state: next }
    }

    /// Advances the countdown by one second.
    ///
    /// Reaching zero returns the engine to idle, restores the configured
    /// duration, and yields the completed record.
    pub fn tick(&mut self) -> Outcome {
        let next = match self.check(Command::Tick) {
            Ok(next) => next,
            Err(ignored) => return ignored,
        };
        self.remaining_seconds = tick(self.remaining_seconds);
        if self.remaining_seconds > 0 {
            self.state = next;
            return Outcome::Applied { state: next };
        }
        self.expire()
    }

    /// Pauses a running countdown, keeping the remaining time.
    pub fn pause(&mut self) -> Outcome {
        let next = match self.check(Command::Pause) {
            Ok(next) => next,
            Err(ignored) => return ignored,
        };
        self.state = next;
        info!(remaining = self.remaining_seconds, "countdown paused");
        Outcome::Applied { state: next }
    }

    /// Stops the countdown and restores the configured duration.
    ///
    /// No record is produced.
    pub fn reset(&mut self) -> Outcome {
        let next = match self.check(Command::Reset) {
            Ok(next) => next,
            Err(ignored) => return ignored,
        };
        self.state = next;
        self.remaining_seconds = self.total_seconds;
        debug!(total = self.total_seconds, "countdown reset");
        Outcome::Applied { state: next }
    }

    /// True while the driver should keep its one-second ticker armed.
    pub fn needs_ticker(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn total_seconds(&self) -> u64 {
        self.total_seconds
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            total_seconds: self.total_seconds,
            remaining_seconds: self.remaining_seconds,
            state: self.state,
            display: format_duration(self.remaining_seconds),
        }
    }

    fn expire(&mut self) -> Outcome {
        let next = match self.check(Command::Expire) {
            Ok(next) => next,
            Err(ignored) => return ignored,
        };
        let ended_at = self.clock.now();
        let id = self.ids.next(ended_at.timestamp_millis());
        let record = SessionRecord::completed(id, self.total_seconds, ended_at);
        self.state = next;
        self.remaining_seconds = self.total_seconds;
        info!(id = record.id(), duration = record.duration_sec(), "countdown completed");
        Outcome::Completed(record)
    }

    fn check(&self, command: Command) -> Result<RunState, Outcome> {
        match transition(self.state, command) {
            Transition::Apply(next) => Ok(next),
            Transition::Ignore(reason) => {
                debug!(state = %self.state, ?command, reason, "command ignored");
                Err(Outcome::Ignored { reason })
            }
        }
    }
}

/// Issues `r<millis>` identifiers, suffixing `-n` when two records finish in
/// the same millisecond.
#[derive(Debug, Default)]
struct RecordIds {
    last_millis: Option<i64>,
    repeats: u32,
}

impl RecordIds {
    fn next(&mut self, millis: i64) -> String {
        if self.last_millis == Some(millis) {
            self.repeats += 1;
            format!("r{millis}-{}", self.repeats)
        } else {
            self.last_millis = Some(millis);
            self.repeats = 0;
            format!("r{millis}")
        }
    }
}
