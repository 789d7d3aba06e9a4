//! Core of slowjog: the countdown engine, the session record store, the
//! lookahead metronome scheduler, and clock-face formatting.
//!
//! Nothing in this crate owns a timer or touches the network. Front ends
//! drive the state machines from their own event loops.

pub mod clock;
pub mod countdown;
pub mod format;
pub mod metronome;
pub mod records;
pub mod tracing;

pub use clock::{ManualClock, SystemClock, WallClock};
pub use countdown::{
    Command, CountdownEngine, Outcome, RunState, Snapshot, TICK_INTERVAL_MS, Transition, tick,
    transition,
};
pub use format::{
    export_description, export_title, format_duration, format_time, iso_millis, parse_time,
};
pub use metronome::{
    AudioOutput, DEFAULT_LOOKAHEAD, DEFAULT_SCHEDULE_AHEAD_SECS, DEFAULT_TEMPO_BPM,
    MAX_BEATS_PER_POLL, MAX_SCHEDULE_AHEAD_SECS, MAX_TEMPO_BPM, Metronome, MetronomeConfig,
    MetronomeError,
};
pub use records::{SessionRecord, SessionStore};
pub use crate::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
