//! The terminal controller: one owner for the countdown engine, the record
//! store and the metronome, fed by typed commands.
//!
//! Nothing here waits or spawns. [`crate::commands::run`] owns the event
//! loop: it feeds parsed input to [`Controller::apply`], calls
//! [`Controller::on_tick`] from the one-second ticker while
//! [`Controller::needs_ticker`] holds, and [`Controller::poll_metronome`]
//! from the lookahead loop while the metronome plays.

use std::str::FromStr;

use chrono::Local;
use slowjog_core::{
    AudioOutput, CountdownEngine, Metronome, Outcome, SessionRecord, SessionStore, SystemClock,
    WallClock, format_duration, parse_time,
};
use slowjog_protocol::{CreateEventRequest, CreateEventResponse};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

pub const HELP: &str = "\
commands:
  start | s            start or resume the countdown
  pause | p            pause the countdown
  reset | r            stop and restore the configured duration
  set MM:SS | set M S  configure the duration (not while running)
  metro | m            start or stop the metronome
  tempo BPM            change the metronome tempo
  list | l             list completed sessions, most recent first
  export | e [N]       export session N (default: the latest) to Google Calendar
  status               show the countdown
  help | h             this text
  quit | q             leave";

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Start,
    Pause,
    Reset,
    Set { minutes: i64, seconds: i64 },
    Metronome,
    Tempo(f64),
    List,
    /// 1-based position in the list; `None` means the latest record.
    Export(Option<usize>),
    Status,
    Help,
    Quit,
}

impl FromStr for Input {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Self::Status);
        };
        let args: Vec<&str> = words.collect();
        let input = match (command.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("start" | "s", []) => Self::Start,
            ("pause" | "p", []) => Self::Pause,
            ("reset" | "r", []) => Self::Reset,
            ("set", [clock]) => {
                let total = parse_time(clock)
                    .ok_or_else(|| format!("expected MM:SS, got {:?}", clock))?;
                Self::Set {
                    minutes: i64::try_from(total / 60).map_err(|e| e.to_string())?,
                    seconds: (total % 60) as i64,
                }
            }
            ("set", [minutes, seconds]) => Self::Set {
                minutes: parse_number(minutes)?,
                seconds: parse_number(seconds)?,
            },
            ("metro" | "m", []) => Self::Metronome,
            ("tempo", [bpm]) => Self::Tempo(
                bpm.parse()
                    .map_err(|_| format!("expected a tempo in BPM, got {:?}", bpm))?,
            ),
            ("list" | "l", []) => Self::List,
            ("export" | "e", []) => Self::Export(None),
            ("export" | "e", [n]) => Self::Export(Some(
                n.parse()
                    .map_err(|_| format!("expected a record number, got {:?}", n))?,
            )),
            ("status", []) => Self::Status,
            ("help" | "h" | "?", _) => Self::Help,
            ("quit" | "q" | "exit", []) => Self::Quit,
            (other, _) => return Err(format!("unknown command {:?} (try `help`)", other)),
        };
        Ok(input)
    }
}

fn parse_number(text: &str) -> Result<i64, String> {
    text.parse()
        .map_err(|_| format!("expected a whole number, got {:?}", text))
}

/// What the event loop should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    /// Print these lines.
    Show(Vec<String>),
    /// Start an export of this session.
    Export(CreateEventRequest),
    /// Leave the loop.
    Quit,
}

impl Reaction {
    fn line(text: impl Into<String>) -> Self {
        Self::Show(vec![text.into()])
    }
}

/// Countdown, records and metronome of one terminal session.
pub struct Controller<O, C = SystemClock> {
    engine: CountdownEngine<C>,
    records: SessionStore,
    metronome: Metronome<O>,
}

impl<O: AudioOutput, C: WallClock> Controller<O, C> {
    pub fn new(engine: CountdownEngine<C>, metronome: Metronome<O>) -> Self {
        Self {
            engine,
            records: SessionStore::new(),
            metronome,
        }
    }

    pub fn apply(&mut self, input: Input) -> Reaction {
        match input {
            Input::Start => self.countdown_command(|engine| engine.start()),
            Input::Pause => self.countdown_command(|engine| engine.pause()),
            Input::Reset => self.countdown_command(|engine| engine.reset()),
            Input::Set { minutes, seconds } => {
                self.countdown_command(|engine| engine.configure(minutes, seconds))
            }
            Input::Metronome => self.toggle_metronome(),
            Input::Tempo(bpm) => match self.metronome.set_tempo(bpm) {
                Ok(()) => Reaction::line(format!("tempo {} bpm", bpm)),
                Err(e) => Reaction::line(e.to_string()),
            },
            Input::List => Reaction::Show(self.record_lines()),
            Input::Export(position) => match self.export_request(position) {
                Ok(request) => Reaction::Export(request),
                Err(message) => Reaction::line(message),
            },
            Input::Status => Reaction::line(self.status_line()),
            Input::Help => Reaction::line(HELP),
            Input::Quit => Reaction::Quit,
        }
    }

    fn countdown_command(
        &mut self,
        command: impl FnOnce(&mut CountdownEngine<C>) -> Outcome,
    ) -> Reaction {
        match command(&mut self.engine) {
            Outcome::Ignored { reason } => Reaction::line(reason),
            Outcome::Applied { .. } => Reaction::line(self.status_line()),
            Outcome::Completed(record) => Reaction::Show(self.complete(record)),
        }
    }

    /// Advances the countdown by one second.
    ///
    /// Returns the lines to print: the new clock face, or a completion
    /// notice once the countdown reaches zero.
    pub fn on_tick(&mut self) -> Vec<String> {
        match self.engine.tick() {
            Outcome::Completed(record) => self.complete(record),
            Outcome::Applied { .. } => vec![self.engine.snapshot().display],
            Outcome::Ignored { .. } => Vec::new(),
        }
    }

    fn complete(&mut self, record: SessionRecord) -> Vec<String> {
        let line = format!(
            "done: {} recorded as #1 (`export` to send it to Google Calendar)",
            format_duration(record.duration_sec())
        );
        self.records.append(record);
        vec![line, self.status_line()]
    }

    /// True while the one-second ticker should be armed.
    pub fn needs_ticker(&self) -> bool {
        self.engine.needs_ticker()
    }

    fn toggle_metronome(&mut self) -> Reaction {
        if self.metronome.is_playing() {
            self.metronome.stop();
            return Reaction::line("metronome off");
        }
        self.metronome.start();
        let scheduled = self.metronome.poll();
        debug!(scheduled, "first metronome poll");
        let mut line = format!("metronome on ({} bpm)", self.metronome.config().tempo_bpm);
        if !self.metronome.output().has_sample() {
            line.push_str(", no click sample loaded");
        }
        Reaction::line(line)
    }

    /// True until the click sample has been fetched once.
    pub fn needs_sample(&self) -> bool {
        self.metronome.needs_sample()
    }

    pub fn install_sample(&mut self, fetched: ClientResult<Vec<u8>>) {
        self.metronome
            .install_sample(fetched.map_err(|e: ClientError| e.to_string()));
    }

    pub fn metronome_playing(&self) -> bool {
        self.metronome.is_playing()
    }

    /// Schedules the beats inside the lookahead window.
    pub fn poll_metronome(&mut self) -> usize {
        self.metronome.poll()
    }

    pub fn metronome(&self) -> &Metronome<O> {
        &self.metronome
    }

    pub fn records(&self) -> &SessionStore {
        &self.records
    }

    pub fn engine(&self) -> &CountdownEngine<C> {
        &self.engine
    }

    pub fn status_line(&self) -> String {
        let snapshot = self.engine.snapshot();
        let metronome = if self.metronome.is_playing() {
            format!("metronome {} bpm", self.metronome.config().tempo_bpm)
        } else {
            "metronome off".to_string()
        };
        format!(
            "{} / {}  [{}]  {}",
            snapshot.display,
            format_duration(snapshot.total_seconds),
            snapshot.state,
            metronome
        )
    }

    fn record_lines(&self) -> Vec<String> {
        if self.records.is_empty() {
            return vec!["no sessions yet".to_string()];
        }
        self.records
            .list()
            .iter()
            .enumerate()
            .map(|(i, record)| {
                format!(
                    "{:>3}. {}  結束：{}",
                    i + 1,
                    format_duration(record.duration_sec()),
                    record
                        .ended_at()
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M:%S")
                )
            })
            .collect()
    }

    fn export_request(&self, position: Option<usize>) -> Result<CreateEventRequest, String> {
        let record = match position {
            None => self.records.latest().ok_or("請先選擇要匯出的記錄。")?,
            Some(n) => self.records.nth(n).ok_or("找不到該記錄")?,
        };
        Ok(CreateEventRequest::from_record(record))
    }
}

/// What the user sees once an export finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportNotice {
    Created { id: String },
    /// The browser must visit `auth_url`; the export can then be retried.
    Consent { message: String, auth_url: String },
    Failed(String),
}

impl ExportNotice {
    pub fn from_result(result: ClientResult<CreateEventResponse>) -> Self {
        match result {
            Ok(CreateEventResponse::Created { id }) => Self::Created { id },
            Ok(CreateEventResponse::AuthRequired { error, auth_url }) => Self::Consent {
                message: error,
                auth_url,
            },
            Ok(CreateEventResponse::Failed { error, .. }) => {
                Self::Failed(format!("匯出失敗：{}", error))
            }
            Err(e @ (ClientError::Connection(_) | ClientError::Timeout(_))) => {
                Self::Failed(format!("網路或伺服器錯誤，請稍後再試。({})", e))
            }
            Err(e) => Self::Failed(format!("匯出失敗：{}", e)),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Created { id } => vec![format!("已成功建立 Google 日曆事件！ (id {})", id)],
            Self::Consent { message, auth_url } => vec![
                format!("{}: finish Google consent in the browser, then export again.", message),
                format!("  {}", auth_url),
            ],
            Self::Failed(message) => vec![message.clone()],
        }
    }
}
