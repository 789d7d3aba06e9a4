//! Lookahead metronome scheduling.
//!
//! Two clocks are involved. The *decision clock* is whatever coarse timer
//! calls [`Metronome::poll`] (a tokio interval every 25 ms, say); it jitters
//! and nobody cares. The *execution clock* is [`AudioOutput::current_time`],
//! the audio device's own monotonic clock. Each poll schedules every beat
//! that falls inside the next `schedule_ahead` seconds of the execution
//! clock at its exact timestamp, and the output plays it sample-accurately.
//! Beat times are accumulated as `next += 60 / tempo`, so poll jitter never
//! leaks into the beat grid.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Default tempo in beats per minute.
pub const DEFAULT_TEMPO_BPM: f64 = 180.0;

/// Default interval of the polling loop.
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_millis(25);

/// Default scheduling window, in seconds of audio-clock time.
pub const DEFAULT_SCHEDULE_AHEAD_SECS: f64 = 0.1;

/// Fastest accepted tempo.
pub const MAX_TEMPO_BPM: f64 = 1000.0;

/// Widest accepted scheduling window, in seconds.
pub const MAX_SCHEDULE_AHEAD_SECS: f64 = 1.0;

/// Beats handed to the output by one poll at most. A poll after a long
/// stall schedules the rest on the following polls.
pub const MAX_BEATS_PER_POLL: usize = 64;

/// Errors from metronome setup and audio outputs.
#[derive(Debug, Error)]
pub enum MetronomeError {
    /// Tempo must be above zero and at most [`MAX_TEMPO_BPM`].
    #[error("invalid tempo: {0} bpm")]
    InvalidTempo(f64),

    /// Scheduling window must be above zero and at most
    /// [`MAX_SCHEDULE_AHEAD_SECS`] seconds.
    #[error("invalid schedule-ahead window: {0}s")]
    InvalidWindow(f64),

    /// The sample bytes could not be decoded.
    #[error("failed to decode sample: {0}")]
    Decode(String),

    /// The audio device could not be opened or resumed.
    #[error("audio device error: {0}")]
    Device(String),
}

/// The execution side of the metronome: a clock and a way to play the
/// beat sample at an instant on that clock.
pub trait AudioOutput {
    /// Current time of the audio clock, in seconds. Must be monotonic.
    fn current_time(&self) -> f64;

    /// True if the device is suspended and must be resumed before playing.
    fn is_suspended(&self) -> bool {
        false
    }

    /// Resumes a suspended device.
    fn resume(&mut self) -> Result<(), MetronomeError> {
        Ok(())
    }

    /// Decodes and keeps the beat sample.
    fn load_sample(&mut self, bytes: Vec<u8>) -> Result<(), MetronomeError>;

    /// True once a decoded sample is available.
    fn has_sample(&self) -> bool;

    /// Schedules one playback of the sample at `when` (audio-clock seconds).
    ///
    /// Implementations must do nothing when no sample is loaded.
    fn play_at(&mut self, when: f64);
}

/// Tuning of the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct MetronomeConfig {
    /// Beats per minute.
    pub tempo_bpm: f64,
    /// How often the decision loop should call [`Metronome::poll`].
    pub lookahead: Duration,
    /// How far ahead of the audio clock beats are scheduled, in seconds.
    pub schedule_ahead: f64,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: DEFAULT_TEMPO_BPM,
            lookahead: DEFAULT_LOOKAHEAD,
            schedule_ahead: DEFAULT_SCHEDULE_AHEAD_SECS,
        }
    }
}

impl MetronomeConfig {
    pub fn with_tempo(mut self, tempo_bpm: f64) -> Self {
        self.tempo_bpm = tempo_bpm;
        self
    }

    pub fn with_lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn with_schedule_ahead(mut self, seconds: f64) -> Self {
        self.schedule_ahead = seconds;
        self
    }

    /// Checks tempo and window.
    pub fn validate(&self) -> Result<(), MetronomeError> {
        validate_tempo(self.tempo_bpm)?;
        if !(self.schedule_ahead > 0.0 && self.schedule_ahead <= MAX_SCHEDULE_AHEAD_SECS) {
            return Err(MetronomeError::InvalidWindow(self.schedule_ahead));
        }
        Ok(())
    }
}

fn validate_tempo(tempo_bpm: f64) -> Result<(), MetronomeError> {
    if tempo_bpm > 0.0 && tempo_bpm <= MAX_TEMPO_BPM {
        Ok(())
    } else {
        Err(MetronomeError::InvalidTempo(tempo_bpm))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleState {
    NotLoaded,
    Loaded,
    Failed,
}

/// Metronome state plus the output it schedules on.
#[derive(Debug)]
pub struct Metronome<O> {
    config: MetronomeConfig,
    output: O,
    next_beat_time: f64,
    playing: bool,
    sample: SampleState,
}

impl<O: AudioOutput> Metronome<O> {
    /// Creates a stopped metronome.
    pub fn new(output: O, config: MetronomeConfig) -> Result<Self, MetronomeError> {
        config.validate()?;
        Ok(Self {
            config,
            output,
            next_beat_time: 0.0,
            playing: false,
            sample: SampleState::NotLoaded,
        })
    }

    /// True until a sample load has been attempted.
    ///
    /// The sample is fetched lazily, once, right before the first start.
    pub fn needs_sample(&self) -> bool {
        self.sample == SampleState::NotLoaded
    }

    /// Hands the result of fetching the sample to the output.
    ///
    /// Failures are logged and remembered; beats are then scheduled silently.
    pub fn install_sample(&mut self, fetched: Result<Vec<u8>, String>) {
        let loaded = fetched
            .map_err(MetronomeError::Decode)
            .and_then(|bytes| self.output.load_sample(bytes));
        self.sample = match loaded {
            Ok(()) => {
                debug!("metronome sample loaded");
                SampleState::Loaded
            }
            Err(e) => {
                warn!(error = %e, "metronome sample unavailable, beats will be silent");
                SampleState::Failed
            }
        };
    }

    /// Starts playing from the audio clock's current time.
    ///
    /// Returns false if already playing.
    pub fn start(&mut self) -> bool {
        if self.output.is_suspended()
            && let Err(e) = self.output.resume()
        {
            warn!(error = %e, "failed to resume audio output");
        }
        if self.playing {
            return false;
        }
        self.playing = true;
        self.next_beat_time = self.output.current_time();
        info!(tempo = self.config.tempo_bpm, "metronome started");
        true
    }

    /// Schedules every beat inside the lookahead window.
    ///
    /// Returns how many beats were scheduled, at most [`MAX_BEATS_PER_POLL`].
    /// Does nothing while stopped.
    pub fn poll(&mut self) -> usize {
        if !self.playing {
            return 0;
        }
        let horizon = self.output.current_time() + self.config.schedule_ahead;
        let interval = self.beat_interval();
        let mut scheduled = 0;
        while self.next_beat_time < horizon && scheduled < MAX_BEATS_PER_POLL {
            if self.output.has_sample() {
                self.output.play_at(self.next_beat_time);
            }
            let next = self.next_beat_time + interval;
            if next <= self.next_beat_time {
                warn!(
                    at = self.next_beat_time,
                    interval,
                    "beat grid no longer advances, stopping"
                );
                self.playing = false;
                return scheduled + 1;
            }
            self.next_beat_time = next;
            scheduled += 1;
        }
        scheduled
    }

    /// Stops scheduling. Beats already handed to the output may still sound.
    ///
    /// Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        self.playing = false;
        info!("metronome stopped");
        true
    }

    /// Changes the tempo; takes effect from the next unscheduled beat.
    pub fn set_tempo(&mut self, tempo_bpm: f64) -> Result<(), MetronomeError> {
        validate_tempo(tempo_bpm)?;
        self.config.tempo_bpm = tempo_bpm;
        Ok(())
    }

    /// Seconds between beats.
    pub fn beat_interval(&self) -> f64 {
        60.0 / self.config.tempo_bpm
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Audio-clock time of the next beat not yet scheduled.
    pub fn next_beat_time(&self) -> f64 {
        self.next_beat_time
    }

    pub fn config(&self) -> &MetronomeConfig {
        &self.config
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Output with a hand-driven clock that records every scheduled beat.
    #[derive(Debug, Default)]
    struct FakeOutput {
        now: f64,
        suspended: bool,
        resumes: u32,
        sample: Option<Vec<u8>>,
        played: Vec<f64>,
    }

    impl AudioOutput for FakeOutput {
        fn current_time(&self) -> f64 {
            self.now
        }

        fn is_suspended(&self) -> bool {
            self.suspended
        }

        fn resume(&mut self) -> Result<(), MetronomeError> {
            self.suspended = false;
            self.resumes += 1;
            Ok(())
        }

        fn load_sample(&mut self, bytes: Vec<u8>) -> Result<(), MetronomeError> {
            if bytes.is_empty() {
                return Err(MetronomeError::Decode("empty".into()));
            }
            self.sample = Some(bytes);
            Ok(())
        }

        fn has_sample(&self) -> bool {
            self.sample.is_some()
        }

        fn play_at(&mut self, when: f64) {
            if self.sample.is_some() {
                self.played.push(when);
            }
        }
    }

    fn loaded(config: MetronomeConfig) -> Metronome<FakeOutput> {
        let mut metronome = Metronome::new(FakeOutput::default(), config).unwrap();
        metronome.install_sample(Ok(vec![1, 2, 3]));
        metronome
    }

    /// Deterministic jitter in [0, 40) ms.
    fn jitter(i: u64) -> f64 {
        ((i.wrapping_mul(2_654_435_761) >> 7) % 40) as f64 / 1000.0
    }

    #[test]
    fn beats_at_180_bpm_are_a_third_of_a_second_apart_despite_jitter() {
        let mut metronome = loaded(MetronomeConfig::default());
        metronome.output_mut().now = 12.5;
        assert!(metronome.start());

        for i in 0..400 {
            metronome.poll();
            let step = 0.025 + jitter(i);
            metronome.output_mut().now += step;
        }

        let played = &metronome.output().played;
        assert!(played.len() > 30, "only {} beats", played.len());
        assert_eq!(played[0], 12.5);
        for pair in played.windows(2) {
            assert!((pair[1] - pair[0] - 60.0 / 180.0).abs() < 1e-9, "{pair:?}");
        }
        for (k, beat) in played.iter().enumerate() {
            assert!((beat - (12.5 + k as f64 / 3.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn each_beat_is_scheduled_once_and_only_inside_the_window() {
        let mut metronome = loaded(MetronomeConfig::default());
        metronome.start();

        assert_eq!(metronome.poll(), 1);
        assert_eq!(metronome.poll(), 0);

        metronome.output_mut().now = 0.30;
        assert_eq!(metronome.poll(), 1);
        assert_eq!(metronome.output().played, [0.0, 1.0 / 3.0]);
        assert!(metronome.next_beat_time() >= metronome.output().now + 0.1);
    }

    #[test]
    fn a_long_stall_catches_up_without_shifting_the_grid() {
        let mut metronome = loaded(MetronomeConfig::default().with_tempo(120.0));
        metronome.start();
        metronome.poll();
        metronome.output_mut().now = 2.0;
        assert_eq!(metronome.poll(), 4);
        assert_eq!(metronome.output().played, [0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn missing_sample_makes_playback_silent() {
        let mut metronome = Metronome::new(FakeOutput::default(), MetronomeConfig::default()).unwrap();
        assert!(metronome.needs_sample());
        metronome.install_sample(Err("404 not found".into()));
        assert!(!metronome.needs_sample());

        metronome.start();
        metronome.output_mut().now = 1.0;
        assert!(metronome.poll() > 0);
        assert!(metronome.output().played.is_empty());
    }

    #[test]
    fn undecodable_sample_is_remembered_as_failed() {
        let mut metronome = Metronome::new(FakeOutput::default(), MetronomeConfig::default()).unwrap();
        metronome.install_sample(Ok(Vec::new()));
        assert!(!metronome.needs_sample());
        assert!(!metronome.output().has_sample());
    }

    #[test]
    fn stop_then_start_restarts_from_the_current_clock() {
        let mut metronome = loaded(MetronomeConfig::default());
        metronome.start();
        metronome.poll();
        assert!(metronome.stop());
        assert!(!metronome.stop());

        metronome.output_mut().now = 50.0;
        assert_eq!(metronome.poll(), 0);
        assert!(metronome.start());
        assert_eq!(metronome.next_beat_time(), 50.0);
        assert!(!metronome.start());
    }

    #[test]
    fn start_resumes_suspended_output() {
        let output = FakeOutput {
            suspended: true,
            ..FakeOutput::default()
        };
        let mut metronome = Metronome::new(output, MetronomeConfig::default()).unwrap();
        metronome.start();
        assert!(!metronome.output().suspended);
        assert_eq!(metronome.output().resumes, 1);
    }

    #[test]
    fn rejects_bad_tempo_and_window() {
        assert!(matches!(
            Metronome::new(FakeOutput::default(), MetronomeConfig::default().with_tempo(0.0)),
            Err(MetronomeError::InvalidTempo(_))
        ));
        assert!(matches!(
            Metronome::new(FakeOutput::default(), MetronomeConfig::default().with_schedule_ahead(f64::NAN)),
            Err(MetronomeError::InvalidWindow(_))
        ));
        assert!(matches!(
            Metronome::new(
                FakeOutput::default(),
                MetronomeConfig::default().with_schedule_ahead(3600.0)
            ),
            Err(MetronomeError::InvalidWindow(_))
        ));
        let mut metronome = loaded(MetronomeConfig::default());
        assert!(metronome.set_tempo(-1.0).is_err());
        assert!(metronome.set_tempo(f64::INFINITY).is_err());
        metronome.set_tempo(60.0).unwrap();
        assert_eq!(metronome.beat_interval(), 1.0);
    }

    #[test]
    fn tempo_above_the_limit_is_rejected_and_poll_stays_bounded() {
        assert!(matches!(
            Metronome::new(FakeOutput::default(), MetronomeConfig::default().with_tempo(1e20)),
            Err(MetronomeError::InvalidTempo(_))
        ));
        let mut metronome = loaded(MetronomeConfig::default());
        assert!(matches!(
            metronome.set_tempo(1e20),
            Err(MetronomeError::InvalidTempo(_))
        ));
        assert!(metronome.set_tempo(MAX_TEMPO_BPM + 1.0).is_err());
        assert_eq!(metronome.config().tempo_bpm, DEFAULT_TEMPO_BPM);

        metronome.set_tempo(MAX_TEMPO_BPM).unwrap();
        metronome.output_mut().now = 1e6;
        metronome.start();
        assert!(metronome.poll() <= MAX_BEATS_PER_POLL);
    }

    #[test]
    fn a_stall_longer_than_one_poll_budget_is_spread_over_polls() {
        let mut metronome = loaded(MetronomeConfig::default().with_tempo(600.0));
        metronome.start();
        metronome.output_mut().now = 60.0;
        assert_eq!(metronome.poll(), MAX_BEATS_PER_POLL);
        assert_eq!(metronome.poll(), MAX_BEATS_PER_POLL);
        assert!(metronome.is_playing());
    }

    #[test]
    fn poll_stops_when_the_clock_is_too_large_to_advance() {
        let mut metronome = loaded(MetronomeConfig::default().with_tempo(MAX_TEMPO_BPM));
        metronome.output_mut().now = 1e18;
        metronome.start();
        assert_eq!(metronome.poll(), 1);
        assert!(!metronome.is_playing());
        assert_eq!(metronome.poll(), 0);
    }
}
