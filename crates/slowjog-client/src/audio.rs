//! Audio outputs for the metronome.
//!
//! [`SilentOutput`] keeps time and counts beats without a sound device; it
//! is what the controller uses without the `audio` feature, with
//! `--silent`, or when no device can be opened. With the `audio` feature,
//! [`RodioOutput`] plays the click through the default device, delaying
//! each playback so it starts at the requested audio-clock instant.

use std::time::Instant;

use slowjog_core::{AudioOutput, MetronomeError};
use tracing::debug;

/// Checks that `bytes` look like a RIFF/WAVE file.
pub fn check_wav(bytes: &[u8]) -> Result<(), MetronomeError> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        Ok(())
    } else {
        Err(MetronomeError::Decode("not a RIFF/WAVE file".to_string()))
    }
}

/// A clock with no speaker attached.
#[derive(Debug)]
pub struct SilentOutput {
    epoch: Instant,
    sample_len: Option<usize>,
    beats: u64,
}

impl Default for SilentOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl SilentOutput {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            sample_len: None,
            beats: 0,
        }
    }

    /// Beats handed to [`AudioOutput::play_at`] with a sample loaded.
    pub fn beats(&self) -> u64 {
        self.beats
    }
}

impl AudioOutput for SilentOutput {
    fn current_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn load_sample(&mut self, bytes: Vec<u8>) -> Result<(), MetronomeError> {
        check_wav(&bytes)?;
        self.sample_len = Some(bytes.len());
        Ok(())
    }

    fn has_sample(&self) -> bool {
        self.sample_len.is_some()
    }

    fn play_at(&mut self, when: f64) {
        if self.sample_len.is_none() {
            return;
        }
        self.beats += 1;
        debug!(when, beat = self.beats, "silent beat");
    }
}

#[cfg(feature = "audio")]
pub use speaker::RodioOutput;

#[cfg(feature = "audio")]
mod speaker {
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    use rodio::source::Buffered;
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Source};
    use slowjog_core::{AudioOutput, MetronomeError};
    use tracing::warn;

    type Click = Buffered<Decoder<Cursor<Vec<u8>>>>;

    /// Plays the click on the default output device.
    ///
    /// The audio clock is the time since the device was opened; each
    /// playback is queued with a delay equal to its distance from now.
    pub struct RodioOutput {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        epoch: Instant,
        click: Option<Click>,
    }

    impl RodioOutput {
        pub fn open() -> Result<Self, MetronomeError> {
            let (stream, handle) =
                OutputStream::try_default().map_err(|e| MetronomeError::Device(e.to_string()))?;
            Ok(Self {
                _stream: stream,
                handle,
                epoch: Instant::now(),
                click: None,
            })
        }
    }

    impl std::fmt::Debug for RodioOutput {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RodioOutput")
                .field("has_click", &self.click.is_some())
                .finish()
        }
    }

    impl AudioOutput for RodioOutput {
        fn current_time(&self) -> f64 {
            self.epoch.elapsed().as_secs_f64()
        }

        fn load_sample(&mut self, bytes: Vec<u8>) -> Result<(), MetronomeError> {
            let decoder = Decoder::new(Cursor::new(bytes))
                .map_err(|e| MetronomeError::Decode(e.to_string()))?;
            self.click = Some(decoder.buffered());
            Ok(())
        }

        fn has_sample(&self) -> bool {
            self.click.is_some()
        }

        fn play_at(&mut self, when: f64) {
            let Some(ref click) = self.click else {
                return;
            };
            let delay = (when - self.current_time()).max(0.0);
            let source = click.clone().delay(Duration::from_secs_f64(delay));
            if let Err(e) = self.handle.play_raw(source.convert_samples()) {
                warn!(error = %e, "failed to queue click");
            }
        }
    }
}

/// Whichever output the controller ended up with.
#[derive(Debug)]
pub enum Output {
    Silent(SilentOutput),
    #[cfg(feature = "audio")]
    Speaker(RodioOutput),
}

impl Output {
    /// Opens the sound device, falling back to a silent clock.
    pub fn open(silent: bool) -> Self {
        if silent {
            return Self::Silent(SilentOutput::new());
        }
        #[cfg(feature = "audio")]
        {
            match RodioOutput::open() {
                Ok(speaker) => return Self::Speaker(speaker),
                Err(e) => tracing::warn!(error = %e, "no sound device, metronome will be silent"),
            }
        }
        #[cfg(not(feature = "audio"))]
        {
            debug!("built without the audio feature, metronome will be silent");
        }
        Self::Silent(SilentOutput::new())
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Silent(_))
    }
}

impl AudioOutput for Output {
    fn current_time(&self) -> f64 {
        match self {
            Self::Silent(out) => out.current_time(),
            #[cfg(feature = "audio")]
            Self::Speaker(out) => out.current_time(),
        }
    }

    fn load_sample(&mut self, bytes: Vec<u8>) -> Result<(), MetronomeError> {
        match self {
            Self::Silent(out) => out.load_sample(bytes),
            #[cfg(feature = "audio")]
            Self::Speaker(out) => out.load_sample(bytes),
        }
    }

    fn has_sample(&self) -> bool {
        match self {
            Self::Silent(out) => out.has_sample(),
            #[cfg(feature = "audio")]
            Self::Speaker(out) => out.has_sample(),
        }
    }

    fn play_at(&mut self, when: f64) {
        match self {
            Self::Silent(out) => out.play_at(when),
            #[cfg(feature = "audio")]
            Self::Speaker(out) => out.play_at(when),
        }
    }
}
