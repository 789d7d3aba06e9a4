//! Controller configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/slowjog/config.toml` by default. Every section is optional;
//! command-line flags override whatever the file says.
//!
//! ```toml
//! [server]
//! url = "http://localhost:3000"
//! timeout = 10
//!
//! [timer]
//! minutes = 15
//! seconds = 0
//!
//! [metronome]
//! tempo = 180
//! lookahead_ms = 25
//! schedule_ahead_ms = 100
//! sample_path = "public/metronome_out.wav"
//!
//! [google]
//! client_id = "env::CLIENT_ID"
//! client_secret = "pass::google/slowjog"
//! ```
//!
//! `[google]` is only read by `slowjog server`, as a fallback for the
//! `CLIENT_ID` / `CLIENT_SECRET` environment. Its values support secret
//! references (see [`crate::secret`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slowjog_core::MetronomeConfig;
use slowjog_providers::google::OAuthCredentials;

/// Configuration for the slowjog controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Export server settings.
    pub server: ServerSettings,

    /// Initial countdown duration.
    pub timer: TimerSettings,

    /// Metronome tuning.
    pub metronome: MetronomeSettings,

    /// OAuth client credentials for `slowjog server`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleSettings>,
}

/// Where the export server lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Base URL of the server.
    pub url: String,

    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            timeout: 10,
        }
    }
}

/// Countdown duration the controller starts with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    pub minutes: i64,
    pub seconds: i64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            minutes: 15,
            seconds: 0,
        }
    }
}

/// Metronome tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeSettings {
    /// Beats per minute.
    pub tempo: f64,

    /// Polling interval of the scheduler loop, in milliseconds.
    pub lookahead_ms: u64,

    /// Scheduling window ahead of the audio clock, in milliseconds.
    pub schedule_ahead_ms: u64,

    /// Local click sample. When unset the sample is fetched from the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_path: Option<PathBuf>,
}

impl Default for MetronomeSettings {
    fn default() -> Self {
        Self {
            tempo: slowjog_core::DEFAULT_TEMPO_BPM,
            lookahead_ms: slowjog_core::DEFAULT_LOOKAHEAD.as_millis() as u64,
            schedule_ahead_ms: (slowjog_core::DEFAULT_SCHEDULE_AHEAD_SECS * 1000.0) as u64,
            sample_path: None,
        }
    }
}

impl MetronomeSettings {
    /// Scheduler configuration for these settings.
    pub fn to_metronome_config(&self) -> MetronomeConfig {
        MetronomeConfig::default()
            .with_tempo(self.tempo)
            .with_lookahead(Duration::from_millis(self.lookahead_ms.max(1)))
            .with_schedule_ahead(self.schedule_ahead_ms as f64 / 1000.0)
    }
}

/// OAuth client credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Credentials JSON downloaded from the Google Cloud Console.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,
}

impl GoogleSettings {
    /// Resolves credentials from the inline fields or the credentials file.
    ///
    /// Inline values win. Returns `Ok(None)` when nothing is configured.
    pub fn resolve_credentials(&self) -> Result<Option<OAuthCredentials>, String> {
        if self.client_id.is_some() || self.client_secret.is_some() {
            let raw_id = self
                .client_id
                .as_deref()
                .ok_or("client_id is missing from [google] in config.toml")?;
            let raw_secret = self
                .client_secret
                .as_deref()
                .ok_or("client_secret is missing from [google] in config.toml")?;
            let id = crate::secret::resolve(raw_id)
                .map_err(|e| format!("failed to resolve client_id: {}", e))?;
            let secret = crate::secret::resolve(raw_secret)
                .map_err(|e| format!("failed to resolve client_secret: {}", e))?;
            return Ok(Some(OAuthCredentials::new(id, secret)));
        }

        match self.credentials_file {
            Some(ref path) => OAuthCredentials::from_file(path).map(Some),
            None => Ok(None),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse {}: {}", path.display(), e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("slowjog")
    }

    /// Request timeout for the export server.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout.max(1))
    }

    /// Checks values that would only fail later, mid-run.
    pub fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.server.url)
            .map_err(|e| format!("invalid [server] url {:?}: {}", self.server.url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("[server] url must be http or https, got {}", url.scheme()));
        }
        if !(0..=59).contains(&self.timer.seconds) || self.timer.minutes < 0 {
            return Err(format!(
                "[timer] wants minutes >= 0 and seconds in 0..=59, got {}:{}",
                self.timer.minutes, self.timer.seconds
            ));
        }
        self.metronome
            .to_metronome_config()
            .validate()
            .map_err(|e| format!("[metronome] {}", e))?;
        if let Some(ref google) = self.google {
            google.resolve_credentials()?;
        }
        Ok(())
    }
}
