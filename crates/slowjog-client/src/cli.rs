//! Command-line interface definition.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use slowjog_core::{TracingOutputFormat, parse_time};

/// slowjog - countdown timer and metronome for slow jogging
#[derive(Debug, Parser)]
#[command(name = "slowjog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "SLOWJOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    // --- Timer flags ---
    /// Countdown duration as MM:SS (overrides [timer] in config.toml)
    #[arg(long, short, value_parser = parse_duration)]
    pub duration: Option<u64>,

    // --- Metronome flags ---
    /// Metronome tempo in beats per minute (at most 1000)
    #[arg(long)]
    pub tempo: Option<f64>,

    /// Never open the sound device; beats are only counted
    #[arg(long)]
    pub silent: bool,

    // --- Connection flags ---
    /// Base URL of the export server
    #[arg(long, env = "SLOWJOG_SERVER_URL")]
    pub server_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

fn parse_duration(text: &str) -> Result<u64, String> {
    parse_time(text).ok_or_else(|| format!("expected MM:SS, got {:?}", text))
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the interactive timer (the default)
    Run,

    /// Start the export server in the foreground
    Server(ServerArgs),

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options of `slowjog server`.
///
/// Every option falls back to the `[google]` section of config.toml, then
/// to a built-in default.
#[derive(Debug, Default, Args)]
pub struct ServerArgs {
    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "BIND")]
    pub bind: Option<IpAddr>,

    /// Directory of static files (the web front end and the metronome sample)
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// OAuth client ID (from Google Cloud Console)
    #[arg(long, env = "CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret; `pass::` and `env::` references are resolved
    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Path to a Google Cloud Console credentials JSON file
    #[arg(long, env = "CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,

    /// OAuth redirect URI registered with Google
    #[arg(long, env = "REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    /// Secret used to sign session cookies
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    /// Log line format: pretty, compact or json
    #[arg(long, default_value = "pretty")]
    pub log_format: TracingOutputFormat,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_the_timer() {
        let cli = Cli::try_parse_from(["slowjog"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.silent);
        assert_eq!(cli.duration, None);
    }

    #[test]
    fn duration_is_mm_ss() {
        let cli = Cli::try_parse_from(["slowjog", "--duration", "20:00", "--tempo", "180"]).unwrap();
        assert_eq!(cli.duration, Some(1200));
        assert_eq!(cli.tempo, Some(180.0));
        assert!(Cli::try_parse_from(["slowjog", "--duration", "20"]).is_err());
    }

    #[test]
    fn server_flags() {
        let cli = Cli::try_parse_from([
            "slowjog",
            "server",
            "--port",
            "8080",
            "--bind",
            "127.0.0.1",
            "--log-format",
            "json",
        ])
        .unwrap();
        let Some(Command::Server(args)) = cli.command else {
            panic!("expected the server subcommand");
        };
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.bind, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(args.log_format, TracingOutputFormat::Json);
    }

    #[test]
    fn config_actions() {
        let cli = Cli::try_parse_from(["slowjog", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                action: ConfigAction::Path
            })
        ));
    }
}
