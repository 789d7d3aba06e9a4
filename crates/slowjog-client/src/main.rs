//! slowjog CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use slowjog_client::cli::{Cli, Command, ConfigAction};
use slowjog_client::commands;
use slowjog_client::config::ClientConfig;
use slowjog_client::error::{ClientError, ClientResult};
use slowjog_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = match cli.command {
        Some(Command::Server(ref args)) => {
            let config = TracingConfig::server().with_format(args.log_format);
            if cli.debug {
                config.with_level(tracing::Level::DEBUG)
            } else {
                config
            }
        }
        _ => TracingConfig::controller(cli.debug),
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = if let Some(ref path) = cli.config {
        ClientConfig::load_from(path).map_err(ClientError::Config)?
    } else {
        ClientConfig::load().map_err(ClientError::Config)?
    };

    match cli.command {
        Some(Command::Server(ref args)) => commands::server::run(args, &config).await,
        Some(Command::Config { ref action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(),
        },
        Some(Command::Run) | None => commands::run::run(&cli, &config).await,
    }
}
