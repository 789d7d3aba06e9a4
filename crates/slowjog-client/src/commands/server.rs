//! Server command: runs the export server in the foreground.
//!
//! Wires the pieces together:
//! - OAuth credentials from flags, environment, or config.toml
//! - the Google Calendar exporter
//! - the HTTP server (API routes and static files)
//! - the signal handler (SIGTERM/SIGINT for shutdown)

use std::sync::Arc;

use tracing::{info, warn};

use slowjog_providers::CalendarExporter;
use slowjog_providers::google::{GoogleConfig, GoogleExporter, OAuthCredentials};
use slowjog_server::{
    DEFAULT_PORT, HttpServer, RequestHandler, ServerConfig, SignalHandler, default_redirect_uri,
};

use crate::cli::ServerArgs;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::secret;

/// Starts the export server and blocks until SIGTERM/SIGINT.
pub async fn run(args: &ServerArgs, config: &ClientConfig) -> ClientResult<()> {
    let server_config = server_config(args)?;
    if server_config.uses_default_secret() {
        warn!("SESSION_SECRET is not set; session cookies are signed with the public default");
    }

    let credentials = resolve_credentials(args, config)?;
    if credentials.validate().is_err() {
        warn!(
            "Google OAuth credentials are incomplete; set CLIENT_ID and CLIENT_SECRET \
             or CREDENTIALS_FILE, or exports will fail at consent"
        );
    }
    let redirect_uri = args
        .redirect_uri
        .clone()
        .unwrap_or_else(|| default_redirect_uri(server_config.port));
    let google = GoogleConfig::new(credentials, redirect_uri.clone());
    let exporter: Arc<dyn CalendarExporter> = Arc::new(GoogleExporter::new(&google)?);

    let handler = Arc::new(RequestHandler::new(exporter, &server_config)?);

    let signal_handler = SignalHandler::new();
    signal_handler.spawn_listener();
    let shutdown = signal_handler.shutdown();

    let server = HttpServer::start(&server_config, handler, tokio::runtime::Handle::current())?;
    info!(
        addr = %server.local_addr(),
        static_dir = %server_config.static_dir.display(),
        %redirect_uri,
        "export server listening"
    );

    shutdown.wait().await;

    info!("Shutting down...");
    tokio::task::spawn_blocking(move || server.shutdown())
        .await
        .map_err(|e| ClientError::Server(format!("shutdown task failed: {}", e)))?;
    info!("Server stopped");
    Ok(())
}

fn server_config(args: &ServerArgs) -> ClientResult<ServerConfig> {
    let mut config = ServerConfig::default().with_port(args.port.unwrap_or(DEFAULT_PORT));
    if let Some(bind) = args.bind {
        config = config.with_bind(bind);
    }
    if let Some(ref dir) = args.static_dir {
        config = config.with_static_dir(dir);
    }
    if let Some(ref raw) = args.session_secret {
        let secret = secret::resolve(raw)
            .map_err(|e| ClientError::Config(format!("failed to resolve SESSION_SECRET: {}", e)))?;
        config = config.with_session_secret(secret);
    }
    Ok(config)
}

/// Flags and environment win over config.toml. An empty pair is returned
/// when nothing is configured, so the server can still serve static files.
fn resolve_credentials(args: &ServerArgs, config: &ClientConfig) -> ClientResult<OAuthCredentials> {
    if args.client_id.is_some() || args.client_secret.is_some() {
        let id = secret::resolve_opt(args.client_id.as_deref())
            .map_err(|e| ClientError::Config(format!("failed to resolve CLIENT_ID: {}", e)))?;
        let secret = secret::resolve_opt(args.client_secret.as_deref())
            .map_err(|e| ClientError::Config(format!("failed to resolve CLIENT_SECRET: {}", e)))?;
        return Ok(OAuthCredentials::new(
            id.unwrap_or_default(),
            secret.unwrap_or_default(),
        ));
    }
    if let Some(ref path) = args.credentials_file {
        return OAuthCredentials::from_file(path).map_err(ClientError::Config);
    }
    let from_config = match config.google {
        Some(ref google) => google
            .resolve_credentials()
            .map_err(|e| ClientError::Config(format!("invalid [google] section: {}", e)))?,
        None => None,
    };
    Ok(from_config.unwrap_or_else(|| OAuthCredentials::new("", "")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GoogleSettings;

    #[test]
    fn flags_win_over_config() {
        let args = ServerArgs {
            client_id: Some("flag-id".into()),
            client_secret: Some("flag-secret".into()),
            ..ServerArgs::default()
        };
        let config = ClientConfig {
            google: Some(GoogleSettings {
                client_id: Some("config-id".into()),
                client_secret: Some("config-secret".into()),
                credentials_file: None,
            }),
            ..ClientConfig::default()
        };
        let creds = resolve_credentials(&args, &config).unwrap();
        assert_eq!(creds.client_id, "flag-id");
        assert_eq!(creds.client_secret, "flag-secret");
    }

    #[test]
    fn falls_back_to_config_then_empty() {
        let config = ClientConfig {
            google: Some(GoogleSettings {
                client_id: Some("config-id".into()),
                client_secret: Some("config-secret".into()),
                credentials_file: None,
            }),
            ..ClientConfig::default()
        };
        let creds = resolve_credentials(&ServerArgs::default(), &config).unwrap();
        assert_eq!(creds.client_id, "config-id");

        let empty = resolve_credentials(&ServerArgs::default(), &ClientConfig::default()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn server_config_from_args() {
        let args = ServerArgs {
            port: Some(8123),
            bind: Some("127.0.0.1".parse().unwrap()),
            static_dir: Some("site".into()),
            session_secret: Some("s3cret".into()),
            ..ServerArgs::default()
        };
        let config = server_config(&args).unwrap();
        assert_eq!(config.port, 8123);
        assert_eq!(config.addr().to_string(), "127.0.0.1:8123");
        assert_eq!(config.static_dir, std::path::PathBuf::from("site"));
        assert!(!config.uses_default_secret());

        assert!(server_config(&ServerArgs::default()).unwrap().uses_default_secret());
    }
}
