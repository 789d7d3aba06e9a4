//! HTTP server for calendar export.
//!
//! Serves the static timer assets, runs the Google OAuth web-server flow
//! and exposes `POST /create-event`, which turns a finished jogging session
//! into a calendar event using the tokens held in the caller's session.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use slowjog_providers::google::{GoogleConfig, GoogleExporter, OAuthCredentials};
//! use slowjog_server::{HttpServer, RequestHandler, ServerConfig, default_redirect_uri};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let google = GoogleConfig::new(
//!         OAuthCredentials::new("id", "secret"),
//!         default_redirect_uri(config.port),
//!     );
//!     let exporter = Arc::new(GoogleExporter::new(&google)?);
//!     let handler = Arc::new(RequestHandler::new(exporter, &config)?);
//!     let server = HttpServer::start(&config, handler, tokio::runtime::Handle::current())?;
//!     println!("listening on {}", server.local_addr());
//!     Ok(())
//! }
//! ```

mod assets;
mod config;
mod error;
mod handler;
mod http;
mod session;
mod signals;

pub use assets::{Asset, AssetError, StaticFiles};
pub use config::{DEFAULT_PORT, DEFAULT_SESSION_SECRET, ServerConfig, default_redirect_uri};
pub use error::{ServerError, ServerResult};
pub use handler::{HttpRequest, HttpResponse, Method, RequestHandler};
pub use http::HttpServer;
pub use session::{CookieSigner, SessionStore};
pub use signals::{ShutdownSignal, SignalHandler};
