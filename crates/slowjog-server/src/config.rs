//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3000;

/// Cookie-signing secret used when none is configured. Anyone who knows it
/// can forge session cookies.
pub const DEFAULT_SESSION_SECRET: &str = "changeme";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind: IpAddr,

    /// Port to listen on; `0` picks a free one.
    pub port: u16,

    /// Directory served for every path that is not an API route.
    pub static_dir: PathBuf,

    /// Secret used to sign session cookies.
    pub session_secret: String,

    /// Sessions idle for longer than this are dropped.
    pub session_ttl: Duration,

    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("public"),
            session_secret: DEFAULT_SESSION_SECRET.to_string(),
            session_ttl: Duration::from_secs(24 * 60 * 60),
            max_body_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn with_bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }

    pub fn with_session_secret(mut self, secret: impl Into<String>) -> Self {
        self.session_secret = secret.into();
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Socket address to listen on.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// True when sessions are signed with the well-known default secret.
    pub fn uses_default_secret(&self) -> bool {
        self.session_secret == DEFAULT_SESSION_SECRET
    }
}

/// OAuth redirect URI used when none is configured.
pub fn default_redirect_uri(port: u16) -> String {
    format!(
        "http://localhost:{}{}",
        port,
        slowjog_protocol::AUTH_CALLBACK_PATH
    )
}
