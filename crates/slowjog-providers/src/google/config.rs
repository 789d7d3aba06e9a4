//! Google Calendar exporter configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Google's consent screen.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google's token endpoint, for code exchange and refresh.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// OAuth 2.0 credentials of a Google Cloud "web application" client.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Structure of Google's OAuth credentials JSON file.
///
/// Accepts the Cloud Console download (`web` or `installed` section) or a
/// flat object with `client_id` and `client_secret` at the root.
#[derive(Debug, Deserialize)]
struct GoogleCredentialsFile {
    web: Option<NestedCredentials>,
    installed: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads credentials from a Google Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("failed to read credentials file: {}", e))?;
        Self::from_json(&content)
    }

    /// Parses credentials from a Google credentials JSON string.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let file: GoogleCredentialsFile = serde_json::from_str(json)
            .map_err(|e| format!("failed to parse credentials JSON: {}", e))?;

        if let Some(creds) = file.web.or(file.installed) {
            return Ok(Self::new(creds.client_id, creds.client_secret));
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err("credentials file must contain a 'web'/'installed' section or 'client_id'/'client_secret' at root level".to_string())
    }

    /// Checks that both values are present and the id looks like a Google client id.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.client_id.is_empty() || self.client_secret.is_empty()
    }
}

/// Configuration for the Google Calendar exporter.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub credentials: OAuthCredentials,

    /// Where Google sends the browser after consent. Must match one of the
    /// redirect URIs registered for the client.
    pub redirect_uri: String,

    /// OAuth scopes to request.
    ///
    /// Defaults to `["https://www.googleapis.com/auth/calendar.events"]`.
    pub scopes: Vec<String>,

    /// Calendar that receives exported sessions.
    pub calendar_id: String,

    /// Request timeout.
    pub timeout: Duration,

    pub user_agent: String,

    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Scope that allows creating events and nothing broader.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.events";

    pub fn new(credentials: OAuthCredentials, redirect_uri: impl Into<String>) -> Self {
        Self {
            credentials,
            redirect_uri: redirect_uri.into(),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            calendar_id: "primary".to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("slowjog/{}", env!("CARGO_PKG_VERSION")),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_base: CALENDAR_API_BASE.to_string(),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Points the token endpoint somewhere else (a local fake in tests).
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Points the Calendar API somewhere else (a local fake in tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.credentials
            .validate()
            .map_err(|e| format!("invalid credentials: {}", e))?;

        let redirect = Url::parse(&self.redirect_uri)
            .map_err(|e| format!("invalid redirect URI {:?}: {}", self.redirect_uri, e))?;
        if !matches!(redirect.scheme(), "http" | "https") {
            return Err(format!(
                "redirect URI must be http or https, got {}",
                redirect.scheme()
            ));
        }

        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials() -> OAuthCredentials {
        OAuthCredentials::new("test-client.apps.googleusercontent.com", "test-secret")
    }

    #[test]
    fn credentials_validation() {
        assert!(test_credentials().validate().is_ok());
        assert!(OAuthCredentials::new("", "secret").validate().is_err());
        assert!(OAuthCredentials::new("bad-id", "secret").validate().is_err());
        assert!(
            OAuthCredentials::new("test.apps.googleusercontent.com", "")
                .validate()
                .is_err()
        );
        assert!(OAuthCredentials::new("", "").is_empty());
    }

    #[test]
    fn config_defaults() {
        let config = GoogleConfig::new(test_credentials(), "http://localhost:3000/auth/google/callback");
        assert_eq!(config.scopes, [GoogleConfig::DEFAULT_SCOPE]);
        assert_eq!(config.calendar_id, "primary");
        assert_eq!(config.token_url, GOOGLE_TOKEN_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation() {
        let base = GoogleConfig::new(test_credentials(), "http://localhost:3000/cb");

        assert!(base.clone().with_scopes(vec![]).validate().is_err());

        let mut relative = base.clone();
        relative.redirect_uri = "/auth/google/callback".into();
        assert!(relative.validate().unwrap_err().contains("redirect URI"));

        let mut ftp = base;
        ftp.redirect_uri = "ftp://example.com/cb".into();
        assert!(ftp.validate().is_err());
    }

    #[test]
    fn api_base_loses_trailing_slash() {
        let config = GoogleConfig::new(test_credentials(), "http://localhost/cb")
            .with_api_base("http://127.0.0.1:9999/");
        assert_eq!(config.api_base, "http://127.0.0.1:9999");
    }

    #[test]
    fn credentials_from_json_web() {
        let json = r#"{
            "web": {
                "client_id": "web-id.apps.googleusercontent.com",
                "client_secret": "web-secret",
                "redirect_uris": ["http://localhost:3000/auth/google/callback"]
            }
        }"#;

        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "web-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "web-secret");
    }

    #[test]
    fn credentials_from_json_flat() {
        let json = r#"{
            "client_id": "flat-id.apps.googleusercontent.com",
            "client_secret": "flat-secret"
        }"#;

        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "flat-id.apps.googleusercontent.com");
    }

    #[test]
    fn credentials_from_json_invalid() {
        let result = OAuthCredentials::from_json(r#"{ "other": {} }"#);
        assert!(result.unwrap_err().contains("client_id"));

        let result = OAuthCredentials::from_json("not json");
        assert!(result.unwrap_err().contains("parse"));
    }
}
