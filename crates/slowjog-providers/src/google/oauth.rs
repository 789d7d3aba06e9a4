//! OAuth 2.0 authorization-code flow for a web-server client.
//!
//! The browser is redirected to Google's consent page, Google sends it back
//! to the server's callback with `code` and `state`, and the server
//! exchanges the code for tokens with the client secret. The `state` value
//! ties the callback to the session that started the flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

use super::config::GoogleConfig;
use super::tokens::{TokenInfo, split_scopes};

/// Random bytes behind each `state` value.
const STATE_LENGTH: usize = 16;

/// Generates a random state string for CSRF protection.
pub fn generate_state() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..STATE_LENGTH).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// OAuth client for Google APIs.
#[derive(Debug)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    auth_url: String,
    token_url: String,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: &GoogleConfig, http_client: reqwest::Client) -> Self {
        Self {
            client_id: config.credentials.client_id.clone(),
            client_secret: config.credentials.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            http_client,
        }
    }

    /// Builds the Google OAuth authorization URL.
    ///
    /// Asks for offline access and forces the consent prompt so Google
    /// always hands out a refresh token.
    pub fn build_auth_url(&self, state: &str) -> String {
        let scope = self.scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            access_type=offline&prompt=consent&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state),
        )
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> ProviderResult<TokenInfo> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let token_response = self.post_token_form(&params, "token exchange").await?;

        info!("obtained tokens from authorization code");
        let scopes = token_response
            .scope
            .as_deref()
            .map(split_scopes)
            .unwrap_or_else(|| self.scopes.clone());
        Ok(TokenInfo::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
            scopes,
        ))
    }

    /// Refreshes an expired access token using the refresh token.
    pub async fn refresh(&self, tokens: &TokenInfo) -> ProviderResult<TokenInfo> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or_else(|| ProviderError::authentication("no refresh token available"))?;

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token_response = self.post_token_form(&params, "token refresh").await?;

        info!("refreshed access token");
        let mut fresh = tokens.refreshed(
            token_response.access_token,
            token_response.expires_in,
            token_response.scope.as_deref(),
        );
        if token_response.refresh_token.is_some() {
            fresh.refresh_token = token_response.refresh_token;
        }
        Ok(fresh)
    }

    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
        what: &str,
    ) -> ProviderResult<TokenResponse> {
        debug!(url = %self.token_url, "{} request", what);
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "{} failed ({}): {}",
                what, status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(format!("invalid token response: {}", e)))
    }
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}
