//! [`CalendarExporter`] backed by Google Calendar.

use std::time::Duration;

use tracing::info;

use crate::error::{ProviderError, ProviderResult};
use crate::exporter::{BoxFuture, CalendarExporter, NewEvent};

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;
use super::oauth::OAuthClient;
use super::tokens::TokenInfo;

const PROVIDER_NAME: &str = "google";

/// Exports sessions to the user's Google calendar.
#[derive(Debug)]
pub struct GoogleExporter {
    oauth: OAuthClient,
    calendar: GoogleCalendarClient,
}

impl GoogleExporter {
    /// Creates an exporter with its own HTTP client.
    ///
    /// The configuration is not validated here; the server warns about
    /// missing credentials and starts anyway.
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = build_http_client(config.timeout, &config.user_agent)?;
        Ok(Self::with_http_client(config, http_client))
    }

    pub fn with_http_client(config: &GoogleConfig, http_client: reqwest::Client) -> Self {
        Self {
            oauth: OAuthClient::new(config, http_client.clone()),
            calendar: GoogleCalendarClient::new(config, http_client),
        }
    }
}

fn build_http_client(timeout: Duration, user_agent: &str) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| {
            ProviderError::internal("failed to create HTTP client")
                .with_provider(PROVIDER_NAME)
                .with_source(e)
        })
}

impl CalendarExporter for GoogleExporter {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn authorization_url(&self, state: &str) -> String {
        self.oauth.build_auth_url(state)
    }

    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, ProviderResult<TokenInfo>> {
        Box::pin(async move {
            self.oauth
                .exchange_code(code)
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))
        })
    }

    fn refresh<'a>(&'a self, tokens: &'a TokenInfo) -> BoxFuture<'a, ProviderResult<TokenInfo>> {
        Box::pin(async move {
            self.oauth
                .refresh(tokens)
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))
        })
    }

    fn insert_event<'a>(
        &'a self,
        tokens: &'a TokenInfo,
        event: &'a NewEvent,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            let id = self
                .calendar
                .insert_event(&tokens.access_token, event)
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))?;
            info!(event_id = %id, summary = %event.summary, "exported session to Google Calendar");
            Ok(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::google::config::OAuthCredentials;
    use chrono::{Duration as TimeDelta, TimeZone, Utc};

    fn config() -> GoogleConfig {
        GoogleConfig::new(
            OAuthCredentials::new("id.apps.googleusercontent.com", "secret"),
            "http://localhost:3000/auth/google/callback",
        )
    }

    fn event() -> NewEvent {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
        NewEvent::new("超慢跑：00:05", "", start, start + TimeDelta::seconds(5))
    }

    fn no_proxy() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[test]
    fn builds_with_default_client() {
        let exporter = GoogleExporter::new(&config()).unwrap();
        assert_eq!(exporter.name(), "google");
        assert!(exporter.authorization_url("xyz").contains("state=xyz"));
    }

    #[tokio::test]
    async fn export_with_live_tokens_inserts_once() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/calendars/primary/events")
            .match_header("authorization", "Bearer ya29.live")
            .with_body(r#"{"id":"evt42"}"#)
            .create_async()
            .await;
        let exporter =
            GoogleExporter::with_http_client(&config().with_api_base(server.url()), no_proxy());
        let tokens = TokenInfo::new("ya29.live", None, Some(3600), vec![]);

        let receipt = exporter.export(&tokens, &event()).await.unwrap();

        assert_eq!(receipt.event_id, "evt42");
        assert!(receipt.refreshed.is_none());
    }

    #[tokio::test]
    async fn rejected_insert_is_tagged_with_provider() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/calendars/primary/events")
            .with_status(400)
            .with_body(r#"{"error":{"message":"Bad Request"}}"#)
            .create_async()
            .await;
        let exporter =
            GoogleExporter::with_http_client(&config().with_api_base(server.url()), no_proxy());
        let tokens = TokenInfo::new("ya29.live", None, Some(3600), vec![]);

        let err = exporter.export(&tokens, &event()).await.unwrap_err();

        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.provider(), Some("google"));
    }

    #[tokio::test]
    async fn expired_tokens_are_refreshed_before_the_insert() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", "/token")
            .with_body(r#"{"access_token":"ya29.fresh","expires_in":3599}"#)
            .create_async()
            .await;
        let insert = server
            .mock("POST", "/calendars/primary/events")
            .match_header("authorization", "Bearer ya29.fresh")
            .with_body(r#"{"id":"evt43"}"#)
            .create_async()
            .await;
        let config = config()
            .with_token_url(format!("{}/token", server.url()))
            .with_api_base(server.url());
        let exporter = GoogleExporter::with_http_client(&config, no_proxy());
        let stale = TokenInfo::new("ya29.stale", Some("1//r".into()), Some(0), vec![]);

        let receipt = exporter.export(&stale, &event()).await.unwrap();

        refresh.assert_async().await;
        insert.assert_async().await;
        assert_eq!(receipt.event_id, "evt43");
        let fresh = receipt.refreshed.unwrap();
        assert_eq!(fresh.access_token, "ya29.fresh");
        assert_eq!(fresh.refresh_token.as_deref(), Some("1//r"));
    }
}
