//! Google Calendar API client.
//!
//! Only the write path is needed: one `events.insert` call per exported
//! session.

use chrono::SecondsFormat;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::exporter::NewEvent;

use super::config::GoogleConfig;

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
    calendar_id: String,
}

impl GoogleCalendarClient {
    pub fn new(config: &GoogleConfig, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            api_base: config.api_base.clone(),
            calendar_id: config.calendar_id.clone(),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        )
    }

    /// Creates an event and returns the id Google assigned to it.
    pub async fn insert_event(&self, access_token: &str, event: &NewEvent) -> ProviderResult<String> {
        let url = self.events_url();
        let body = ApiEventInsert::from(event);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::network("request timeout")
                } else if e.is_connect() {
                    ProviderError::network(format!("connection failed: {}", e))
                } else {
                    ProviderError::network(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            let err = status_error(status, &text);
            warn!(%status, code = %err.code(), "event insert rejected");
            return Err(err);
        }

        let created: ApiEventCreated = serde_json::from_str(&text).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
        })?;

        debug!(event_id = %created.id, calendar = %self.calendar_id, "event created");
        Ok(created.id)
    }
}

/// Maps a failing Calendar API status to a provider error.
///
/// Google answers 400 to a revoked or malformed grant as well as to a bad
/// body; both are treated as a reason to authorize again.
pub(crate) fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let detail = api_error_message(body).unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
            ProviderError::authentication(format!("credentials rejected: {}", detail))
        }
        StatusCode::FORBIDDEN => {
            ProviderError::authorization(format!("access denied to calendar: {}", detail))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::rate_limited(format!("rate limit exceeded: {}", detail))
        }
        _ => ProviderError::server(format!("API error ({}): {}", status, detail)),
    }
}

/// Pulls `error.message` out of a Google API error body.
fn api_error_message(body: &str) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
    parsed.error.message
}

/// Request body of `events.insert`.
#[derive(Debug, Serialize)]
struct ApiEventInsert<'a> {
    summary: &'a str,
    description: &'a str,
    start: ApiDateTime,
    end: ApiDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiDateTime {
    date_time: String,
}

impl<'a> From<&'a NewEvent> for ApiEventInsert<'a> {
    fn from(event: &'a NewEvent) -> Self {
        Self {
            summary: &event.summary,
            description: &event.description,
            start: ApiDateTime {
                date_time: event.start.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
            end: ApiDateTime {
                date_time: event.end.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEventCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}
