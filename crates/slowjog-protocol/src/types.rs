//! Request and response bodies of the export endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slowjog_core::{SessionRecord, export_description, export_title};

use crate::error::{ProtocolError, ProtocolResult};

/// Body of `POST /create-event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CreateEventRequest {
    /// Builds the export request for a completed session.
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            title: export_title(record.duration_sec()),
            description: export_description(record),
            start: record.started_at(),
            end: record.ended_at(),
        }
    }

    /// Parses and validates a request body.
    pub fn from_json(body: &[u8]) -> ProtocolResult<Self> {
        let request: Self = serde_json::from_slice(body)?;
        request.validate()?;
        Ok(request)
    }

    /// Rejects empty titles and inverted time ranges.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.title.trim().is_empty() {
            return Err(ProtocolError::MissingField("title"));
        }
        if self.end < self.start {
            return Err(ProtocolError::InvalidTimeRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// `200` body: the event was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub success: bool,
    pub id: String,
}

impl CreatedEvent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            success: true,
            id: id.into(),
        }
    }
}

/// `401` body: the browser must visit `authUrl` first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequired {
    pub error: String,
    pub auth_url: String,
}

/// Body of every other failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// What the controller makes of a `/create-event` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateEventResponse {
    Created { id: String },
    AuthRequired { error: String, auth_url: String },
    Failed { status: u16, error: String },
}

/// Loose view of any response body; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnyBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    auth_url: Option<String>,
}

impl CreateEventResponse {
    /// Interprets a status code and JSON body.
    ///
    /// A failing status that carries an `authUrl` asks for authorization,
    /// whatever the status. A body that is not JSON is an error.
    pub fn from_http(status: u16, body: &[u8]) -> ProtocolResult<Self> {
        let body: AnyBody = serde_json::from_slice(body)?;
        if (200..300).contains(&status) {
            let id = body.id.ok_or(ProtocolError::MissingField("id"))?;
            return Ok(Self::Created { id });
        }
        let error = body.error.unwrap_or_else(|| "unknown error".to_string());
        Ok(match body.auth_url {
            Some(auth_url) => Self::AuthRequired { error, auth_url },
            None => Self::Failed { status, error },
        })
    }
}
