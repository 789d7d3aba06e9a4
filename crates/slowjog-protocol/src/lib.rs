//! HTTP routes and JSON bodies shared by the slowjog server and controller.
//!
//! The controller exports a completed session with `POST /create-event`.
//! The server answers with one of three bodies:
//!
//! - `200` [`CreatedEvent`]: `{"success": true, "id": "..."}`
//! - `401` [`AuthRequired`]: `{"error": "...", "authUrl": "..."}`
//! - anything else [`ErrorBody`]: `{"error": "..."}`
//!
//! # Example
//!
//! ```rust
//! use slowjog_protocol::{CreateEventResponse, CreatedEvent};
//!
//! let body = serde_json::to_vec(&CreatedEvent::new("evt1")).unwrap();
//! let response = CreateEventResponse::from_http(200, &body).unwrap();
//! assert_eq!(response, CreateEventResponse::Created { id: "evt1".into() });
//! ```

mod error;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use types::{AuthRequired, CreateEventRequest, CreateEventResponse, CreatedEvent, ErrorBody};

/// Export endpoint.
pub const CREATE_EVENT_PATH: &str = "/create-event";

/// Starts the OAuth consent flow.
pub const AUTH_PATH: &str = "/auth/google";

/// OAuth redirect target.
pub const AUTH_CALLBACK_PATH: &str = "/auth/google/callback";

/// Liveness check.
pub const HEALTH_PATH: &str = "/healthz";

/// Click sample served from the static directory.
pub const METRONOME_SAMPLE_PATH: &str = "/metronome_out.wav";

/// Name of the signed session cookie.
pub const SESSION_COOKIE: &str = "slowjog.sid";
