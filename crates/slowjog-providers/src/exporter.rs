//! CalendarExporter trait definition.
//!
//! An exporter owns the OAuth dance and the write path to one calendar
//! backend. It holds no per-user state: tokens are passed in by the caller
//! (the server keeps them in the browser's session).

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::error::{ProviderError, ProviderResult};
use crate::google::TokenInfo;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object safe so the server can hold a
/// `dyn CalendarExporter`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A calendar event to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl NewEvent {
    pub fn new(
        summary: impl Into<String>,
        description: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            summary: summary.into(),
            description: description.into(),
            start,
            end,
        }
    }
}

/// Outcome of [`CalendarExporter::export`].
#[derive(Debug, Clone)]
pub struct ExportReceipt {
    /// Identifier the backend assigned to the new event.
    pub event_id: String,
    /// Set when the access token was refreshed on the way; the caller
    /// should store it in place of the old set.
    pub refreshed: Option<TokenInfo>,
}

/// The core abstraction for calendar export backends.
///
/// # Example Implementation
///
/// ```ignore
/// impl CalendarExporter for MyExporter {
///     fn name(&self) -> &str { "mine" }
///
///     fn insert_event<'a>(
///         &'a self,
///         tokens: &'a TokenInfo,
///         event: &'a NewEvent,
///     ) -> BoxFuture<'a, ProviderResult<String>> {
///         Box::pin(async move { self.client.insert(&tokens.access_token, event).await })
///     }
///     // ... other methods
/// }
/// ```
pub trait CalendarExporter: Send + Sync {
    /// Returns the name of this backend (e.g. "google").
    fn name(&self) -> &str;

    /// Builds the consent URL the browser is sent to.
    ///
    /// `state` is echoed back on the callback and must be checked there.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchanges an authorization code for a token set.
    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, ProviderResult<TokenInfo>>;

    /// Obtains a new access token from the refresh token in `tokens`.
    fn refresh<'a>(&'a self, tokens: &'a TokenInfo) -> BoxFuture<'a, ProviderResult<TokenInfo>>;

    /// Creates `event` in the primary calendar and returns its id.
    ///
    /// # Errors
    ///
    /// Rejected credentials surface as
    /// [`ProviderErrorCode::AuthenticationFailed`](crate::ProviderErrorCode).
    fn insert_event<'a>(
        &'a self,
        tokens: &'a TokenInfo,
        event: &'a NewEvent,
    ) -> BoxFuture<'a, ProviderResult<String>>;

    /// Refreshes `tokens` if they have expired, then inserts `event`.
    ///
    /// Any refresh failure is reported as an authentication failure so the
    /// caller sends the user back through consent.
    fn export<'a>(
        &'a self,
        tokens: &'a TokenInfo,
        event: &'a NewEvent,
    ) -> BoxFuture<'a, ProviderResult<ExportReceipt>> {
        Box::pin(async move {
            let refreshed = if tokens.is_expired() {
                if tokens.refresh_token.is_none() {
                    return Err(ProviderError::authentication(
                        "access token expired and no refresh token is available",
                    )
                    .with_provider(self.name()));
                }
                let fresh = self.refresh(tokens).await.map_err(|e| {
                    ProviderError::authentication(format!("token refresh failed: {}", e.message()))
                        .with_provider(self.name())
                        .with_source(e)
                })?;
                Some(fresh)
            } else {
                None
            };

            let current = refreshed.as_ref().unwrap_or(tokens);
            let event_id = self.insert_event(current, event).await?;
            Ok(ExportReceipt {
                event_id,
                refreshed,
            })
        })
    }
}
