//! OAuth token sets.
//!
//! Tokens never touch the disk: the server keeps them in the session of the
//! browser that authorized, and they vanish with the process.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Seconds shaved off the advertised lifetime so a token is refreshed
/// before Google starts rejecting it.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// Information about an OAuth token set.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    pub refresh_token: Option<String>,

    /// When the access token expires.
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    pub scopes: Vec<String>,

    /// When the tokens were last refreshed.
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    /// Creates a new token info from OAuth response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(|secs| expiry_from(now, secs)),
            scopes,
            last_refresh: now,
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            // No expiry advertised: treat as valid until Google says otherwise.
            None => false,
        }
    }

    /// Returns true if the token has the required scopes.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Returns a copy carrying a refreshed access token.
    ///
    /// Google usually omits the refresh token and scope from a refresh
    /// response; the existing ones are kept in that case.
    pub fn refreshed(
        &self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
        scope: Option<&str>,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            refresh_token: self.refresh_token.clone(),
            expires_at: expires_in_secs.map(|secs| expiry_from(now, secs)),
            scopes: scope.map(split_scopes).unwrap_or_else(|| self.scopes.clone()),
            last_refresh: now,
        }
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|expires_at| expires_at - Utc::now())
    }
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("last_refresh", &self.last_refresh)
            .finish()
    }
}

fn expiry_from(now: DateTime<Utc>, expires_in_secs: i64) -> DateTime<Utc> {
    let lifetime = expires_in_secs.saturating_sub(EXPIRY_BUFFER_SECS).max(0);
    now + Duration::try_seconds(lifetime).unwrap_or(Duration::zero())
}

/// Splits the space-separated `scope` field of a token response.
pub(crate) fn split_scopes(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(String::from).collect()
}
