//! Cookie-backed in-memory sessions.
//!
//! Each browser (or controller) gets a random session id carried in an
//! HMAC-SHA256 signed cookie. The session holds the Google tokens once the
//! user has authorized, and the pending OAuth `state` while consent is in
//! progress. Nothing is persisted; a restart logs everyone out.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::Rng as _;
use sha2::Sha256;
use tracing::debug;

use slowjog_providers::TokenInfo;

use crate::error::{ServerError, ServerResult};

type HmacSha256 = Hmac<Sha256>;

/// Random bytes behind each session id.
const SESSION_ID_LENGTH: usize = 24;

/// Signs and verifies session cookie values of the form `<id>.<signature>`.
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    pub fn new(secret: &str) -> ServerResult<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ServerError::config(format!("invalid session secret: {e}")))?;
        Ok(Self { mac })
    }

    /// Returns the cookie value for `id`.
    pub fn sign(&self, id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{id}.{signature}")
    }

    /// Returns the session id if `value` carries a valid signature.
    pub fn verify(&self, value: &str) -> Option<String> {
        let (id, signature) = value.rsplit_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(id.to_string())
    }
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CookieSigner(..)")
    }
}

/// Finds `name` in a `Cookie` request header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Builds a `Set-Cookie` header value for the session cookie.
pub fn set_cookie(name: &str, value: &str) -> String {
    format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax")
}

fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..SESSION_ID_LENGTH).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

#[derive(Debug)]
struct SessionData {
    tokens: Option<TokenInfo>,
    oauth_state: Option<String>,
    last_seen: Instant,
}

impl SessionData {
    fn new() -> Self {
        Self {
            tokens: None,
            oauth_state: None,
            last_seen: Instant::now(),
        }
    }
}

/// All live sessions, keyed by session id.
///
/// The lock is only ever held for map operations, never across an await.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionData>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionData>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `id` if it names a live session, or the id of a fresh one.
    pub fn resolve(&self, id: Option<&str>) -> String {
        let mut sessions = self.lock();
        if let Some(id) = id
            && let Some(session) = sessions.get_mut(id)
        {
            session.last_seen = Instant::now();
            return id.to_string();
        }

        let ttl = self.ttl;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_seen.elapsed() < ttl);
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "pruned idle sessions");
        }

        let id = generate_session_id();
        sessions.insert(id.clone(), SessionData::new());
        debug!(sessions = sessions.len(), "created session");
        id
    }

    pub fn tokens(&self, id: &str) -> Option<TokenInfo> {
        self.lock().get(id).and_then(|s| s.tokens.clone())
    }

    pub fn set_tokens(&self, id: &str, tokens: TokenInfo) {
        self.lock()
            .entry(id.to_string())
            .or_insert_with(SessionData::new)
            .tokens = Some(tokens);
    }

    pub fn clear_tokens(&self, id: &str) {
        if let Some(session) = self.lock().get_mut(id) {
            session.tokens = None;
        }
    }

    /// Remembers the `state` sent to the consent screen for session `id`.
    ///
    /// A newer flow replaces an unfinished one.
    pub fn begin_authorization(&self, id: &str, state: impl Into<String>) {
        self.lock()
            .entry(id.to_string())
            .or_insert_with(SessionData::new)
            .oauth_state = Some(state.into());
    }

    /// Consumes a pending `state` and returns the session that issued it.
    ///
    /// The callback is matched by state rather than by cookie: consent may
    /// finish in a browser that never saw the controller's cookie.
    pub fn complete_authorization(&self, state: &str) -> Option<String> {
        let mut sessions = self.lock();
        let (id, session) = sessions
            .iter_mut()
            .find(|(_, s)| s.oauth_state.as_deref() == Some(state))?;
        session.oauth_state = None;
        session.last_seen = Instant::now();
        Some(id.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
