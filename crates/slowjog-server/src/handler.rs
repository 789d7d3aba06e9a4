//! Request routing.
//!
//! The handler works on a small owned request/response model so routes can
//! be exercised without a socket; [`crate::http`] converts to and from
//! `tiny_http`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use slowjog_protocol::{
    AUTH_CALLBACK_PATH, AUTH_PATH, AuthRequired, CREATE_EVENT_PATH, CreateEventRequest,
    CreatedEvent, ErrorBody, HEALTH_PATH, SESSION_COOKIE,
};
use slowjog_providers::google::generate_state;
use slowjog_providers::{CalendarExporter, NewEvent};

use crate::assets::{AssetError, StaticFiles};
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::session::{CookieSigner, SessionStore, cookie_value, set_cookie};

const AUTHORIZATION_REQUIRED: &str = "需要授權";
const REAUTHORIZATION_REQUIRED: &str = "需重新授權";
const CREATE_EVENT_FAILED: &str = "建立事件失敗";
const OAUTH_CALLBACK_ERROR: &str = "OAuth callback error";

/// HTTP method, as far as routing cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Other(other) => other,
        }
    }
}

impl From<&str> for Method {
    fn from(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            other => Self::Other(other.to_string()),
        }
    }
}

/// An incoming request with its body already read.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    /// Raw `Cookie` header, if any.
    pub cookie: Option<String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Splits `url` into path and query.
    pub fn new(method: Method, url: &str) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (url.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            cookie: None,
            body: Vec::new(),
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of query parameter `name`, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// A response ready to be written.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.into(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body)
    }

    pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(payload) => Self::new(status, "application/json; charset=utf-8", payload),
            Err(e) => {
                error!(error = %e, "failed to serialize response body");
                Self::text(500, "Internal Server Error")
            }
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self::text(302, "Found").with_header("Location", location)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Routes requests to the export API, the OAuth flow, and static files.
pub struct RequestHandler {
    exporter: Arc<dyn CalendarExporter>,
    sessions: SessionStore,
    signer: CookieSigner,
    assets: StaticFiles,
}

impl RequestHandler {
    pub fn new(exporter: Arc<dyn CalendarExporter>, config: &ServerConfig) -> ServerResult<Self> {
        Ok(Self {
            exporter,
            sessions: SessionStore::new(config.session_ttl),
            signer: CookieSigner::new(&config.session_secret)?,
            assets: StaticFiles::new(&config.static_dir),
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        match (&request.method, request.path.as_str()) {
            (Method::Post, CREATE_EVENT_PATH) => self.create_event(&request).await,
            (Method::Get, AUTH_PATH) => self.start_authorization(&request),
            (Method::Get, AUTH_CALLBACK_PATH) => self.authorization_callback(&request).await,
            (Method::Get | Method::Head, HEALTH_PATH) => HttpResponse::text(200, "ok"),
            (_, CREATE_EVENT_PATH) => method_not_allowed("POST"),
            (_, AUTH_PATH | AUTH_CALLBACK_PATH) => method_not_allowed("GET"),
            (Method::Get | Method::Head, path) => self.static_file(path),
            _ => method_not_allowed("GET, HEAD"),
        }
    }

    /// Session id named by the request cookie, or a new session.
    fn session_id(&self, request: &HttpRequest) -> String {
        let claimed = request
            .cookie
            .as_deref()
            .and_then(|header| cookie_value(header, SESSION_COOKIE))
            .and_then(|value| self.signer.verify(value));
        self.sessions.resolve(claimed.as_deref())
    }

    fn with_session(&self, response: HttpResponse, session_id: &str) -> HttpResponse {
        let cookie = set_cookie(SESSION_COOKIE, &self.signer.sign(session_id));
        response.with_header("Set-Cookie", cookie)
    }

    /// Consent URL whose `state` is bound to `session_id`.
    fn consent_url(&self, session_id: &str) -> String {
        let state = generate_state();
        self.sessions.begin_authorization(session_id, state.clone());
        self.exporter.authorization_url(&state)
    }

    fn authorization_required(&self, session_id: &str, message: &str) -> HttpResponse {
        let body = AuthRequired {
            error: message.to_string(),
            auth_url: self.consent_url(session_id),
        };
        HttpResponse::json(401, &body)
    }

    async fn create_event(&self, request: &HttpRequest) -> HttpResponse {
        let session_id = self.session_id(request);
        let response = self.create_event_for(&session_id, &request.body).await;
        self.with_session(response, &session_id)
    }

    async fn create_event_for(&self, session_id: &str, body: &[u8]) -> HttpResponse {
        let event = match CreateEventRequest::from_json(body) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "rejected create-event body");
                return HttpResponse::json(400, &ErrorBody::new(e.to_string()));
            }
        };

        let Some(tokens) = self.sessions.tokens(session_id) else {
            debug!("no tokens in session, asking for authorization");
            return self.authorization_required(session_id, AUTHORIZATION_REQUIRED);
        };

        let event = NewEvent::new(event.title, event.description, event.start, event.end);
        match self.exporter.export(&tokens, &event).await {
            Ok(receipt) => {
                if let Some(fresh) = receipt.refreshed {
                    self.sessions.set_tokens(session_id, fresh);
                }
                info!(event_id = %receipt.event_id, "created calendar event");
                HttpResponse::json(200, &CreatedEvent::new(receipt.event_id))
            }
            Err(e) if e.requires_reauthorization() => {
                warn!(error = %e, "calendar rejected credentials, clearing session tokens");
                self.sessions.clear_tokens(session_id);
                self.authorization_required(session_id, REAUTHORIZATION_REQUIRED)
            }
            Err(e) => {
                error!(error = %e, "create-event failed");
                HttpResponse::json(500, &ErrorBody::new(CREATE_EVENT_FAILED))
            }
        }
    }

    fn start_authorization(&self, request: &HttpRequest) -> HttpResponse {
        let session_id = self.session_id(request);
        let url = self.consent_url(&session_id);
        debug!("redirecting to consent screen");
        self.with_session(HttpResponse::redirect(&url), &session_id)
    }

    async fn authorization_callback(&self, request: &HttpRequest) -> HttpResponse {
        if let Some(denied) = request.query_param("error") {
            warn!(error = %denied, "authorization was not granted");
            return HttpResponse::text(400, &format!("authorization denied: {denied}"));
        }
        let Some(code) = request.query_param("code") else {
            return HttpResponse::text(400, "missing authorization code");
        };
        let Some(session_id) = request
            .query_param("state")
            .and_then(|state| self.sessions.complete_authorization(&state))
        else {
            warn!("OAuth callback with unknown state");
            return HttpResponse::text(400, "invalid OAuth state");
        };

        match self.exporter.exchange_code(&code).await {
            Ok(tokens) => {
                self.sessions.set_tokens(&session_id, tokens);
                info!("stored tokens in session");
                self.with_session(HttpResponse::redirect("/"), &session_id)
            }
            Err(e) => {
                error!(error = %e, "OAuth callback error");
                HttpResponse::text(500, OAUTH_CALLBACK_ERROR)
            }
        }
    }

    fn static_file(&self, path: &str) -> HttpResponse {
        match self.assets.load(path) {
            Ok(asset) => HttpResponse::new(200, asset.content_type, asset.body),
            Err(AssetError::NotFound) => HttpResponse::text(404, "Not Found"),
            Err(AssetError::Forbidden) => {
                warn!(path, "refused path outside the static directory");
                HttpResponse::text(403, "Forbidden")
            }
            Err(AssetError::Io(e)) => {
                error!(path, error = %e, "failed to read static file");
                HttpResponse::text(500, "Internal Server Error")
            }
        }
    }
}

fn method_not_allowed(allow: &str) -> HttpResponse {
    HttpResponse::text(405, "Method Not Allowed").with_header("Allow", allow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use slowjog_providers::{BoxFuture, ProviderError, ProviderResult, TokenInfo};
    use tempfile::TempDir;

    /// Scripted exporter: each insert pops the next outcome.
    #[derive(Default)]
    struct ScriptedExporter {
        inserts: Mutex<Vec<ProviderResult<String>>>,
        exchange_fails: bool,
        seen_tokens: Mutex<Vec<String>>,
    }

    impl ScriptedExporter {
        fn inserting(outcomes: Vec<ProviderResult<String>>) -> Self {
            Self {
                inserts: Mutex::new(outcomes),
                ..Self::default()
            }
        }
    }

    impl CalendarExporter for ScriptedExporter {
        fn name(&self) -> &str {
            "scripted"
        }

        fn authorization_url(&self, state: &str) -> String {
            format!("https://consent.test/auth?state={state}")
        }

        fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, ProviderResult<TokenInfo>> {
            Box::pin(async move {
                if self.exchange_fails {
                    return Err(ProviderError::authentication("invalid_grant"));
                }
                Ok(TokenInfo::new(format!("token-for-{code}"), None, Some(3600), vec![]))
            })
        }

        fn refresh<'a>(&'a self, tokens: &'a TokenInfo) -> BoxFuture<'a, ProviderResult<TokenInfo>> {
            Box::pin(async move { Ok(tokens.refreshed("refreshed", Some(3600), None)) })
        }

        fn insert_event<'a>(
            &'a self,
            tokens: &'a TokenInfo,
            _event: &'a NewEvent,
        ) -> BoxFuture<'a, ProviderResult<String>> {
            Box::pin(async move {
                self.seen_tokens
                    .lock()
                    .unwrap()
                    .push(tokens.access_token.clone());
                self.inserts.lock().unwrap().remove(0)
            })
        }
    }

    const BODY: &str = r#"{"title":"超慢跑：00:05","description":"運動記錄","start":"2025-03-01T06:00:00.000Z","end":"2025-03-01T06:00:05.000Z"}"#;

    fn handler(exporter: ScriptedExporter) -> (TempDir, RequestHandler) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>timer</h1>").unwrap();
        let config = ServerConfig::default()
            .with_static_dir(dir.path())
            .with_session_secret("test-secret");
        let handler = RequestHandler::new(Arc::new(exporter), &config).unwrap();
        (dir, handler)
    }

    fn session_cookie(response: &HttpResponse) -> String {
        let set_cookie = response.header("Set-Cookie").expect("session cookie");
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn state_of(url: &str) -> String {
        url.rsplit_once("state=").unwrap().1.to_string()
    }

    fn json(response: &HttpResponse) -> serde_json::Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    fn create(cookie: Option<&str>) -> HttpRequest {
        let request = HttpRequest::new(Method::Post, CREATE_EVENT_PATH).with_body(BODY);
        match cookie {
            Some(cookie) => request.with_cookie(cookie),
            None => request,
        }
    }

    /// Runs the consent flow for the session behind `cookie`.
    async fn authorize(handler: &RequestHandler, cookie: &str) {
        let start = handler
            .handle(HttpRequest::new(Method::Get, AUTH_PATH).with_cookie(cookie))
            .await;
        let state = state_of(start.header("Location").unwrap());
        let callback = handler
            .handle(HttpRequest::new(
                Method::Get,
                &format!("{AUTH_CALLBACK_PATH}?code=c0de&state={state}"),
            ))
            .await;
        assert_eq!(callback.status, 302);
    }

    #[tokio::test]
    async fn create_event_without_tokens_asks_for_authorization() {
        let (_dir, handler) = handler(ScriptedExporter::default());

        let response = handler.handle(create(None)).await;

        assert_eq!(response.status, 401);
        let body = json(&response);
        assert_eq!(body["error"], AUTHORIZATION_REQUIRED);
        assert!(
            body["authUrl"]
                .as_str()
                .unwrap()
                .starts_with("https://consent.test/auth?state=")
        );
        assert!(session_cookie(&response).starts_with("slowjog.sid="));
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_before_authorization() {
        let (_dir, handler) = handler(ScriptedExporter::default());
        let request = HttpRequest::new(Method::Post, CREATE_EVENT_PATH).with_body("{oops");

        let response = handler.handle(request).await;

        assert_eq!(response.status, 400);
        assert!(json(&response)["error"].as_str().unwrap().contains("malformed"));
    }

    #[tokio::test]
    async fn empty_title_and_inverted_range_are_bad_requests() {
        let (_dir, handler) = handler(ScriptedExporter::default());
        let cases = [
            (
                r#"{"title":"  ","description":"","start":"2025-03-01T06:00:00Z","end":"2025-03-01T06:15:00Z"}"#,
                "missing field: title",
            ),
            (
                r#"{"title":"超慢跑：15:00","description":"","start":"2025-03-01T06:15:00Z","end":"2025-03-01T06:00:00Z"}"#,
                "before it starts",
            ),
        ];

        for (body, expected) in cases {
            let request = HttpRequest::new(Method::Post, CREATE_EVENT_PATH).with_body(body);
            let response = handler.handle(request).await;

            assert_eq!(response.status, 400, "{body}");
            assert!(json(&response)["error"].as_str().unwrap().contains(expected));
        }
    }

    #[tokio::test]
    async fn authorized_session_creates_event() {
        let (_dir, handler) = handler(ScriptedExporter::inserting(vec![Ok("evt-1".into())]));
        let first = handler.handle(create(None)).await;
        let cookie = session_cookie(&first);

        authorize(&handler, &cookie).await;
        let response = handler.handle(create(Some(&cookie))).await;

        assert_eq!(response.status, 200);
        assert_eq!(json(&response), serde_json::json!({"success": true, "id": "evt-1"}));
    }

    #[tokio::test]
    async fn callback_finishes_flow_started_by_another_client() {
        let (_dir, handler) = handler(ScriptedExporter::inserting(vec![Ok("evt-1".into())]));
        let controller = handler.handle(create(None)).await;
        let cookie = session_cookie(&controller);
        let state = state_of(json(&controller)["authUrl"].as_str().unwrap());

        // The browser has no cookie; the state alone binds the callback.
        let callback = handler
            .handle(HttpRequest::new(
                Method::Get,
                &format!("{AUTH_CALLBACK_PATH}?code=c0de&state={state}"),
            ))
            .await;
        assert_eq!(callback.status, 302);
        assert_eq!(callback.header("Location"), Some("/"));
        assert_eq!(session_cookie(&callback), cookie);

        let response = handler.handle(create(Some(&cookie))).await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn upstream_rejection_clears_tokens() {
        let exporter = ScriptedExporter::inserting(vec![Err(ProviderError::authentication(
            "credentials rejected",
        ))]);
        let (_dir, handler) = handler(exporter);
        let cookie = session_cookie(&handler.handle(create(None)).await);
        authorize(&handler, &cookie).await;

        let response = handler.handle(create(Some(&cookie))).await;

        assert_eq!(response.status, 401);
        let body = json(&response);
        assert_eq!(body["error"], REAUTHORIZATION_REQUIRED);
        assert!(body["authUrl"].is_string());

        // Tokens are gone: the next attempt asks for consent without calling upstream.
        let again = handler.handle(create(Some(&cookie))).await;
        assert_eq!(again.status, 401);
        assert_eq!(json(&again)["error"], AUTHORIZATION_REQUIRED);
    }

    #[tokio::test]
    async fn other_failures_are_500() {
        let exporter =
            ScriptedExporter::inserting(vec![Err(ProviderError::server("backend exploded"))]);
        let (_dir, handler) = handler(exporter);
        let cookie = session_cookie(&handler.handle(create(None)).await);
        authorize(&handler, &cookie).await;

        let response = handler.handle(create(Some(&cookie))).await;

        assert_eq!(response.status, 500);
        assert_eq!(json(&response), serde_json::json!({"error": CREATE_EVENT_FAILED}));
    }

    #[tokio::test]
    async fn auth_start_redirects_with_bound_state() {
        let (_dir, handler) = handler(ScriptedExporter::default());

        let response = handler.handle(HttpRequest::new(Method::Get, AUTH_PATH)).await;

        assert_eq!(response.status, 302);
        let location = response.header("Location").unwrap();
        assert!(location.starts_with("https://consent.test/auth?state="));
        assert!(handler.sessions().complete_authorization(&state_of(location)).is_some());
    }

    #[tokio::test]
    async fn callback_rejects_missing_code_and_unknown_state() {
        let (_dir, handler) = handler(ScriptedExporter::default());

        let no_code = handler
            .handle(HttpRequest::new(Method::Get, AUTH_CALLBACK_PATH))
            .await;
        assert_eq!(no_code.status, 400);

        let bad_state = handler
            .handle(HttpRequest::new(
                Method::Get,
                &format!("{AUTH_CALLBACK_PATH}?code=c&state=forged"),
            ))
            .await;
        assert_eq!(bad_state.status, 400);

        let denied = handler
            .handle(HttpRequest::new(
                Method::Get,
                &format!("{AUTH_CALLBACK_PATH}?error=access_denied"),
            ))
            .await;
        assert_eq!(denied.status, 400);
    }

    #[tokio::test]
    async fn failed_exchange_is_500() {
        let exporter = ScriptedExporter {
            exchange_fails: true,
            ..ScriptedExporter::default()
        };
        let (_dir, handler) = handler(exporter);
        let start = handler.handle(HttpRequest::new(Method::Get, AUTH_PATH)).await;
        let state = state_of(start.header("Location").unwrap());

        let response = handler
            .handle(HttpRequest::new(
                Method::Get,
                &format!("{AUTH_CALLBACK_PATH}?code=c&state={state}"),
            ))
            .await;

        assert_eq!(response.status, 500);
        assert_eq!(response.body, OAUTH_CALLBACK_ERROR.as_bytes());
    }

    #[tokio::test]
    async fn forged_cookie_gets_a_fresh_session() {
        let (_dir, handler) = handler(ScriptedExporter::inserting(vec![Ok("evt".into())]));
        let cookie = session_cookie(&handler.handle(create(None)).await);
        authorize(&handler, &cookie).await;

        let forged = format!("{}x", cookie);
        let response = handler.handle(create(Some(&forged))).await;

        assert_eq!(response.status, 401);
        assert_ne!(session_cookie(&response), cookie);
    }

    #[tokio::test]
    async fn static_routes_and_methods() {
        let (_dir, handler) = handler(ScriptedExporter::default());

        let index = handler.handle(HttpRequest::new(Method::Get, "/")).await;
        assert_eq!(index.status, 200);
        assert_eq!(index.body, b"<h1>timer</h1>");
        assert!(index.header("Set-Cookie").is_none());

        let health = handler.handle(HttpRequest::new(Method::Get, HEALTH_PATH)).await;
        assert_eq!((health.status, health.body.as_slice()), (200, b"ok".as_slice()));

        let missing = handler.handle(HttpRequest::new(Method::Get, "/nope")).await;
        assert_eq!(missing.status, 404);

        let traversal = handler.handle(HttpRequest::new(Method::Get, "/../etc/passwd")).await;
        assert_eq!(traversal.status, 403);

        let put = handler.handle(HttpRequest::new(Method::from("PUT"), "/")).await;
        assert_eq!(put.status, 405);

        let get_export = handler
            .handle(HttpRequest::new(Method::Get, CREATE_EVENT_PATH))
            .await;
        assert_eq!(get_export.status, 405);
        assert_eq!(get_export.header("Allow"), Some("POST"));
    }

    #[test]
    fn request_parsing() {
        let request = HttpRequest::new(Method::from("get"), "/auth/google/callback?code=4%2Fabc&state=x");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/auth/google/callback");
        assert_eq!(request.query_param("code").as_deref(), Some("4/abc"));
        assert_eq!(request.query_param("state").as_deref(), Some("x"));
        assert!(request.query_param("missing").is_none());
    }
}
