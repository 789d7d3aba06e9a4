//! `tiny_http` front end.
//!
//! One thread accepts connections and polls a stop flag between
//! `recv_timeout` calls. Each request is read and answered on tokio's
//! blocking pool, which drives the async [`RequestHandler`] through the
//! runtime handle.

use std::io::Read;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tiny_http::{Header, Response, Server, StatusCode};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HttpRequest, HttpResponse, Method, RequestHandler};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A running HTTP server. Dropping it stops the accept loop.
pub struct HttpServer {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl HttpServer {
    /// Binds the configured address and starts accepting requests.
    pub fn start(
        config: &ServerConfig,
        handler: Arc<RequestHandler>,
        runtime: Handle,
    ) -> ServerResult<Self> {
        let bind = config.addr();
        let server = Server::http(bind).map_err(|e| ServerError::bind(bind, e.to_string()))?;
        let addr = server.server_addr().to_ip().unwrap_or(bind);

        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let max_body = config.max_body_bytes;
        let join = thread::Builder::new()
            .name("slowjog-http".to_string())
            .spawn(move || run_server_loop(server, handler, runtime, max_body, stop_for_thread))?;

        info!(%addr, "HTTP server listening");
        Ok(Self {
            addr,
            stop,
            join: Some(join),
        })
    }

    /// Address actually bound; differs from the configured one for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting and waits for the accept thread to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
            debug!("HTTP accept loop stopped");
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run_server_loop(
    server: Server,
    handler: Arc<RequestHandler>,
    runtime: Handle,
    max_body: usize,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => {
                let handler = Arc::clone(&handler);
                let inner = runtime.clone();
                runtime.spawn_blocking(move || serve(request, &handler, &inner, max_body));
            }
            Ok(None) => continue,
            Err(e) => warn!(error = %e, "failed to accept request"),
        }
    }
}

fn serve(
    mut request: tiny_http::Request,
    handler: &RequestHandler,
    runtime: &Handle,
    max_body: usize,
) {
    let started = Instant::now();
    let method = Method::from(request.method().to_string().as_str());
    let mut incoming = HttpRequest::new(method, request.url());
    if let Some(cookie) = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Cookie"))
    {
        incoming.cookie = Some(cookie.value.as_str().to_string());
    }

    let method = incoming.method.as_str().to_string();
    let path = incoming.path.clone();

    let response = match read_body(&mut request, max_body) {
        Ok(body) => {
            incoming.body = body;
            runtime.block_on(handler.handle(incoming))
        }
        Err(BodyError::TooLarge) => HttpResponse::text(413, "Payload Too Large"),
        Err(BodyError::Io(e)) => {
            warn!(error = %e, "failed to read request body");
            HttpResponse::text(400, "Bad Request")
        }
    };

    info!(
        %method,
        %path,
        status = response.status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );

    if let Err(e) = request.respond(to_tiny(response)) {
        debug!(error = %e, "client went away before the response was written");
    }
}

enum BodyError {
    TooLarge,
    Io(std::io::Error),
}

fn read_body(request: &mut tiny_http::Request, max_body: usize) -> Result<Vec<u8>, BodyError> {
    if request.body_length().is_some_and(|len| len > max_body) {
        return Err(BodyError::TooLarge);
    }
    let mut body = Vec::new();
    request
        .as_reader()
        .take(max_body as u64 + 1)
        .read_to_end(&mut body)
        .map_err(BodyError::Io)?;
    if body.len() > max_body {
        return Err(BodyError::TooLarge);
    }
    Ok(body)
}

fn to_tiny(response: HttpResponse) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut out = Response::from_data(response.body).with_status_code(StatusCode(response.status));
    for (name, value) in &response.headers {
        match Header::from_str(&format!("{name}: {value}")) {
            Ok(header) => out.add_header(header),
            Err(()) => error!(header = %name, "dropping malformed response header"),
        }
    }
    out
}
