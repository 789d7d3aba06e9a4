//! HTTP client for the export server.
//!
//! The client keeps the server's session cookie for the life of the
//! process, so once the browser finishes consent for the URL the server
//! handed out, later exports from this controller are authorized.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, info};

use slowjog_protocol::{CREATE_EVENT_PATH, CreateEventRequest, CreateEventResponse, METRONOME_SAMPLE_PATH};

use crate::error::{ClientError, ClientResult};

/// Keeps the export control disabled while it lives.
#[derive(Debug)]
pub struct InFlight {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Talks to `slowjog server`.
#[derive(Debug, Clone)]
pub struct ExportClient {
    http: reqwest::Client,
    base: Url,
    in_flight: Arc<AtomicBool>,
}

impl ExportClient {
    pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ClientError::Config(format!("invalid server url {:?}: {}", base_url, e)))?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .user_agent(concat!("slowjog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_http_client(base, http))
    }

    pub fn with_http_client(base: Url, http: reqwest::Client) -> Self {
        Self {
            http,
            base,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Claims the export slot. `None` while another export is pending.
    pub fn begin(&self) -> Option<InFlight> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                flag: Arc::clone(&self.in_flight),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        self.base
            .join(path)
            .map_err(|e| ClientError::Config(format!("invalid server url: {}", e)))
    }

    /// Posts one completed session to `/create-event`.
    ///
    /// Every answer the server can give, including a 401 with a consent
    /// URL, comes back as `Ok`; `Err` means the server was unreachable or
    /// replied with something that is not the export protocol.
    pub async fn create_event(&self, request: &CreateEventRequest) -> ClientResult<CreateEventResponse> {
        let url = self.url(CREATE_EVENT_PATH)?;
        debug!(%url, title = %request.title, "posting export");
        let response = self.http.post(url).json(request).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        let parsed = CreateEventResponse::from_http(status, &body)?;
        info!(status, "export answered");
        Ok(parsed)
    }

    /// Downloads the metronome click from the server's static files.
    pub async fn fetch_sample(&self) -> ClientResult<Vec<u8>> {
        let url = self.url(METRONOME_SAMPLE_PATH)?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Audio(format!(
                "sample request failed with {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_slot_is_exclusive_and_released_on_drop() {
        let client = ExportClient::new("http://localhost:3000", Duration::from_secs(1)).unwrap();

        let guard = client.begin().expect("slot is free");
        assert!(client.is_busy());
        assert!(client.begin().is_none());

        drop(guard);
        assert!(!client.is_busy());
        assert!(client.begin().is_some());
    }

    #[test]
    fn clones_share_the_slot() {
        let client = ExportClient::new("http://localhost:3000", Duration::from_secs(1)).unwrap();
        let other = client.clone();
        let _guard = client.begin().unwrap();
        assert!(other.begin().is_none());
    }

    #[test]
    fn guard_is_released_when_a_task_panics() {
        let client = ExportClient::new("http://localhost:3000", Duration::from_secs(1)).unwrap();
        let guard = client.begin().unwrap();
        let result = std::thread::spawn(move || {
            let _guard = guard;
            panic!("export blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(!client.is_busy());
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(
            ExportClient::new("not a url", Duration::from_secs(1)),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn routes_join_onto_base() {
        let client = ExportClient::new("http://jog.local:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.url(CREATE_EVENT_PATH).unwrap().as_str(),
            "http://jog.local:8080/create-event"
        );
        assert_eq!(
            client.url(METRONOME_SAMPLE_PATH).unwrap().as_str(),
            "http://jog.local:8080/metronome_out.wav"
        );
    }
}
