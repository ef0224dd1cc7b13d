// Transport - capa HTTP y pausas del cliente del explorer
// Separa el I/O (GET + sleeps) de la lógica de clasificación/reintentos para poder testearla

use crate::error::ExplorerError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Raw HTTP outcome: status code plus the unparsed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Issues one GET against the explorer endpoint with the given query pairs.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, query: &[(String, String)]) -> Result<HttpReply, ExplorerError>;
}

/// Why the client or scanner is about to sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseReason {
    /// Inter-page / inter-range throttle.
    Courtesy,
    /// Fixed wait after a rate-limit response.
    RateLimitCooldown,
    /// Exponential backoff before retrying a transient failure.
    Backoff,
}

/// Every suspension point goes through a `Pacer`.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, reason: PauseReason, duration: Duration);
}

pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, reason: PauseReason, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        debug!("[Pacer] {:?} pause for {:?}", reason, duration);
        tokio::time::sleep(duration).await;
    }
}

/// `reqwest`-backed transport for a single explorer endpoint.
pub struct HttpTransport {
    http: reqwest::Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(
        api_url: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, ExplorerError> {
        let url = Url::parse(api_url)
            .map_err(|e| ExplorerError::Init(format!("invalid explorer URL {}: {}", api_url, e)))?;
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(connect_timeout + read_timeout)
            .build()
            .map_err(|e| ExplorerError::Init(e.to_string()))?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, query: &[(String, String)]) -> Result<HttpReply, ExplorerError> {
        let response = self
            .http
            .get(self.url.clone())
            .query(query)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(HttpReply { status, body })
    }
}

// Errores de construcción de la request son bugs nuestros; el resto (timeout, connect,
// body cortado) se reintenta
fn map_reqwest_error(e: reqwest::Error) -> ExplorerError {
    if e.is_builder() {
        ExplorerError::Init(e.to_string())
    } else {
        ExplorerError::Network(e.to_string())
    }
}
