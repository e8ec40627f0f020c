//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! One [`HttpRpcClient`] is one pooled connection: it keeps at most one idle
//! keep-alive socket to the node, so a pool of `N` clients holds `N`
//! independent connections. Batches go out as a single JSON array.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::value::RawValue;
use tracing::{debug, warn};

use chainfetch_core::config::ClientConfig;
use chainfetch_core::error::TransportError;
use chainfetch_core::request::{JsonRpcRequest, JsonRpcResponse};
use chainfetch_core::transport::{Connect, RpcTransport};

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Upper bound on one HTTP exchange, enforced by `reqwest`.
    pub request_timeout: Duration,
    /// How long an idle keep-alive socket is kept open.
    pub idle_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
        }
    }
}

impl From<&ClientConfig> for HttpClientConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            ..Self::default()
        }
    }
}

/// HTTP JSON-RPC connection.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: &HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_idle_timeout(config.idle_timeout)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| TransportError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, &HttpClientConfig::default())
    }

    /// POST `body` and return the response bytes of a 2xx reply.
    async fn post<B: serde::Serialize + ?Sized>(&self, body: &B) -> Result<Vec<u8>, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| http_error(&self.url, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            warn!(url = %self.url, status, "node returned an error status");
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        let body = resp.bytes().await.map_err(|e| http_error(&self.url, e))?;
        Ok(body.to_vec())
    }
}

fn http_error(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        warn!(url, error = %e, "HTTP request timed out");
    }
    TransportError::Http(e.to_string())
}

/// A body that should be a batch reply but is one object: the node rejected
/// the whole batch (rate limit, batch too large).
fn rejected_batch(body: &[u8]) -> TransportError {
    match serde_json::from_slice::<JsonRpcResponse>(body) {
        Ok(JsonRpcResponse {
            error: Some(err), ..
        }) => TransportError::MalformedResponse(format!("batch rejected: {err}")),
        _ => TransportError::MalformedResponse("expected a JSON array for a batch request".into()),
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let body = self.post(&req).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// True HTTP batch: send all requests as a JSON array in one HTTP call.
    async fn send_batch(&self, reqs: &[JsonRpcRequest]) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        let body = self.post(reqs).await?;

        // Peek at the top-level kind without decoding the elements twice.
        let raw: &RawValue = serde_json::from_slice(&body)?;
        if !raw.get().starts_with('[') {
            return Err(rejected_batch(&body));
        }
        let responses: Vec<JsonRpcResponse> = serde_json::from_str(raw.get())?;
        debug!(url = %self.url, sent = reqs.len(), received = responses.len(), "batch round trip");
        Ok(responses)
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Dials [`HttpRpcClient`] connections for a
/// [`ConnectionPool`](chainfetch_core::ConnectionPool).
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    config: HttpClientConfig,
}

impl HttpConnector {
    pub fn new(config: HttpClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connect for HttpConnector {
    type Conn = HttpRpcClient;

    async fn connect(&self, url: &str) -> Result<HttpRpcClient, TransportError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(TransportError::Other(format!("not an HTTP endpoint: {url}")));
        }
        HttpRpcClient::new(url, &self.config)
    }
}
