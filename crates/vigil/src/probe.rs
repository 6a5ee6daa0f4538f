//! Outbound probe requests.
//!
//! The scheduler only sees the [`Transport`] trait; [`HttpTransport`] is the
//! reqwest-backed implementation used by the server.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tokio::time::timeout;
use tracing::debug;

use crate::assertions;
use crate::model::{EndpointConfig, FailureReason, Headers, Method, ProbeOutcome, RequestBody};

/// Default `User-Agent` sent with every probe
pub const DEFAULT_USER_AGENT: &str = concat!("vigil/", env!("CARGO_PKG_VERSION"));

/// Everything needed to issue one probe
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub method: Method,
    pub url: String,
    pub headers: Option<Headers>,
    pub body: Option<RequestBody>,
    pub timeout: Duration,
}

impl ProbeRequest {
    pub fn from_config(config: &EndpointConfig) -> Self {
        Self {
            method: config.method.clone(),
            url: config.url.clone(),
            headers: config.headers.clone(),
            body: config.body.clone(),
            timeout: config.timeout(),
        }
    }
}

/// A received response, fully buffered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
    pub latency_ms: u64,
}

/// Issues probe requests. Any error is reported as `network_error`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse>;
}

/// HTTP/HTTPS transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| anyhow!("invalid method {}: {}", request.method, e))?;

        let mut builder = self.client.request(method, &request.url).timeout(request.timeout);
        if let Some(headers) = &request.headers {
            for (name, value) in headers.iter() {
                builder = builder.header(name, value);
            }
        }
        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            None => builder,
        };

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| anyhow!("HTTP request failed: {}", e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| anyhow!("failed to read response body: {}", e))?;
        let latency_ms = start.elapsed().as_millis() as u64;

        Ok(ProbeResponse { status, body, latency_ms })
    }
}

/// Run one probe against `config` and evaluate its assertions.
///
/// The transport call is bounded by the endpoint's timeout regardless of how
/// the transport handles deadlines itself.
pub async fn execute(transport: &dyn Transport, config: &EndpointConfig) -> ProbeOutcome {
    let request = ProbeRequest::from_config(config);

    match timeout(request.timeout, transport.send(&request)).await {
        Ok(Ok(response)) => {
            debug!(id = %config.id, status = response.status, latency_ms = response.latency_ms, "probe response");
            assertions::evaluate(config, &response)
        }
        Ok(Err(e)) => ProbeOutcome::failed(FailureReason::NetworkError, format!("{e:#}")),
        Err(_) => ProbeOutcome::failed(
            FailureReason::NetworkError,
            format!("timed out after {}s", config.timeout_seconds),
        ),
    }
}
