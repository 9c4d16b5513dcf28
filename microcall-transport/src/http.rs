use async_trait::async_trait;
use bytes::Bytes;
use microcall_core::{OutboundRequest, RawResponse, RetryPolicy, TransportFailure};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::transport::{RequestExecutor, TransportError};

/// Settings for the reqwest-backed executor.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-attempt timeout covering connect, send and body read.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("microcall/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Executes requests over HTTP with reqwest.
///
/// Connection errors and 5xx answers are retried according to the
/// [`RetryPolicy`]; any other non-2xx answer is final.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        if config.timeout.is_zero() {
            return Err(TransportError::Config("timeout must be positive".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn attempt(
        &self,
        request: &OutboundRequest,
        url: &str,
        body: Option<Bytes>,
    ) -> Result<RawResponse, TransportFailure> {
        let mut builder = self
            .client
            .request(request.verb.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportFailure::connection(e.to_string()))?;
        let status = response.status();
        let headers = response.headers().clone();
        match response.bytes().await {
            Ok(body) => Ok(RawResponse::new(status, headers, body)),
            Err(e) => unreadable_body(status, headers, &e),
        }
    }
}

/// The status survives a body that breaks off mid-read. A success without its
/// body is useless, so only that case becomes a connection failure.
fn unreadable_body(
    status: StatusCode,
    headers: HeaderMap,
    error: &dyn fmt::Display,
) -> Result<RawResponse, TransportFailure> {
    if status.is_success() {
        return Err(TransportFailure::connection(format!(
            "reading the body of a {} answer failed: {}",
            status, error
        )));
    }
    warn!(%status, error = %error, "Response body could not be read");
    Ok(RawResponse::new(status, headers, Bytes::new()))
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(
        &self,
        request: &OutboundRequest,
        body: Option<Bytes>,
        retry: &RetryPolicy,
    ) -> Result<RawResponse, TransportFailure> {
        let url = request.url.as_deref().ok_or_else(|| {
            TransportFailure::connection(format!(
                "No address resolved for service '{}'",
                request.service
            ))
        })?;

        let attempts = retry.attempts();
        let mut failure = TransportFailure::connection("no attempt was made");

        for attempt in 1..=attempts {
            if attempt > 1 {
                warn!(
                    service = %request.service,
                    %url,
                    attempt,
                    attempts,
                    error = %failure,
                    "Retrying request"
                );
                tokio::time::sleep(retry.delay).await;
            }

            match self.attempt(request, url, body.clone()).await {
                Ok(response) if response.status.is_success() => {
                    debug!(%url, status = %response.status, attempt, "Request succeeded");
                    return Ok(response);
                }
                Ok(response) => {
                    let retryable = response.status.is_server_error();
                    failure = TransportFailure::Response {
                        status: response.status,
                        headers: response.headers,
                        body: response.body,
                    };
                    if !retryable {
                        break;
                    }
                }
                Err(connection) => {
                    failure = connection;
                }
            }
        }

        debug!(%url, error = %failure, "Request failed");
        Err(failure)
    }
}
