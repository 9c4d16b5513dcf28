use async_trait::async_trait;
use bytes::Bytes;
use microcall_core::{OutboundRequest, RawResponse, RetryPolicy, TransportFailure};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Client build error: {0}")]
    Build(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Performs one logical HTTP exchange, including any retries the policy allows.
///
/// A 2xx answer is `Ok`. Anything else comes back as a [`TransportFailure`]
/// carrying whatever response data the service produced.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(
        &self,
        request: &OutboundRequest,
        body: Option<Bytes>,
        retry: &RetryPolicy,
    ) -> Result<RawResponse, TransportFailure>;
}

/// Maps a logical service name and a concrete path to an absolute URL.
pub trait ServiceResolver: Send + Sync {
    fn resolve(&self, service: &str, path: &str) -> Result<String, TransportFailure>;
}

#[async_trait]
impl<T: RequestExecutor + ?Sized> RequestExecutor for Arc<T> {
    async fn execute(
        &self,
        request: &OutboundRequest,
        body: Option<Bytes>,
        retry: &RetryPolicy,
    ) -> Result<RawResponse, TransportFailure> {
        (**self).execute(request, body, retry).await
    }
}

impl<T: ServiceResolver + ?Sized> ServiceResolver for Arc<T> {
    fn resolve(&self, service: &str, path: &str) -> Result<String, TransportFailure> {
        (**self).resolve(service, path)
    }
}
