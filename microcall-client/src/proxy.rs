//! The invoker: turns a contract method call into a remote request and shapes
//! the reply.

use bytes::Bytes;
use microcall_core::{
    ambient, Argument, CallContext, CallDescriptor, CallError, CallInterceptor, CallSite,
    DescriptorCache, InterceptorChain, JsonSerializer, PendingReply, Reply, RequestBuilder,
    ResponseResolver, ServiceContract, StructuredSerializer, RETRY_LATER,
};
use microcall_transport::{RequestExecutor, ServiceResolver, TransportError};
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::ClientConfig;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No service resolver configured for {0}")]
    MissingResolver(String),
    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),
}

/// Dispatches calls for one [`ServiceContract`].
///
/// Cloning is cheap; clones share the descriptor cache, executor and resolver.
#[derive(Clone)]
pub struct ContractProxy {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    contract: ServiceContract,
    cache: Arc<DescriptorCache>,
    executor: Arc<dyn RequestExecutor>,
    resolver: Arc<dyn ServiceResolver>,
    serializer: Arc<dyn StructuredSerializer>,
    interceptors: InterceptorChain,
    config: ClientConfig,
}

impl ContractProxy {
    pub fn builder(contract: ServiceContract) -> ContractProxyBuilder {
        ContractProxyBuilder::new(contract)
    }

    pub fn contract(&self) -> &ServiceContract {
        &self.inner.contract
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &Arc<DescriptorCache> {
        &self.inner.cache
    }

    /// Invokes `method` with the headers in `context`.
    ///
    /// For methods declared with a future return type the reply is
    /// [`Reply::Pending`]: the call runs on a spawned task and the context is
    /// captured before this returns.
    pub async fn invoke(
        &self,
        context: &CallContext,
        method: &str,
        args: Vec<Argument>,
    ) -> Result<Reply, CallError> {
        let descriptor = self.inner.cache.resolve(&self.inner.contract, method)?;

        if descriptor.shape.is_async() {
            let inner = Arc::clone(&self.inner);
            let context = context.clone();
            debug!(method = %descriptor.key, "Handing call off to a worker");
            let handle =
                tokio::spawn(async move { inner.perform(&descriptor, &args, &context).await });
            return Ok(Reply::Pending(PendingReply::new(async move {
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(CallError::internal_with(RETRY_LATER, e)),
                }
            })));
        }

        self.inner.perform(&descriptor, &args, context).await
    }

    /// Like [`invoke`](Self::invoke), with headers taken from the calling
    /// thread's ambient store at the moment this is called.
    pub fn invoke_ambient(
        &self,
        method: &str,
        args: Vec<Argument>,
    ) -> impl Future<Output = Result<Reply, CallError>> + Send + '_ {
        let context = ambient::snapshot();
        let method = method.to_string();
        async move { self.invoke(&context, &method, args).await }
    }

    /// Invokes `method`, waits for any pending reply and decodes it as `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        context: &CallContext,
        method: &str,
        args: Vec<Argument>,
    ) -> Result<T, CallError> {
        self.invoke(context, method, args)
            .await?
            .settle()
            .await?
            .decode()
    }
}

impl ProxyInner {
    async fn perform(
        &self,
        descriptor: &CallDescriptor,
        args: &[Argument],
        context: &CallContext,
    ) -> Result<Reply, CallError> {
        let site = CallSite::of(descriptor);
        let mut request = RequestBuilder::new(descriptor, &self.interceptors)
            .content_type(self.serializer.content_type())
            .build(args, context)?;

        let outcome = match self.resolver.resolve(&descriptor.service, &request.path) {
            Err(failure) => Err(failure),
            Ok(url) => {
                request.url = Some(url);
                self.interceptors.before_send(&site, &mut request);

                let body = request
                    .body(self.serializer.as_ref())
                    .map_err(|e| CallError::internal_with(RETRY_LATER, e))?;
                debug!(
                    method = %descriptor.key,
                    verb = %request.verb,
                    url = request.url.as_deref().unwrap_or_default(),
                    "Sending request"
                );
                trace!(bytes = body.as_ref().map_or(0, Bytes::len), "Request body");

                match self
                    .executor
                    .execute(&request, body, &descriptor.retry)
                    .await
                {
                    Ok(mut response) => {
                        self.interceptors
                            .after_send(&site, &request, &mut response);
                        Ok(response)
                    }
                    Err(failure) => Err(failure),
                }
            }
        };

        let reply = ResponseResolver::new(self.serializer.as_ref(), self.config.empty_body_as_null)
            .resolve(outcome, descriptor);
        match &reply {
            Ok(reply) => debug!(method = %descriptor.key, reply = reply.kind(), "Call finished"),
            Err(e) => debug!(method = %descriptor.key, kind = %e.kind(), "Call failed: {}", e),
        }
        reply
    }
}

impl fmt::Debug for ContractProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractProxy")
            .field("contract", &self.inner.contract.name)
            .field("methods", &self.inner.contract.methods.len())
            .field("interceptors", &self.inner.interceptors)
            .field("config", &self.inner.config)
            .finish()
    }
}

pub struct ContractProxyBuilder {
    contract: ServiceContract,
    cache: Option<Arc<DescriptorCache>>,
    executor: Option<Arc<dyn RequestExecutor>>,
    resolver: Option<Arc<dyn ServiceResolver>>,
    serializer: Arc<dyn StructuredSerializer>,
    interceptors: InterceptorChain,
    config: ClientConfig,
}

impl ContractProxyBuilder {
    pub fn new(contract: ServiceContract) -> Self {
        Self {
            contract,
            cache: None,
            executor: None,
            resolver: None,
            serializer: Arc::new(JsonSerializer),
            interceptors: InterceptorChain::new(),
            config: ClientConfig::default(),
        }
    }

    /// Shares a descriptor cache with other proxies.
    pub fn cache(mut self, cache: Arc<DescriptorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn executor(mut self, executor: impl RequestExecutor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    pub fn resolver(mut self, resolver: impl ServiceResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn serializer(mut self, serializer: impl StructuredSerializer + 'static) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn CallInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Without an explicit executor, one is built from the config's HTTP
    /// settings.
    pub fn build(self) -> Result<ContractProxy, ClientError> {
        let resolver = self
            .resolver
            .ok_or_else(|| ClientError::MissingResolver(self.contract.name.clone()))?;
        let executor = match self.executor {
            Some(executor) => executor,
            None => default_executor(&self.config)?,
        };

        Ok(ContractProxy {
            inner: Arc::new(ProxyInner {
                contract: self.contract,
                cache: self.cache.unwrap_or_default(),
                executor,
                resolver,
                serializer: self.serializer,
                interceptors: self.interceptors,
                config: self.config,
            }),
        })
    }
}

impl fmt::Debug for ContractProxyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractProxyBuilder")
            .field("contract", &self.contract.name)
            .field("has_executor", &self.executor.is_some())
            .field("has_resolver", &self.resolver.is_some())
            .field("serializer", &self.serializer)
            .field("interceptors", &self.interceptors)
            .finish()
    }
}

#[cfg(feature = "all-transports")]
fn default_executor(config: &ClientConfig) -> Result<Arc<dyn RequestExecutor>, ClientError> {
    let executor = microcall_transport::HttpExecutor::new(config.http_config())?;
    Ok(Arc::new(executor))
}

#[cfg(not(feature = "all-transports"))]
fn default_executor(config: &ClientConfig) -> Result<Arc<dyn RequestExecutor>, ClientError> {
    let _ = config;
    Err(TransportError::Config("no request executor configured".into()).into())
}
