//! Call-translation engine for declarative microservice contracts.
//!
//! A caller declares a [`ServiceContract`]; the engine resolves each method into
//! a cached [`CallDescriptor`], builds an [`OutboundRequest`] from the live
//! [`Argument`]s, and reshapes the [`RawResponse`] (or [`TransportFailure`])
//! into a [`Reply`] matching the declared return type.

pub mod argument;
pub mod context;
pub mod contract;
pub mod descriptor;
pub mod error;
pub mod interceptor;
pub mod request;
pub mod response;
pub mod serializer;

pub use argument::Argument;
pub use context::{ambient, CallContext};
pub use contract::{
    MethodContract, MethodKey, ParamBinding, ParamSpec, RetryPolicy, ServiceContract, TypeRef,
};
pub use descriptor::{CallDescriptor, DescriptorCache, PayloadMode, ReturnShape};
pub use error::{CallError, ErrorKind, RETRY_LATER};
pub use interceptor::{CallInterceptor, CallSite, InterceptorChain};
pub use request::{OutboundRequest, Payload, RequestBuilder};
pub use response::{
    PassThroughResponse, PendingReply, RawResponse, Reply, Response, ResponseBody,
    ResponseResolver, TransportFailure,
};
pub use serializer::{JsonSerializer, SerializerError, StructuredSerializer};
