//! Request execution and service resolution for microcall.

pub mod resolver;
pub mod transport;
#[cfg(feature = "http-client")]
pub mod http;

pub use resolver::StaticResolver;
pub use transport::{RequestExecutor, ServiceResolver, TransportError};
#[cfg(feature = "http-client")]
pub use http::{HttpConfig, HttpExecutor};
