//! Declarative microservice client.
//!
//! Declare a [`ServiceContract`], build a [`ContractProxy`] for it and invoke
//! methods by name:
//!
//! ```rust,no_run
//! use microcall_client::{
//!     args, CallContext, ContractProxy, MethodContract, ParamSpec, ServiceContract,
//!     StaticResolver, TypeRef,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let contract = ServiceContract::new("Users").service("users").method(
//!     MethodContract::new("get")
//!         .get("/users/{id}")
//!         .param(ParamSpec::path("id", "id"))
//!         .returns(TypeRef::object("User")),
//! );
//! let proxy = ContractProxy::builder(contract)
//!     .resolver(StaticResolver::new().with("users", "http://users.internal:8080"))
//!     .build()?;
//!
//! let context = CallContext::new().with_header("x-tenant", "acme");
//! let user: serde_json::Value = proxy.call(&context, "get", args![7]).await?;
//! # let _ = user;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod macros;
pub mod proxy;

pub use microcall_core;
pub use microcall_transport;

pub use config::ClientConfig;
pub use proxy::{ClientError, ContractProxy, ContractProxyBuilder};

pub use microcall_core::{
    ambient, Argument, CallContext, CallError, CallInterceptor, CallSite, DescriptorCache,
    ErrorKind, MethodContract, ParamSpec, PassThroughResponse, Reply, Response, ResponseBody,
    RetryPolicy, ServiceContract, TypeRef,
};
#[cfg(feature = "all-transports")]
pub use microcall_transport::{HttpConfig, HttpExecutor};
pub use microcall_transport::{RequestExecutor, ServiceResolver, StaticResolver};
