//! Declaration surface for remote contracts.
//!
//! A [`ServiceContract`] is a static table of [`MethodContract`]s, each carrying
//! the routing metadata the engine needs: verb, path template, retry policy,
//! declared return type and the binding of every parameter. Contracts are plain
//! data built once at startup; the engine never mutates them.

use http::Method;
use std::fmt;
use std::time::Duration;

/// Declared type of a return value or of a value nested inside one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Unit,
    Bytes,
    Any,
    String,
    Integer,
    Float,
    Bool,
    /// A structured record, identified by its type name.
    Object(String),
    List(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
    Optional(Box<TypeRef>),
    Future(Option<Box<TypeRef>>),
    /// Status, headers and body exposed to the caller.
    Response(Box<TypeRef>),
}

impl TypeRef {
    pub fn object(name: impl Into<String>) -> Self {
        TypeRef::Object(name.into())
    }

    pub fn list(element: TypeRef) -> Self {
        TypeRef::List(Box::new(element))
    }

    pub fn map(key: TypeRef, value: TypeRef) -> Self {
        TypeRef::Map(Box::new(key), Box::new(value))
    }

    /// `map<string, any>`, the only map honored by map conversion.
    pub fn string_map() -> Self {
        TypeRef::map(TypeRef::String, TypeRef::Any)
    }

    pub fn optional(inner: TypeRef) -> Self {
        TypeRef::Optional(Box::new(inner))
    }

    pub fn future(inner: TypeRef) -> Self {
        TypeRef::Future(Some(Box::new(inner)))
    }

    pub fn future_unit() -> Self {
        TypeRef::Future(None)
    }

    pub fn response(body: TypeRef) -> Self {
        TypeRef::Response(Box::new(body))
    }

    /// Whether a body can be decoded into this type.
    pub fn is_value_type(&self) -> bool {
        match self {
            TypeRef::Any
            | TypeRef::String
            | TypeRef::Integer
            | TypeRef::Float
            | TypeRef::Bool
            | TypeRef::Object(_) => true,
            TypeRef::List(element) => element.is_value_type(),
            TypeRef::Map(key, value) => **key == TypeRef::String && value.is_value_type(),
            TypeRef::Unit
            | TypeRef::Bytes
            | TypeRef::Optional(_)
            | TypeRef::Future(_)
            | TypeRef::Response(_) => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Unit => write!(f, "void"),
            TypeRef::Bytes => write!(f, "bytes"),
            TypeRef::Any => write!(f, "any"),
            TypeRef::String => write!(f, "string"),
            TypeRef::Integer => write!(f, "integer"),
            TypeRef::Float => write!(f, "float"),
            TypeRef::Bool => write!(f, "bool"),
            TypeRef::Object(name) => write!(f, "{}", name),
            TypeRef::List(element) => write!(f, "list<{}>", element),
            TypeRef::Map(key, value) => write!(f, "map<{}, {}>", key, value),
            TypeRef::Optional(inner) => write!(f, "optional<{}>", inner),
            TypeRef::Future(Some(inner)) => write!(f, "future<{}>", inner),
            TypeRef::Future(None) => write!(f, "future<void>"),
            TypeRef::Response(body) => write!(f, "response<{}>", body),
        }
    }
}

/// How many times, and how far apart, the executor may try a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 2,
            delay: Duration::from_millis(1100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            enabled: true,
            max_attempts,
            delay,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Number of attempts the executor should make, never less than one.
    pub fn attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }
}

/// What a parameter contributes to the outgoing request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamBinding {
    /// Replaces the `{key}` placeholder in the path template.
    Path(String),
    /// Grafted into the merged payload tree at a dotted path, or at the
    /// parameter name when no path is given.
    Payload(Option<String>),
    /// Sent as the named request header.
    Header(String),
    /// Untagged; the sole raw payload of a write verb.
    Free,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamSpec {
    pub name: String,
    pub binding: ParamBinding,
}

impl ParamSpec {
    pub fn path(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: ParamBinding::Path(key.into()),
        }
    }

    pub fn payload(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: ParamBinding::Payload(None),
        }
    }

    pub fn payload_at(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: ParamBinding::Payload(Some(path.into())),
        }
    }

    pub fn header(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: ParamBinding::Header(header.into()),
        }
    }

    pub fn free(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: ParamBinding::Free,
        }
    }

    /// Path and header bindings consume their argument outside the payload.
    pub fn is_tagged_outside_payload(&self) -> bool {
        matches!(
            self.binding,
            ParamBinding::Path(_) | ParamBinding::Header(_)
        )
    }
}

/// One remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodContract {
    pub name: String,
    pub verb: Method,
    pub path: String,
    pub retry: RetryPolicy,
    pub convert_response_to_map: bool,
    pub return_expression: Option<String>,
    pub returns: TypeRef,
    pub params: Vec<ParamSpec>,
}

impl MethodContract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verb: Method::GET,
            path: "/".to_string(),
            retry: RetryPolicy::default(),
            convert_response_to_map: false,
            return_expression: None,
            returns: TypeRef::Unit,
            params: Vec::new(),
        }
    }

    pub fn route(mut self, verb: Method, path: impl Into<String>) -> Self {
        self.verb = verb;
        self.path = path.into();
        self
    }

    pub fn get(self, path: impl Into<String>) -> Self {
        self.route(Method::GET, path)
    }

    pub fn post(self, path: impl Into<String>) -> Self {
        self.route(Method::POST, path)
    }

    pub fn put(self, path: impl Into<String>) -> Self {
        self.route(Method::PUT, path)
    }

    pub fn patch(self, path: impl Into<String>) -> Self {
        self.route(Method::PATCH, path)
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.route(Method::DELETE, path)
    }

    pub fn returns(mut self, returns: TypeRef) -> Self {
        self.returns = returns;
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn no_retry(self) -> Self {
        self.retry(RetryPolicy::disabled())
    }

    pub fn convert_response_to_map(mut self) -> Self {
        self.convert_response_to_map = true;
        self
    }

    pub fn return_expression(mut self, expression: impl Into<String>) -> Self {
        self.return_expression = Some(expression.into());
        self
    }
}

/// The declaring type: a named set of methods served by one remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContract {
    pub name: String,
    pub service: Option<String>,
    pub methods: Vec<MethodContract>,
}

impl ServiceContract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: None,
            methods: Vec::new(),
        }
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn method(mut self, method: MethodContract) -> Self {
        self.methods.push(method);
        self
    }

    pub fn find(&self, method: &str) -> Option<&MethodContract> {
        self.methods.iter().find(|m| m.name == method)
    }
}

/// Identity of a contract method, used as the descriptor cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub contract: String,
    pub method: String,
}

impl MethodKey {
    pub fn new(contract: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.contract, self.method)
    }
}
