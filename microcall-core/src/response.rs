//! Reshapes raw responses into the value a contract method declares.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tracing::{debug, error};

use crate::contract::TypeRef;
use crate::descriptor::{CallDescriptor, ReturnShape};
use crate::error::{CallError, RETRY_LATER};
use crate::serializer::{SerializerError, StructuredSerializer};

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, HeaderMap::new(), body)
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}

/// Why the executor could not produce a successful response.
#[derive(Debug, Clone, Error)]
pub enum TransportFailure {
    /// The service answered, but never with a success status.
    #[error("remote service answered {status}")]
    Response {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    /// The service could not be located or reached.
    #[error("connection failed: {message}")]
    Connection { message: String },
}

impl TransportFailure {
    pub fn connection(message: impl Into<String>) -> Self {
        TransportFailure::Connection {
            message: message.into(),
        }
    }

    pub fn has_response_data(&self) -> bool {
        matches!(self, TransportFailure::Response { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    /// Body of an absorbed failure, kept as text.
    Text(String),
    Decoded(Value),
}

/// Status, headers and body handed to callers of pass-through methods.
#[derive(Debug, Clone)]
pub struct PassThroughResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

/// Typed view of a [`PassThroughResponse`].
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `None` when the body was empty or an absorbed failure body does not fit `T`.
    pub body: Option<T>,
    /// Text of an absorbed failure body, whatever `body` decoded to.
    pub raw_body: Option<String>,
}

type BoxedReply = Pin<Box<dyn Future<Output = Result<Reply, CallError>> + Send>>;

/// A reply still being produced on another task.
pub struct PendingReply {
    inner: BoxedReply,
}

impl PendingReply {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<Reply, CallError>> + Send + 'static,
    {
        Self {
            inner: Box::pin(future),
        }
    }
}

impl Future for PendingReply {
    type Output = Result<Reply, CallError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReply").finish_non_exhaustive()
    }
}

/// The reshaped result of a call.
#[derive(Debug)]
pub enum Reply {
    Unit,
    /// Empty body returned where a value was declared.
    Nil,
    Value(Value),
    List(Vec<Value>),
    Map(Map<String, Value>),
    Bytes(Bytes),
    Optional(Option<Value>),
    Response(PassThroughResponse),
    Pending(PendingReply),
}

impl Reply {
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Unit => "unit",
            Reply::Nil => "nil",
            Reply::Value(_) => "value",
            Reply::List(_) => "list",
            Reply::Map(_) => "map",
            Reply::Bytes(_) => "bytes",
            Reply::Optional(_) => "optional",
            Reply::Response(_) => "response",
            Reply::Pending(_) => "pending",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Reply::Pending(_))
    }

    /// Waits for a pending reply; any other reply is returned as-is.
    pub async fn settle(self) -> Result<Reply, CallError> {
        match self {
            Reply::Pending(pending) => pending.await,
            ready => Ok(ready),
        }
    }

    /// Decodes the reply into `T`. Nil, unit and absent replies decode from
    /// `null`, so they only fit types such as `Option<_>` or `()`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, CallError> {
        let tree = match self {
            Reply::Unit | Reply::Nil | Reply::Optional(None) => Value::Null,
            Reply::Value(value) | Reply::Optional(Some(value)) => value,
            Reply::List(items) => Value::Array(items),
            Reply::Map(map) => Value::Object(map),
            Reply::Bytes(bytes) => Value::from(bytes.to_vec()),
            other => {
                return Err(CallError::contract(format!(
                    "a {} reply cannot be decoded directly",
                    other.kind()
                )))
            }
        };
        from_tree(tree)
    }

    pub fn into_optional<T: DeserializeOwned>(self) -> Result<Option<T>, CallError> {
        match self {
            Reply::Unit
            | Reply::Nil
            | Reply::Optional(None)
            | Reply::Optional(Some(Value::Null)) => Ok(None),
            Reply::Optional(Some(value)) | Reply::Value(value) => from_tree(value).map(Some),
            other => other.decode().map(Some),
        }
    }

    pub fn into_bytes(self) -> Result<Option<Bytes>, CallError> {
        match self {
            Reply::Bytes(bytes) => Ok(Some(bytes)),
            Reply::Nil => Ok(None),
            other => Err(CallError::contract(format!(
                "a {} reply does not carry raw bytes",
                other.kind()
            ))),
        }
    }

    pub fn into_response<T: DeserializeOwned>(self) -> Result<Response<T>, CallError> {
        match self {
            Reply::Response(response) => {
                let (body, raw_body) = match response.body {
                    ResponseBody::Empty => (None, None),
                    ResponseBody::Text(text) => (absorbed_body(&text), Some(text)),
                    ResponseBody::Decoded(value) => (Some(from_tree(value)?), None),
                };
                Ok(Response {
                    status: response.status,
                    headers: response.headers,
                    body,
                    raw_body,
                })
            }
            other => Err(CallError::contract(format!(
                "a {} reply is not a response",
                other.kind()
            ))),
        }
    }

    pub fn into_unit(self) -> Result<(), CallError> {
        match self {
            Reply::Unit | Reply::Nil => Ok(()),
            other => Err(CallError::contract(format!(
                "a {} reply is not void",
                other.kind()
            ))),
        }
    }
}

/// A failure body is whatever the service sent: structured text that fits `T`,
/// plain text when `T` is a string, or nothing typed at all.
fn absorbed_body<T: DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|tree| serde_json::from_value(tree).ok())
        .or_else(|| serde_json::from_value(Value::String(text.to_string())).ok())
}

fn from_tree<T: DeserializeOwned>(tree: Value) -> Result<T, CallError> {
    serde_json::from_value(tree)
        .map_err(|e| CallError::internal_with(RETRY_LATER, SerializerError::Decode(e.to_string())))
}

/// Checks a decoded tree against the declared type. `null` fits anything.
pub fn conform(value: &Value, ty: &TypeRef) -> Result<(), String> {
    match (ty, value) {
        (_, Value::Null) | (TypeRef::Any, _) => Ok(()),
        (TypeRef::String, Value::String(_)) => Ok(()),
        (TypeRef::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(()),
        (TypeRef::Float, Value::Number(_)) => Ok(()),
        (TypeRef::Bool, Value::Bool(_)) => Ok(()),
        (TypeRef::Object(_), Value::Object(_)) => Ok(()),
        (TypeRef::List(element), Value::Array(items)) => {
            items.iter().try_for_each(|item| conform(item, element))
        }
        (TypeRef::Map(_, element), Value::Object(entries)) => {
            entries.values().try_for_each(|item| conform(item, element))
        }
        (ty, value) => Err(format!("expected {}, found {}", ty, describe(value))),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Follows a dotted path through objects (by key) and arrays (by index).
pub fn select(tree: Value, expression: &str) -> Value {
    let mut current = tree;
    for segment in expression.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(mut map) => map.remove(segment).unwrap_or(Value::Null),
            Value::Array(mut items) => match segment.parse::<usize>() {
                Ok(index) if index < items.len() => items.swap_remove(index),
                _ => Value::Null,
            },
            _ => Value::Null,
        };
    }
    current
}

#[derive(Debug)]
pub struct ResponseResolver<'a> {
    serializer: &'a dyn StructuredSerializer,
    empty_body_as_null: bool,
}

impl<'a> ResponseResolver<'a> {
    pub fn new(serializer: &'a dyn StructuredSerializer, empty_body_as_null: bool) -> Self {
        Self {
            serializer,
            empty_body_as_null,
        }
    }

    pub fn resolve(
        &self,
        outcome: Result<RawResponse, TransportFailure>,
        descriptor: &CallDescriptor,
    ) -> Result<Reply, CallError> {
        let response = match outcome {
            Ok(response) => response,
            Err(failure) => {
                return match (failure, descriptor.shape.is_pass_through()) {
                    (
                        TransportFailure::Response {
                            status,
                            headers,
                            body,
                        },
                        true,
                    ) => {
                        debug!("Passing {} from {} through to the caller", status, descriptor.key);
                        Ok(Reply::Response(PassThroughResponse {
                            status,
                            headers,
                            body: ResponseBody::Text(String::from_utf8_lossy(&body).into_owned()),
                        }))
                    }
                    (failure, _) => Err(failure.into()),
                }
            }
        };

        let empty = !response.has_body();

        match &descriptor.shape {
            ReturnShape::Void => return Ok(Reply::Unit),
            ReturnShape::Optional(inner) => {
                if empty {
                    return Ok(Reply::Optional(None));
                }
                return match self.decode(&response.body, inner, descriptor)? {
                    Value::Null => Ok(Reply::Optional(None)),
                    value => Ok(Reply::Optional(Some(value))),
                };
            }
            _ => {}
        }

        if empty && self.empty_body_as_null && !descriptor.shape.is_pass_through() {
            return Ok(Reply::Nil);
        }

        match &descriptor.shape {
            ReturnShape::Async(None) => Ok(Reply::Unit),
            ReturnShape::Async(Some(inner)) => {
                let value = self.decode(&response.body, inner, descriptor)?;
                Ok(match (inner, value) {
                    (TypeRef::List(_), Value::Array(items)) => Reply::List(items),
                    (_, Value::Null) => Reply::Nil,
                    (_, value) => Reply::Value(value),
                })
            }
            ReturnShape::RawBytes => Ok(Reply::Bytes(response.body)),
            ReturnShape::PassThrough(inner) => {
                let body = if empty {
                    ResponseBody::Empty
                } else {
                    ResponseBody::Decoded(self.decode(&response.body, inner, descriptor)?)
                };
                Ok(Reply::Response(PassThroughResponse {
                    status: response.status,
                    headers: response.headers,
                    body,
                }))
            }
            ReturnShape::Map if descriptor.convert_response_to_map => {
                match self.decode(&response.body, &TypeRef::string_map(), descriptor)? {
                    Value::Object(map) => Ok(Reply::Map(map)),
                    _ => Ok(Reply::Nil),
                }
            }
            ReturnShape::Collection(element) => {
                let list = TypeRef::List(Box::new(element.clone()));
                match self.decode(&response.body, &list, descriptor)? {
                    Value::Array(items) => Ok(Reply::List(items)),
                    _ => Ok(Reply::Nil),
                }
            }
            ReturnShape::Plain(ty) => match self.decode(&response.body, ty, descriptor)? {
                Value::Null => Ok(Reply::Nil),
                value => Ok(Reply::Value(value)),
            },
            shape => {
                error!("{} declares {} which cannot be honored", descriptor.key, shape);
                Err(CallError::internal(format!(
                    "unsupported return shape {} for {}",
                    shape, descriptor.key
                )))
            }
        }
    }

    fn decode(
        &self,
        body: &[u8],
        ty: &TypeRef,
        descriptor: &CallDescriptor,
    ) -> Result<Value, CallError> {
        let decoded = self.serializer.decode_tree(body).and_then(|tree| {
            let tree = match &descriptor.return_expression {
                Some(expression) => select(tree, expression),
                None => tree,
            };
            conform(&tree, ty).map_err(SerializerError::Decode)?;
            Ok(tree)
        });

        decoded.map_err(|e| {
            error!("Can not decode reply of {} as {}: {}", descriptor.key, ty, e);
            CallError::internal_with(RETRY_LATER, e)
        })
    }
}
