//! Assembles an outbound request from a descriptor and live arguments.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};
use tracing::trace;

use crate::argument::Argument;
use crate::context::CallContext;
use crate::descriptor::{CallDescriptor, PayloadMode};
use crate::contract::ParamBinding;
use crate::error::CallError;
use crate::interceptor::{CallSite, InterceptorChain};
use crate::serializer::{SerializerError, StructuredSerializer};

/// Everything except RFC 3986 unreserved characters is escaped, `/` included.
const PATH_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Bytes(Bytes),
    Structured(Value),
}

impl Payload {
    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }
}

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub service: String,
    pub verb: Method,
    pub path: String,
    /// Filled in once the service resolver has located the service.
    pub url: Option<String>,
    pub headers: HeaderMap,
    pub payload: Payload,
}

impl OutboundRequest {
    /// Body bytes as they go on the wire.
    pub fn body(
        &self,
        serializer: &dyn StructuredSerializer,
    ) -> Result<Option<Bytes>, SerializerError> {
        match &self.payload {
            Payload::None => Ok(None),
            Payload::Bytes(bytes) => Ok(Some(bytes.clone())),
            Payload::Structured(value) => serializer.encode(value).map(Some),
        }
    }
}

#[derive(Debug)]
pub struct RequestBuilder<'a> {
    descriptor: &'a CallDescriptor,
    interceptors: &'a InterceptorChain,
    content_type: &'static str,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(descriptor: &'a CallDescriptor, interceptors: &'a InterceptorChain) -> Self {
        Self {
            descriptor,
            interceptors,
            content_type: "application/json",
        }
    }

    /// Content type announced for structured payloads.
    pub fn content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn build(
        &self,
        arguments: &[Argument],
        context: &CallContext,
    ) -> Result<OutboundRequest, CallError> {
        let descriptor = self.descriptor;

        if descriptor.payload_mode == PayloadMode::SingleArgument {
            self.check_payload_arity(arguments)?;
        }
        if arguments.len() != descriptor.params.len() {
            return Err(CallError::contract(format!(
                "{} expects {} arguments, got {}",
                descriptor.key,
                descriptor.params.len(),
                arguments.len()
            )));
        }

        let path = self.substitute_path(arguments)?;
        let payload = match descriptor.payload_mode {
            PayloadMode::None => Payload::None,
            PayloadMode::MergedTree => Payload::Structured(self.merge_payload(arguments)),
            PayloadMode::SingleArgument => self.single_payload(arguments)?,
        };

        let mut headers = HeaderMap::new();
        for (name, value) in context.headers() {
            insert_header(&mut headers, name, value)?;
        }
        if matches!(payload, Payload::Structured(_)) {
            insert_header(&mut headers, CONTENT_TYPE.as_str(), self.content_type)?;
        }
        for (param, argument) in descriptor.params.iter().zip(arguments) {
            if let ParamBinding::Header(name) = &param.binding {
                let value = argument.to_text().ok_or_else(|| {
                    CallError::contract(format!(
                        "{} header parameter {} must be a scalar",
                        descriptor.key, param.name
                    ))
                })?;
                insert_header(&mut headers, name, &value)?;
            }
        }

        self.interceptors
            .before_build(&CallSite::of(descriptor), &mut headers);

        trace!(
            "Built {} {} for {} ({} headers)",
            descriptor.verb,
            path,
            descriptor.key,
            headers.len()
        );

        Ok(OutboundRequest {
            service: descriptor.service.clone(),
            verb: descriptor.verb.clone(),
            path,
            url: None,
            headers,
            payload,
        })
    }

    fn check_payload_arity(&self, arguments: &[Argument]) -> Result<(), CallError> {
        let descriptor = self.descriptor;
        if arguments.is_empty() {
            return Err(CallError::contract(format!(
                "{} {} requires exactly one payload argument, have 0",
                descriptor.key, descriptor.verb
            )));
        }
        let tagged = descriptor
            .params
            .iter()
            .filter(|p| p.is_tagged_outside_payload())
            .count();
        if tagged + 1 != arguments.len() {
            return Err(CallError::contract(format!(
                "{} {} requires exactly one payload argument",
                descriptor.key, descriptor.verb
            )));
        }
        Ok(())
    }

    fn substitute_path(&self, arguments: &[Argument]) -> Result<String, CallError> {
        let descriptor = self.descriptor;
        let mut path = descriptor.path_template.clone();

        for (param, argument) in descriptor.params.iter().zip(arguments) {
            let ParamBinding::Path(key) = &param.binding else {
                continue;
            };
            let text = argument.to_text().ok_or_else(|| {
                CallError::contract(format!(
                    "{} path parameter {} must be a scalar",
                    descriptor.key, param.name
                ))
            })?;
            let encoded = utf8_percent_encode(&text, PATH_VALUE).to_string();
            path = path.replace(&format!("{{{}}}", key), &encoded);
        }

        Ok(path)
    }

    fn merge_payload(&self, arguments: &[Argument]) -> Value {
        let mut root = Map::new();
        for (param, argument) in self.descriptor.params.iter().zip(arguments) {
            if let ParamBinding::Payload(path) = &param.binding {
                let path = path.as_deref().unwrap_or(&param.name);
                graft(&mut root, path, argument.to_tree());
            }
        }
        Value::Object(root)
    }

    fn single_payload(&self, arguments: &[Argument]) -> Result<Payload, CallError> {
        let descriptor = self.descriptor;
        let argument = descriptor
            .params
            .iter()
            .zip(arguments)
            .find(|(param, _)| param.binding == ParamBinding::Free)
            .map(|(_, argument)| argument)
            .ok_or_else(|| {
                CallError::contract(format!(
                    "{} {} requires exactly one payload argument",
                    descriptor.key, descriptor.verb
                ))
            })?;

        Ok(match argument {
            Argument::Bytes(bytes) => Payload::Bytes(bytes.clone()),
            Argument::Value(value) => Payload::Structured(value.clone()),
        })
    }
}

/// Places `value` at the dotted `path` inside `root`, creating or reusing
/// intermediate objects. A non-object in an intermediate position is replaced.
pub fn graft(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let leaf = segments.pop().unwrap_or(path);

    let mut node = root;
    for segment in segments {
        let slot = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot.as_object_mut() {
            Some(next) => node = next,
            None => return,
        }
    }
    node.insert(leaf.to_string(), value);
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), CallError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| CallError::contract(format!("invalid header name {:?}", name)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| CallError::contract(format!("invalid value for header {}", name)))?;
    headers.insert(header_name, header_value);
    Ok(())
}
