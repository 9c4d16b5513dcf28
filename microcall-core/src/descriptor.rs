//! Resolved, cached routing metadata for contract methods.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use http::Method;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::contract::{
    MethodContract, MethodKey, ParamBinding, ParamSpec, RetryPolicy, ServiceContract, TypeRef,
};
use crate::error::CallError;

/// How the declared return type is reshaped from the raw response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnShape {
    Void,
    RawBytes,
    Optional(TypeRef),
    Async(Option<TypeRef>),
    PassThrough(TypeRef),
    Map,
    Collection(TypeRef),
    Plain(TypeRef),
}

impl ReturnShape {
    pub fn classify(declared: &TypeRef) -> Result<Self, CallError> {
        let shape = match declared {
            TypeRef::Unit => ReturnShape::Void,
            TypeRef::Bytes => ReturnShape::RawBytes,
            TypeRef::Optional(inner) => ReturnShape::Optional(value_type(declared, inner)?),
            TypeRef::Future(None) => ReturnShape::Async(None),
            TypeRef::Future(Some(inner)) => ReturnShape::Async(Some(value_type(declared, inner)?)),
            TypeRef::Response(body) => ReturnShape::PassThrough(value_type(declared, body)?),
            TypeRef::Map(key, value) => {
                if **key != TypeRef::String || **value != TypeRef::Any {
                    return Err(unsupported(declared));
                }
                ReturnShape::Map
            }
            TypeRef::List(element) => ReturnShape::Collection(value_type(declared, element)?),
            TypeRef::Any
            | TypeRef::String
            | TypeRef::Integer
            | TypeRef::Float
            | TypeRef::Bool
            | TypeRef::Object(_) => ReturnShape::Plain(declared.clone()),
        };
        Ok(shape)
    }

    pub fn is_async(&self) -> bool {
        matches!(self, ReturnShape::Async(_))
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, ReturnShape::PassThrough(_))
    }
}

fn value_type(declared: &TypeRef, inner: &TypeRef) -> Result<TypeRef, CallError> {
    if inner.is_value_type() {
        Ok(inner.clone())
    } else {
        Err(unsupported(declared))
    }
}

fn unsupported(declared: &TypeRef) -> CallError {
    CallError::contract(format!("unsupported return shape {}", declared))
}

impl fmt::Display for ReturnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnShape::Void => write!(f, "void"),
            ReturnShape::RawBytes => write!(f, "raw-bytes"),
            ReturnShape::Optional(inner) => write!(f, "optional<{}>", inner),
            ReturnShape::Async(Some(inner)) => write!(f, "async<{}>", inner),
            ReturnShape::Async(None) => write!(f, "async<void>"),
            ReturnShape::PassThrough(body) => write!(f, "pass-through<{}>", body),
            ReturnShape::Map => write!(f, "map<string, any>"),
            ReturnShape::Collection(element) => write!(f, "collection<{}>", element),
            ReturnShape::Plain(ty) => write!(f, "plain<{}>", ty),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadMode {
    None,
    SingleArgument,
    MergedTree,
}

/// Verbs that must carry a payload.
pub fn is_write_verb(verb: &Method) -> bool {
    *verb == Method::POST || *verb == Method::PUT || *verb == Method::PATCH
}

/// Immutable snapshot of one contract method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDescriptor {
    pub key: MethodKey,
    pub service: String,
    pub verb: Method,
    pub path_template: String,
    pub declared: TypeRef,
    pub shape: ReturnShape,
    pub payload_mode: PayloadMode,
    pub retry: RetryPolicy,
    pub convert_response_to_map: bool,
    pub return_expression: Option<String>,
    pub params: Vec<ParamSpec>,
}

impl CallDescriptor {
    pub fn build(contract: &ServiceContract, method: &MethodContract) -> Result<Self, CallError> {
        let service = match contract.service.as_deref() {
            Some(service) if !service.trim().is_empty() => service.to_string(),
            _ => {
                return Err(CallError::contract(format!(
                    "{} must declare the remote service it talks to",
                    contract.name
                )))
            }
        };

        if !method.path.starts_with('/') {
            return Err(CallError::contract(format!(
                "{}::{} path {:?} must start with '/'",
                contract.name, method.name, method.path
            )));
        }

        for param in &method.params {
            match &param.binding {
                ParamBinding::Path(key) | ParamBinding::Header(key) if key.is_empty() => {
                    return Err(CallError::contract(format!(
                        "{}::{} parameter {} has an empty binding key",
                        contract.name, method.name, param.name
                    )));
                }
                _ => {}
            }
        }

        let shape = ReturnShape::classify(&method.returns)?;

        let payload_mode = if method
            .params
            .iter()
            .any(|p| matches!(p.binding, ParamBinding::Payload(_)))
        {
            PayloadMode::MergedTree
        } else if is_write_verb(&method.verb) {
            PayloadMode::SingleArgument
        } else {
            PayloadMode::None
        };

        Ok(Self {
            key: MethodKey::new(&contract.name, &method.name),
            service,
            verb: method.verb.clone(),
            path_template: method.path.clone(),
            declared: method.returns.clone(),
            shape,
            payload_mode,
            retry: method.retry,
            convert_response_to_map: method.convert_response_to_map,
            return_expression: method.return_expression.clone(),
            params: method.params.clone(),
        })
    }
}

/// Memoizes descriptors by method identity.
///
/// The first resolution of a method builds and publishes under the map's entry
/// lock, so concurrent first callers all receive the same descriptor.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    entries: DashMap<MethodKey, Arc<CallDescriptor>>,
    builds: AtomicUsize,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &self,
        contract: &ServiceContract,
        method: &str,
    ) -> Result<Arc<CallDescriptor>, CallError> {
        let key = MethodKey::new(&contract.name, method);

        if let Some(found) = self.entries.get(&key) {
            return Ok(Arc::clone(found.value()));
        }

        match self.entries.entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let declared = contract.find(method).ok_or_else(|| {
                    CallError::contract(format!(
                        "{} does not declare a method named {}",
                        contract.name, method
                    ))
                })?;
                let descriptor = Arc::new(CallDescriptor::build(contract, declared)?);
                self.builds.fetch_add(1, Ordering::SeqCst);
                debug!(
                    "Resolved {} as {} {} -> {}",
                    descriptor.key, descriptor.verb, descriptor.path_template, descriptor.shape
                );
                entry.insert(Arc::clone(&descriptor));
                Ok(descriptor)
            }
        }
    }

    /// How many descriptors have been built since creation.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn users() -> ServiceContract {
        ServiceContract::new("UserRepository")
            .service("users")
            .method(
                MethodContract::new("find")
                    .get("/users/{id}")
                    .param(ParamSpec::path("id", "id"))
                    .returns(TypeRef::object("UserAccount")),
            )
            .method(
                MethodContract::new("create")
                    .post("/users")
                    .param(ParamSpec::free("user"))
                    .returns(TypeRef::object("UserAccount")),
            )
            .method(
                MethodContract::new("rename")
                    .put("/users/{id}")
                    .param(ParamSpec::path("id", "id"))
                    .param(ParamSpec::payload_at("name", "profile.name")),
            )
    }

    #[test]
    fn test_classify_shapes() {
        assert_eq!(ReturnShape::classify(&TypeRef::Unit).unwrap(), ReturnShape::Void);
        assert_eq!(ReturnShape::classify(&TypeRef::Bytes).unwrap(), ReturnShape::RawBytes);
        assert_eq!(
            ReturnShape::classify(&TypeRef::optional(TypeRef::list(TypeRef::String))).unwrap(),
            ReturnShape::Optional(TypeRef::list(TypeRef::String))
        );
        assert_eq!(
            ReturnShape::classify(&TypeRef::future_unit()).unwrap(),
            ReturnShape::Async(None)
        );
        assert_eq!(
            ReturnShape::classify(&TypeRef::response(TypeRef::Any)).unwrap(),
            ReturnShape::PassThrough(TypeRef::Any)
        );
        assert_eq!(
            ReturnShape::classify(&TypeRef::string_map()).unwrap(),
            ReturnShape::Map
        );
        assert_eq!(
            ReturnShape::classify(&TypeRef::list(TypeRef::Integer)).unwrap(),
            ReturnShape::Collection(TypeRef::Integer)
        );
        assert_eq!(
            ReturnShape::classify(&TypeRef::Bool).unwrap(),
            ReturnShape::Plain(TypeRef::Bool)
        );
    }

    #[test]
    fn test_classify_rejects_unrecognized_shapes() {
        let rejected = [
            TypeRef::optional(TypeRef::Unit),
            TypeRef::future(TypeRef::optional(TypeRef::String)),
            TypeRef::response(TypeRef::Bytes),
            TypeRef::map(TypeRef::Integer, TypeRef::Any),
            TypeRef::list(TypeRef::future_unit()),
        ];
        for declared in rejected {
            let err = ReturnShape::classify(&declared).unwrap_err();
            assert!(matches!(err, CallError::Contract(_)), "{}", declared);
        }
    }

    #[test]
    fn test_payload_modes() {
        let contract = users();
        let find = CallDescriptor::build(&contract, contract.find("find").unwrap()).unwrap();
        let create = CallDescriptor::build(&contract, contract.find("create").unwrap()).unwrap();
        let rename = CallDescriptor::build(&contract, contract.find("rename").unwrap()).unwrap();

        assert_eq!(find.payload_mode, PayloadMode::None);
        assert_eq!(create.payload_mode, PayloadMode::SingleArgument);
        assert_eq!(rename.payload_mode, PayloadMode::MergedTree);
        assert_eq!(rename.shape, ReturnShape::Void);
    }

    #[test]
    fn test_missing_service_is_contract_error() {
        let contract = ServiceContract::new("Orphan").method(MethodContract::new("ping"));
        let err = DescriptorCache::new().resolve(&contract, "ping").unwrap_err();
        assert!(matches!(err, CallError::Contract(ref m) if m.contains("Orphan")));
    }

    #[test]
    fn test_malformed_declarations() {
        let contract = ServiceContract::new("Broken")
            .service("broken")
            .method(MethodContract::new("relative").get("users"))
            .method(
                MethodContract::new("empty_key")
                    .get("/users/{id}")
                    .param(ParamSpec::path("id", "")),
            );
        let cache = DescriptorCache::new();

        assert!(matches!(
            cache.resolve(&contract, "relative"),
            Err(CallError::Contract(_))
        ));
        assert!(matches!(
            cache.resolve(&contract, "empty_key"),
            Err(CallError::Contract(_))
        ));
        assert!(matches!(
            cache.resolve(&contract, "missing"),
            Err(CallError::Contract(_))
        ));
        assert!(cache.is_empty());
        assert_eq!(cache.builds(), 0);
    }

    #[test]
    fn test_resolution_is_cached() {
        let contract = users();
        let cache = DescriptorCache::new();

        let first = cache.resolve(&contract, "find").unwrap();
        let second = cache.resolve(&contract, "find").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.builds(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_first_resolution_builds_once() {
        let contract = Arc::new(users());
        let cache = Arc::new(DescriptorCache::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let contract = Arc::clone(&contract);
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.resolve(&contract, "rename").unwrap())
            })
            .collect();

        let descriptors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for descriptor in &descriptors {
            assert_eq!(**descriptor, *descriptors[0]);
        }
        assert_eq!(cache.builds(), 1);
    }
}
