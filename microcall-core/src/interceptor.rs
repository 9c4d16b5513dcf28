//! Observers around the request lifecycle.
//!
//! Hooks run in registration order and may mutate headers, the request or the
//! response in place. They cannot abort a call: a hook that panics is a bug in
//! the hook and unwinds through the caller.

use http::{HeaderMap, Method};
use std::fmt;
use std::sync::Arc;

use crate::descriptor::{CallDescriptor, ReturnShape};
use crate::request::OutboundRequest;
use crate::response::RawResponse;

/// What every hook is told about the call it observes.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    pub service: &'a str,
    pub path_template: &'a str,
    pub verb: &'a Method,
    pub shape: &'a ReturnShape,
}

impl<'a> CallSite<'a> {
    pub fn of(descriptor: &'a CallDescriptor) -> Self {
        Self {
            service: &descriptor.service,
            path_template: &descriptor.path_template,
            verb: &descriptor.verb,
            shape: &descriptor.shape,
        }
    }
}

pub trait CallInterceptor: Send + Sync {
    /// Called once the propagated and per-call headers are in place.
    fn before_build(&self, _site: &CallSite<'_>, _headers: &mut HeaderMap) {}

    fn before_send(&self, _site: &CallSite<'_>, _request: &mut OutboundRequest) {}

    /// Called only when the transport produced a response.
    fn after_send(
        &self,
        _site: &CallSite<'_>,
        _request: &OutboundRequest,
        _response: &mut RawResponse,
    ) {
    }
}

#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn CallInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interceptor: Arc<dyn CallInterceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn before_build(&self, site: &CallSite<'_>, headers: &mut HeaderMap) {
        for interceptor in &self.interceptors {
            interceptor.before_build(site, headers);
        }
    }

    pub fn before_send(&self, site: &CallSite<'_>, request: &mut OutboundRequest) {
        for interceptor in &self.interceptors {
            interceptor.before_send(site, request);
        }
    }

    pub fn after_send(
        &self,
        site: &CallSite<'_>,
        request: &OutboundRequest,
        response: &mut RawResponse,
    ) {
        for interceptor in &self.interceptors {
            interceptor.after_send(site, request, response);
        }
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{MethodContract, ServiceContract};
    use http::HeaderValue;
    use std::sync::Mutex;

    struct Tagging {
        tag: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl CallInterceptor for Tagging {
        fn before_build(&self, _site: &CallSite<'_>, headers: &mut HeaderMap) {
            self.seen.lock().unwrap().push(self.tag);
            headers.insert("x-last", HeaderValue::from_static(self.tag));
        }
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let contract = ServiceContract::new("Ping")
            .service("ping")
            .method(MethodContract::new("ping"));
        let descriptor = CallDescriptor::build(&contract, &contract.methods[0]).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut chain = InterceptorChain::new();
        chain.push(Arc::new(Tagging { tag: "first", seen: Arc::clone(&seen) }));
        chain.push(Arc::new(Tagging { tag: "second", seen: Arc::clone(&seen) }));

        let mut headers = HeaderMap::new();
        chain.before_build(&CallSite::of(&descriptor), &mut headers);

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(headers.get("x-last").unwrap(), "second");
        assert_eq!(format!("{:?}", chain), "InterceptorChain { interceptors: 2 }");
    }
}
