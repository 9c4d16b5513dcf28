//! Headers propagated into every outgoing request.
//!
//! A [`CallContext`] is passed explicitly to each call and snapshotted when the
//! call is initiated. The [`ambient`] store keeps one context per thread for
//! callers that prefer to set headers once and forget about them.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    headers: BTreeMap<String, String>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    pub fn clear(&mut self) {
        self.headers.clear();
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Per-thread ambient headers, created empty on first touch.
///
/// Values are never copied to other threads; read them with [`snapshot`] on
/// the thread that initiates the call.
pub mod ambient {
    use super::CallContext;
    use std::cell::RefCell;

    thread_local! {
        static HEADERS: RefCell<CallContext> = RefCell::new(CallContext::new());
    }

    pub fn set(name: impl Into<String>, value: impl Into<String>) {
        HEADERS.with(|headers| headers.borrow_mut().set(name, value));
    }

    pub fn get(name: &str) -> Option<String> {
        HEADERS.with(|headers| headers.borrow().get(name).map(str::to_string))
    }

    pub fn remove(name: &str) -> Option<String> {
        HEADERS.with(|headers| headers.borrow_mut().remove(name))
    }

    pub fn clear() {
        HEADERS.with(|headers| headers.borrow_mut().clear());
    }

    pub fn snapshot() -> CallContext {
        HEADERS.with(|headers| headers.borrow().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_context_headers() {
        let mut ctx = CallContext::new().with_header("x-tenant", "acme");
        ctx.set("x-request-id", "r-1");
        ctx.set("x-tenant", "globex");

        assert_eq!(ctx.get("x-tenant"), Some("globex"));
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.remove("x-request-id").as_deref(), Some("r-1"));

        ctx.clear();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        ambient::set("x-token", "abc");
        let snapshot = ambient::snapshot();
        ambient::clear();

        assert_eq!(snapshot.get("x-token"), Some("abc"));
        assert_eq!(ambient::get("x-token"), None);
    }

    #[test]
    fn test_ambient_store_is_per_thread() {
        ambient::set("x-user", "main");

        let seen = thread::spawn(|| {
            let before = ambient::get("x-user");
            ambient::set("x-user", "worker");
            (before, ambient::get("x-user"))
        })
        .join()
        .unwrap();

        assert_eq!(seen, (None, Some("worker".to_string())));
        assert_eq!(ambient::get("x-user").as_deref(), Some("main"));
        ambient::remove("x-user");
    }
}
