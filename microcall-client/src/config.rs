use microcall_transport::HttpConfig;
use serde::Deserialize;
use std::time::Duration;

/// Proxy configuration. Fixed once the proxy is built.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Treat an empty response body as a null result instead of decoding it.
    pub empty_body_as_null: bool,
    /// Per-attempt request timeout in milliseconds
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self {
            empty_body_as_null: true,
            request_timeout_ms: 30000,
            user_agent: http.user_agent,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: self.request_timeout(),
            user_agent: self.user_agent.clone(),
        }
    }
}
