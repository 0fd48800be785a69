//! restmcp Client - upstream side of the REST proxy
//!
//! This crate talks JSON-RPC over HTTP to an MCP-style tool server: it
//! performs the one-time session handshake, translates operations into
//! upstream envelopes, and normalizes whatever shape comes back into plain
//! JSON.

pub mod client;
pub mod error;
pub mod normalize;
pub mod retry;
pub mod session;
pub mod sse;
pub mod translate;
pub mod transport;

pub use client::{Upstream, UpstreamClient};
pub use error::{ClientError, Result};
pub use normalize::{normalize, ReplyShape};
pub use retry::{retry, RetryPolicy};
pub use session::{SessionManager, SessionToken};
pub use translate::translate;
pub use transport::{HttpTransport, UpstreamResponse};

use std::collections::HashMap;
use std::time::Duration;

/// Default upstream endpoint: the bundled tool server on its default port
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:9000/mcp";

// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub handshake_retry: RetryPolicy,
    pub client_name: String,
    pub client_version: String,
    pub protocol_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_UPSTREAM_URL)
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            headers: HashMap::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            handshake_retry: RetryPolicy::default(),
            client_name: "restmcp-proxy".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: restmcp_types::PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handshake_retry(mut self, policy: RetryPolicy) -> Self {
        self.handshake_retry = policy;
        self
    }

    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_name = name.into();
        self.client_version = version.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config() {
        let config = ClientConfig::new("http://localhost:9000/mcp")
            .with_header("X-Trace", "1")
            .with_timeout(Duration::from_secs(60))
            .with_handshake_retry(RetryPolicy::fixed(3, Duration::from_millis(100)))
            .with_client_info("tester", "9.9.9");

        assert_eq!(config.server_url, "http://localhost:9000/mcp");
        assert_eq!(config.headers.get("X-Trace"), Some(&"1".to_string()));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.handshake_retry.max_attempts, 3);
        assert_eq!(config.client_name, "tester");
        assert_eq!(config.protocol_version, "2024-11-05");
    }

    #[test]
    fn test_default_handshake_policy() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.handshake_retry.max_attempts, 10);
        assert_eq!(config.handshake_retry.initial_delay, Duration::from_secs(2));
    }
}
