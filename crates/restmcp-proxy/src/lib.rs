//! restmcp Proxy - REST front end for an MCP tool server
//!
//! Accepts `{method, params}` (or `{action, data}`) JSON bodies over HTTP,
//! forwards them through [`restmcp_client::Upstream`] and answers with
//! `{"result": ...}` or `{"error": ...}`.

pub mod auth;
pub mod error;
pub mod proxy;

pub use auth::BearerAuth;
pub use error::{ProxyError, Result};
pub use proxy::RestProxy;

use std::net::SocketAddr;

/// Default listen address for the REST proxy
pub const DEFAULT_LISTEN_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 8080);

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub listen_addr: SocketAddr,
    /// Open the upstream session before serving the first request
    pub startup_handshake: bool,
    /// Bearer token required on inbound requests, if any
    pub auth_token: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(DEFAULT_LISTEN_ADDR),
            startup_handshake: true,
            auth_token: None,
        }
    }
}

impl ProxyConfig {
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_startup_handshake(mut self, enabled: bool) -> Self {
        self.startup_handshake = enabled;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_config_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_addr.to_string(), "0.0.0.0:8080");
        assert!(config.startup_handshake);
        assert!(config.auth_token.is_none());

        let config = config
            .with_startup_handshake(false)
            .with_auth_token("token")
            .with_listen_addr(([127, 0, 0, 1], 9999).into());
        assert!(!config.startup_handshake);
        assert_eq!(config.auth_token.as_deref(), Some("token"));
        assert_eq!(config.listen_addr.port(), 9999);
    }
}
