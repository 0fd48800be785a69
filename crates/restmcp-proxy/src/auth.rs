use crate::error::{ProxyError, Result};
use tracing::{debug, warn};

/// Optional inbound bearer token check
#[derive(Debug, Clone, Default)]
pub struct BearerAuth {
    token: Option<String>,
}

impl BearerAuth {
    /// Accept every request
    pub fn disabled() -> Self {
        Self { token: None }
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Empty or absent tokens disable the check
    pub fn from_option(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    pub fn authorize(&self, authorization: Option<&str>) -> Result<()> {
        let Some(expected) = self.token.as_deref() else {
            return Ok(());
        };

        let presented = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(|| {
                warn!("Rejecting request without bearer token");
                ProxyError::Unauthorized("missing bearer token".to_string())
            })?;

        if presented != expected {
            warn!("Rejecting request with invalid bearer token");
            return Err(ProxyError::Unauthorized("invalid bearer token".to_string()));
        }

        debug!("Bearer token accepted");
        Ok(())
    }
}
