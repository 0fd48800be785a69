use restmcp_types::JsonRpcError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Upstream unreachable: {0}")]
    Connection(String),

    #[error("Upstream request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Upstream returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Session handshake failed: {0}")]
    Handshake(String),

    #[error("Failed to parse upstream response: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upstream error: {0}")]
    Rpc(JsonRpcError),

    #[error("Tool reported failure: {0}")]
    ToolFailed(String),
}

impl ClientError {
    pub fn handshake(msg: impl Into<String>) -> Self {
        ClientError::Handshake(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        ClientError::Protocol(msg.into())
    }

    /// HTTP status the upstream answered with, when there was one
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ClientError::UpstreamStatus { status, .. } => Some(*status),
            ClientError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::Connection(err.to_string())
        } else {
            ClientError::Http(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status() {
        let err = ClientError::UpstreamStatus {
            status: 503,
            body: "busy".to_string(),
        };
        assert_eq!(err.upstream_status(), Some(503));
        assert_eq!(err.to_string(), "Upstream returned HTTP 503: busy");
        assert_eq!(ClientError::Timeout.upstream_status(), None);
    }
}
