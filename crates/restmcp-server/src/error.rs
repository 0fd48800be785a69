use restmcp_types::JsonRpcError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Resource '{0}' not found")]
    ResourceNotFound(String),
}

impl ServerError {
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// JSON-RPC error object reported to the caller
    pub fn to_rpc_error(&self) -> JsonRpcError {
        match self {
            ServerError::ToolNotFound(_)
            | ServerError::InvalidArgument { .. }
            | ServerError::ResourceNotFound(_) => JsonRpcError::invalid_params(self.to_string()),
            ServerError::Json(e) => JsonRpcError::invalid_params(e.to_string()),
            _ => JsonRpcError::internal(self.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
