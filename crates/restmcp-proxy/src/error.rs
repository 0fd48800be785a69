use restmcp_client::ClientError;
use restmcp_types::{codes, RequestError};
use serde_json::{json, Value};
use thiserror::Error;
use warp::http::StatusCode;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    #[error("Invalid request: {0}")]
    BadRequest(#[from] RequestError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

impl ProxyError {
    /// HTTP status reported to the REST caller
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidBody(_) | ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ProxyError::Bind { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Client(err) => client_status(err),
        }
    }

    /// `{"error": message}`, plus `code` for upstream JSON-RPC errors
    pub fn to_body(&self) -> Value {
        match self {
            ProxyError::Client(ClientError::Rpc(rpc)) => json!({
                "error": rpc.message,
                "code": rpc.code,
            }),
            ProxyError::Client(ClientError::Json(e)) => json!({
                "error": format!("Failed to parse upstream response: {}", e),
            }),
            other => json!({ "error": other.to_string() }),
        }
    }
}

fn client_status(err: &ClientError) -> StatusCode {
    match err {
        ClientError::Rpc(rpc) => match rpc.code {
            codes::METHOD_NOT_FOUND => StatusCode::NOT_FOUND,
            codes::INVALID_PARAMS => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        },
        ClientError::ToolFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ClientError::Connection(_) | ClientError::Http(_) => StatusCode::BAD_GATEWAY,
        ClientError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ClientError::UpstreamStatus { status, .. } => StatusCode::from_u16(*status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY),
        ClientError::Handshake(_)
        | ClientError::Protocol(_)
        | ClientError::Json(_)
        | ClientError::InvalidUrl(_)
        | ClientError::InvalidHeader(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use restmcp_types::JsonRpcError;

    #[test]
    fn test_request_errors_are_bad_request() {
        let err = ProxyError::from(RequestError::MissingOperation);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_body(),
            json!({"error": "Invalid request: missing 'method' or 'action' field"})
        );
        assert_eq!(ProxyError::InvalidBody("eof".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_rpc_error_mapping() {
        let not_found = ProxyError::Client(ClientError::Rpc(JsonRpcError::method_not_found("x/y")));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_body()["code"], -32601);

        let bad_params = ProxyError::Client(ClientError::Rpc(JsonRpcError::invalid_params("no such tool")));
        assert_eq!(bad_params.status(), StatusCode::BAD_REQUEST);

        let other = ProxyError::Client(ClientError::Rpc(JsonRpcError::internal("boom")));
        assert_eq!(other.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(other.to_body(), json!({"error": "boom", "code": -32603}));
    }

    #[test]
    fn test_transport_error_mapping() {
        let cases = [
            (ClientError::ToolFailed("bad".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ClientError::Connection("refused".into()), StatusCode::BAD_GATEWAY),
            (ClientError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (ClientError::handshake("no session id"), StatusCode::INTERNAL_SERVER_ERROR),
            (ClientError::protocol("garbage"), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ClientError::UpstreamStatus { status: 503, body: String::new() },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ClientError::UpstreamStatus { status: 302, body: String::new() },
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ProxyError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_parse_failure_message() {
        let err = ProxyError::from(ClientError::protocol("not json"));
        let body = err.to_body();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to parse upstream response"));
    }
}
