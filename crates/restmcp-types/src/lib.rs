//! restmcp Types - shared wire types
//!
//! JSON-RPC 2.0 envelope types spoken between the proxy and the upstream tool
//! server, the inbound REST request shape accepted by the proxy, and
//! re-exports of the rmcp model types used for tool descriptors and results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Re-export the rmcp model types used across the workspace
pub use rmcp::model::{CallToolResult, Content, JsonObject, RawContent, Tool};

/// JSON-RPC protocol version string
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision negotiated during the handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Header carrying the session identifier issued by `initialize`
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Accept value required by streamable HTTP servers
pub const ACCEPT_JSON_AND_SSE: &str = "application/json, text/event-stream";

/// Common error codes
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const SESSION_REQUIRED: i32 = -32000;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("JSON-RPC error {code}: {message}")]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, "Parse error").with_data(Value::String(detail.into()))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }

    pub fn session_required(message: impl Into<String>) -> Self {
        Self::new(codes::SESSION_REQUIRED, message)
    }
}

/// Why an inbound REST body could not be turned into an [`OperationCall`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("missing 'method' or 'action' field")]
    MissingOperation,

    #[error("'{0}' must be a JSON object")]
    ParamsNotObject(&'static str),
}

/// Inbound REST body: `{method, params}` or `{action, data}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyRequest {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ProxyRequest {
    /// Operation name, preferring `method` over `action`
    pub fn operation(&self) -> Option<&str> {
        self.method
            .as_deref()
            .or(self.action.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn into_call(self) -> Result<OperationCall, RequestError> {
        let name = self
            .operation()
            .map(str::to_string)
            .ok_or(RequestError::MissingOperation)?;

        let (field, raw) = match (self.params, self.data) {
            (Some(params), _) => ("params", params),
            (None, Some(data)) => ("data", data),
            (None, None) => ("params", Value::Null),
        };

        let arguments = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => return Err(RequestError::ParamsNotObject(field)),
        };

        Ok(OperationCall { name, arguments })
    }
}

/// A validated operation: a name plus its argument mapping
#[derive(Debug, Clone, PartialEq)]
pub struct OperationCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl OperationCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Protocol methods are forwarded as-is; anything else names a tool
    pub fn is_protocol_method(&self) -> bool {
        self.name == "ping" || self.name.contains('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> ProxyRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_method_and_params() {
        let call = request(json!({"method": "add_numbers", "params": {"a": 1, "b": 2}}))
            .into_call()
            .unwrap();
        assert_eq!(call.name, "add_numbers");
        assert_eq!(call.arguments.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_action_and_data() {
        let call = request(json!({"action": "greet", "data": {"name": "John"}}))
            .into_call()
            .unwrap();
        assert_eq!(call.name, "greet");
        assert_eq!(call.arguments.get("name"), Some(&json!("John")));
    }

    #[test]
    fn test_method_wins_over_action() {
        let req = request(json!({"method": "get_time", "action": "greet"}));
        assert_eq!(req.operation(), Some("get_time"));
    }

    #[test]
    fn test_missing_operation() {
        let result = request(json!({"params": {"a": 1}})).into_call();
        assert_eq!(result.unwrap_err(), RequestError::MissingOperation);

        let result = request(json!({"method": "   "})).into_call();
        assert_eq!(result.unwrap_err(), RequestError::MissingOperation);
    }

    #[test]
    fn test_params_must_be_object() {
        let result = request(json!({"method": "greet", "params": [1, 2]})).into_call();
        assert_eq!(result.unwrap_err(), RequestError::ParamsNotObject("params"));

        let call = request(json!({"method": "get_time", "params": null}))
            .into_call()
            .unwrap();
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn test_protocol_method_detection() {
        assert!(OperationCall::new("tools/list", Map::new()).is_protocol_method());
        assert!(OperationCall::new("ping", Map::new()).is_protocol_method());
        assert!(!OperationCall::new("calculate", Map::new()).is_protocol_method());
    }

    #[test]
    fn test_response_serialization() {
        let ok = JsonRpcResponse::success(json!(1), json!({"x": 1}));
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 1, "result": {"x": 1}}));

        let err = JsonRpcResponse::failure(json!("a"), JsonRpcError::method_not_found("nope"));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["error"]["code"], codes::METHOD_NOT_FOUND);
        assert!(value.get("result").is_none());
    }
}
