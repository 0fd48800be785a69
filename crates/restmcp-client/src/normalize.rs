//! Response normalization
//!
//! The upstream answers in one of a few shapes. Bodies are decoded first
//! (plain JSON, falling back to event-stream extraction), then classified
//! into a closed set of [`ReplyShape`]s, each with its own rendering into a
//! plain JSON value.

use crate::error::{ClientError, Result};
use crate::sse;
use restmcp_types::{CallToolResult, Content, JsonRpcError, RawContent};
use serde_json::Value;
use tracing::debug;

/// Decode a raw upstream body into JSON.
///
/// Event-stream content types go straight to extraction; anything else is
/// parsed as JSON first and only then probed for `data:` lines.
pub fn decode_body(content_type: Option<&str>, body: &str) -> Result<Value> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    let is_event_stream = content_type
        .map(|ct| ct.to_ascii_lowercase().starts_with("text/event-stream"))
        .unwrap_or(false);

    if !is_event_stream {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => return Ok(value),
            Err(e) if !sse::looks_like_event_stream(trimmed) => {
                return Err(ClientError::protocol(format!("body is not JSON: {}", e)));
            }
            Err(_) => debug!("Body is not plain JSON, trying event-stream extraction"),
        }
    }

    let data = sse::first_event_data(trimmed)
        .ok_or_else(|| ClientError::protocol("event stream carried no data line"))?;
    debug!("Extracted JSON from event stream: {}", data);

    serde_json::from_str(&data)
        .map_err(|e| ClientError::protocol(format!("event data is not JSON: {}", e)))
}

/// Every shape the upstream is known to answer with
#[derive(Debug, Clone)]
pub enum ReplyShape {
    /// JSON-RPC envelope carrying an error object
    Failed(JsonRpcError),
    /// Tool result made of content blocks, enveloped or bare
    ToolContent(CallToolResult),
    /// JSON-RPC envelope carrying any other result
    Enveloped(Value),
    /// No envelope at all
    Plain(Value),
}

impl ReplyShape {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Object(mut map) if is_envelope(&map) => {
                if let Some(error) = map.remove("error").filter(|e| !e.is_null()) {
                    let error = serde_json::from_value::<JsonRpcError>(error.clone())
                        .unwrap_or_else(|_| JsonRpcError::internal(error.to_string()));
                    return ReplyShape::Failed(error);
                }

                let result = map.remove("result").unwrap_or(Value::Null);
                match as_tool_result(&result) {
                    Some(tool) => ReplyShape::ToolContent(tool),
                    None => ReplyShape::Enveloped(result),
                }
            }
            other => match as_tool_result(&other) {
                Some(tool) => ReplyShape::ToolContent(tool),
                None => ReplyShape::Plain(other),
            },
        }
    }

    /// Render into the value handed back to the proxy caller
    pub fn into_value(self) -> Result<Value> {
        match self {
            ReplyShape::Failed(error) => Err(ClientError::Rpc(error)),
            ReplyShape::ToolContent(tool) => render_tool_result(tool),
            ReplyShape::Enveloped(value) | ReplyShape::Plain(value) => Ok(value),
        }
    }
}

/// Decode, classify and render in one step
pub fn normalize(content_type: Option<&str>, body: &str) -> Result<Value> {
    ReplyShape::classify(decode_body(content_type, body)?).into_value()
}

fn is_envelope(map: &serde_json::Map<String, Value>) -> bool {
    map.contains_key("jsonrpc")
        || (map.contains_key("id") && (map.contains_key("result") || map.contains_key("error")))
}

fn as_tool_result(value: &Value) -> Option<CallToolResult> {
    let has_content = value
        .get("content")
        .map(Value::is_array)
        .unwrap_or(false);
    if !has_content {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

fn render_tool_result(tool: CallToolResult) -> Result<Value> {
    if tool.is_error == Some(true) {
        let message = tool
            .content
            .into_iter()
            .filter_map(|content| match content.raw {
                RawContent::Text(text) => Some(text.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        return Err(ClientError::ToolFailed(message));
    }

    if let Some(structured) = tool.structured_content {
        return Ok(structured);
    }

    let mut items = tool
        .content
        .into_iter()
        .map(render_content)
        .collect::<Result<Vec<_>>>()?;

    Ok(match items.len() {
        0 => Value::Null,
        1 => items.remove(0),
        _ => Value::Array(items),
    })
}

fn render_content(content: Content) -> Result<Value> {
    match content.raw {
        RawContent::Text(text) => Ok(Value::String(text.text)),
        other => Ok(serde_json::to_value(other)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restmcp_types::codes;
    use serde_json::json;

    #[test]
    fn test_plain_json_passthrough() {
        let value = normalize(Some("application/json"), r#"{"status":"ok"}"#).unwrap();
        assert_eq!(value, json!({"status": "ok"}));
    }

    #[test]
    fn test_envelope_unwrapped_one_level() {
        let body = r#"{"jsonrpc":"2.0","id":"proxy-1","result":{"tools":[]}}"#;
        let value = normalize(Some("application/json"), body).unwrap();
        assert_eq!(value, json!({"tools": []}));
    }

    #[test]
    fn test_tool_content_rendered_as_text() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"content": [{"type": "text", "text": "10 + 25 = 35"}], "isError": false}
        })
        .to_string();
        let value = normalize(None, &body).unwrap();
        assert_eq!(value, json!("10 + 25 = 35"));
    }

    #[test]
    fn test_multiple_content_blocks() {
        let body = json!({
            "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]
        })
        .to_string();
        assert_eq!(normalize(None, &body).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_tool_error_is_failure() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"content": [{"type": "text", "text": "bad argument"}], "isError": true}
        })
        .to_string();
        let err = normalize(None, &body).unwrap_err();
        assert!(matches!(err, ClientError::ToolFailed(ref msg) if msg == "bad argument"));
    }

    #[test]
    fn test_event_stream_by_content_type() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"ok\":true}}\n\n";
        let value = normalize(Some("text/event-stream; charset=utf-8"), body).unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn test_event_stream_sniffed_without_content_type() {
        let body = "event: message\ndata: {\"result\":5,\"id\":2,\"jsonrpc\":\"2.0\"}\n\n";
        assert_eq!(normalize(Some("text/plain"), body).unwrap(), json!(5));
    }

    #[test]
    fn test_rpc_error() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found: x"}}"#;
        match normalize(None, body).unwrap_err() {
            ClientError::Rpc(error) => assert_eq!(error.code, codes::METHOD_NOT_FOUND),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_body() {
        let err = normalize(Some("text/html"), "<html>oops</html>").unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));

        let err = normalize(Some("text/event-stream"), "event: ping\n\n").unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[test]
    fn test_empty_body_is_null() {
        assert_eq!(normalize(None, "  ").unwrap(), Value::Null);
    }
}
