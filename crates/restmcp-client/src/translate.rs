//! Inbound operation -> upstream JSON-RPC envelope

use restmcp_types::{JsonRpcRequest, OperationCall};
use serde_json::{json, Value};

/// Build the upstream envelope for an operation.
///
/// Protocol methods (`tools/list`, `ping`, ...) keep their name and use the
/// arguments as params. Anything else is a tool invoked through `tools/call`.
pub fn translate(call: &OperationCall, id: impl Into<Value>) -> JsonRpcRequest {
    if call.is_protocol_method() {
        let params = if call.arguments.is_empty() {
            None
        } else {
            Some(Value::Object(call.arguments.clone()))
        };
        return JsonRpcRequest::new(id, call.name.clone(), params);
    }

    JsonRpcRequest::new(
        id,
        "tools/call",
        Some(json!({
            "name": call.name,
            "arguments": call.arguments,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_tool_becomes_tools_call() {
        let call = OperationCall::new("add_numbers", args(json!({"a": 10, "b": 25})));
        let request = translate(&call, "proxy-1");

        assert_eq!(request.method, "tools/call");
        assert_eq!(request.id, json!("proxy-1"));
        assert_eq!(
            request.params,
            Some(json!({"name": "add_numbers", "arguments": {"a": 10, "b": 25}}))
        );
    }

    #[test]
    fn test_protocol_method_passthrough() {
        let call = OperationCall::new("tools/list", Map::new());
        let request = translate(&call, 7);
        assert_eq!(request.method, "tools/list");
        assert_eq!(request.params, None);

        let call = OperationCall::new("resources/read", args(json!({"uri": "text://api-docs"})));
        let request = translate(&call, 8);
        assert_eq!(request.params, Some(json!({"uri": "text://api-docs"})));
    }

    #[test]
    fn test_envelope_wire_shape() {
        let call = OperationCall::new("get_time", Map::new());
        let wire = serde_json::to_value(translate(&call, 1)).unwrap();
        assert_eq!(wire["jsonrpc"], "2.0");
        assert_eq!(wire["params"]["arguments"], json!({}));
    }
}
