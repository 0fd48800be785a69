//! Tool registry: descriptors plus async handlers, keyed by tool name

use crate::calculator::Number;
use crate::error::{Result, ServerError};
use crate::tools::{self, Ledger};
use crate::ServerConfig;
use futures::future::{BoxFuture, FutureExt};
use restmcp_types::{CallToolResult, Content, JsonObject, Tool};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tool execution handler function type
pub type ToolHandler =
    Arc<dyn Fn(JsonObject) -> BoxFuture<'static, Result<CallToolResult>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    tool_handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any earlier tool with the same name
    pub fn add_tool(&mut self, tool: Tool, handler: ToolHandler) {
        let name = tool.name.to_string();
        self.tools.retain(|existing| existing.name != tool.name);
        self.tool_handlers.insert(name, handler);
        self.tools.push(tool);
    }

    pub fn list(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool. Handler failures become an `isError` result; only an
    /// unknown name is an error.
    pub async fn call(&self, name: &str, arguments: JsonObject) -> Result<CallToolResult> {
        let handler = self
            .tool_handlers
            .get(name)
            .cloned()
            .ok_or_else(|| ServerError::ToolNotFound(name.to_string()))?;

        debug!("Tool execution started: {}", name);
        match handler(arguments).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("Tool '{}' failed: {}", name, e);
                Ok(Self::error_result(format!("Tool execution failed: {}", e)))
            }
        }
    }

    /// Create a success result for tool execution
    pub fn success_result(text: impl Into<String>) -> CallToolResult {
        CallToolResult::success(vec![Content::text(text.into())])
    }

    /// Create an error result for tool execution
    pub fn error_result(message: impl Into<String>) -> CallToolResult {
        CallToolResult::error(vec![Content::text(message.into())])
    }

    /// Every tool the bundled server exposes
    pub fn builtin(ledger: Arc<Ledger>, config: Arc<ServerConfig>) -> Self {
        let mut registry = Self::new();

        registry.add_tool(
            Tool::new(
                "add_numbers",
                "Add two numbers",
                schema(
                    json!({
                        "a": {"type": "number", "description": "First number"},
                        "b": {"type": "number", "description": "Second number"}
                    }),
                    &["a", "b"],
                ),
            ),
            sync_handler(|args| {
                Ok(tools::add_numbers(
                    number_arg(args, "a")?,
                    number_arg(args, "b")?,
                ))
            }),
        );

        registry.add_tool(
            Tool::new(
                "greet",
                "Greet someone in Chinese (zh), English (en) or Japanese (ja)",
                schema(
                    json!({
                        "name": {"type": "string", "description": "Who to greet"},
                        "language": {"type": "string", "enum": ["zh", "en", "ja"], "default": tools::DEFAULT_LANGUAGE}
                    }),
                    &["name"],
                ),
            ),
            sync_handler(|args| {
                let name = string_arg(args, "name")?;
                let language = optional_string_arg(args, "language", tools::DEFAULT_LANGUAGE)?;
                Ok(tools::greet(&name, &language))
            }),
        );

        registry.add_tool(
            Tool::new(
                "hello_world",
                "Simple greeting",
                schema(
                    json!({"name": {"type": "string", "default": "World"}}),
                    &[],
                ),
            ),
            sync_handler(|args| {
                let name = optional_string_arg(args, "name", "World")?;
                Ok(tools::hello_world(&name))
            }),
        );

        for (name, description) in [
            ("get_time", "Current time"),
            ("get_current_time", "Current time in UTC or Asia/Taipei"),
        ] {
            registry.add_tool(
                Tool::new(
                    name,
                    description,
                    schema(
                        json!({"timezone": {"type": "string", "enum": ["UTC", "Asia/Taipei"], "default": "UTC"}}),
                        &[],
                    ),
                ),
                sync_handler(|args| {
                    let timezone = optional_string_arg(args, "timezone", "UTC")?;
                    Ok(tools::current_time(&timezone))
                }),
            );
        }

        registry.add_tool(
            Tool::new(
                "echo_message",
                "Echo a message up to five times",
                schema(
                    json!({
                        "message": {"type": "string"},
                        "repeat": {"type": "integer", "minimum": 1, "maximum": 5, "default": 1}
                    }),
                    &["message"],
                ),
            ),
            sync_handler(|args| {
                let message = string_arg(args, "message")?;
                let repeat = optional_int_arg(args, "repeat", 1)?;
                Ok(tools::echo_message(&message, repeat))
            }),
        );

        registry.add_tool(
            Tool::new(
                "format_json",
                "Pretty-print a JSON string",
                schema(json!({"json_string": {"type": "string"}}), &["json_string"]),
            ),
            sync_handler(|args| Ok(tools::format_json(&string_arg(args, "json_string")?))),
        );

        registry.add_tool(
            Tool::new(
                "calculate",
                "Evaluate a basic arithmetic expression",
                schema(
                    json!({"expression": {"type": "string", "description": "Digits, spaces and + - * / . ( ) only"}}),
                    &["expression"],
                ),
            ),
            sync_handler(|args| Ok(tools::calculate(&string_arg(args, "expression")?))),
        );

        let transactions = Arc::clone(&ledger);
        registry.add_tool(
            Tool::new(
                "get_transactions",
                "Transaction history for a user",
                schema(json!({"user_id": {"type": "string"}}), &["user_id"]),
            ),
            sync_handler(move |args| {
                Ok(tools::get_transactions(
                    &transactions,
                    &string_arg(args, "user_id")?,
                ))
            }),
        );

        let rates = Arc::clone(&ledger);
        registry.add_tool(
            Tool::new(
                "get_exchange_rate",
                "Exchange rate between two currencies",
                schema(
                    json!({
                        "base": {"type": "string", "description": "Base currency, e.g. USD"},
                        "target": {"type": "string", "description": "Target currency, e.g. TWD"}
                    }),
                    &["base", "target"],
                ),
            ),
            sync_handler(move |args| {
                Ok(tools::get_exchange_rate(
                    &rates,
                    &string_arg(args, "base")?,
                    &string_arg(args, "target")?,
                ))
            }),
        );

        let info_config = Arc::clone(&config);
        registry.add_tool(
            Tool::new("get_server_info", "Server status and environment", schema(json!({}), &[])),
            sync_handler(move |_| Ok(tools::server_info(&info_config))),
        );

        let health_config = Arc::clone(&config);
        registry.add_tool(
            Tool::new("health_check", "Health status", schema(json!({}), &[])),
            sync_handler(move |_| Ok(tools::health_status(&health_config))),
        );

        registry.add_tool(
            Tool::new(
                "async_calculation",
                "Square a number after a short delay",
                schema(
                    json!({
                        "x": {"type": "number"},
                        "delay": {"type": "number", "description": "Seconds to wait", "default": 1.0}
                    }),
                    &["x"],
                ),
            ),
            async_handler(|args| async move {
                let x = number_arg(&args, "x")?;
                let delay = optional_f64_arg(&args, "delay", 1.0)?;
                Ok(tools::async_calculation(x, delay).await)
            }),
        );

        registry
    }
}

/// Object schema with the given properties and required names
pub fn schema(properties: Value, required: &[&str]) -> Arc<JsonObject> {
    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), properties);
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    Arc::new(schema)
}

/// Wrap a synchronous text-producing function as a [`ToolHandler`]
pub fn sync_handler<F>(f: F) -> ToolHandler
where
    F: Fn(&JsonObject) -> Result<String> + Send + Sync + 'static,
{
    Arc::new(move |args| futures::future::ready(f(&args).map(ToolRegistry::success_result)).boxed())
}

/// Wrap an async text-producing function as a [`ToolHandler`]
pub fn async_handler<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    Arc::new(move |args| f(args).map(|text| text.map(ToolRegistry::success_result)).boxed())
}

fn string_arg(args: &JsonObject, name: &str) -> Result<String> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ServerError::invalid_argument(
            name,
            format!("expected a string, got {}", other),
        )),
        None => Err(ServerError::invalid_argument(name, "missing required argument")),
    }
}

fn optional_string_arg(args: &JsonObject, name: &str, default: &str) -> Result<String> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default.to_string()),
        Some(_) => string_arg(args, name),
    }
}

fn number_arg(args: &JsonObject, name: &str) -> Result<Number> {
    match args.get(name) {
        Some(value) => Number::from_json(value).ok_or_else(|| {
            ServerError::invalid_argument(name, format!("expected a number, got {}", value))
        }),
        None => Err(ServerError::invalid_argument(name, "missing required argument")),
    }
}

fn optional_f64_arg(args: &JsonObject, name: &str, default: f64) -> Result<f64> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(_) => number_arg(args, name).map(Number::as_f64),
    }
}

fn optional_int_arg(args: &JsonObject, name: &str, default: i64) -> Result<i64> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value.as_i64().ok_or_else(|| {
            ServerError::invalid_argument(name, format!("expected an integer, got {}", value))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restmcp_types::RawContent;

    fn registry() -> ToolRegistry {
        ToolRegistry::builtin(Arc::new(Ledger::sample()), Arc::new(ServerConfig::default()))
    }

    fn args(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => panic!("arguments must be an object"),
        }
    }

    fn text(result: &CallToolResult) -> String {
        match &result.content[0].raw {
            RawContent::Text(text) => text.text.clone(),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_builtin_tools_listed() {
        let registry = registry();
        let names = registry.names();

        for expected in [
            "add_numbers",
            "greet",
            "hello_world",
            "get_time",
            "get_current_time",
            "echo_message",
            "format_json",
            "calculate",
            "get_transactions",
            "get_exchange_rate",
            "get_server_info",
            "health_check",
            "async_calculation",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }
        assert_eq!(registry.len(), 13);
    }

    #[tokio::test]
    async fn test_call_tool() {
        let result = registry()
            .call("add_numbers", args(json!({"a": 10, "b": 25})))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(false));
        assert_eq!(text(&result), "10 + 25 = 35");
    }

    #[tokio::test]
    async fn test_bad_argument_is_tool_error() {
        let result = registry()
            .call("add_numbers", args(json!({"a": "not_a_number", "b": 5})))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).contains("Invalid argument 'a'"));

        let result = registry().call("calculate", JsonObject::new()).await.unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let result = registry().call("nonexistent_tool", JsonObject::new()).await;
        assert!(matches!(result, Err(ServerError::ToolNotFound(name)) if name == "nonexistent_tool"));
    }

    #[tokio::test]
    async fn test_defaults_applied() {
        let registry = registry();
        let result = registry.call("hello_world", JsonObject::new()).await.unwrap();
        assert!(text(&result).starts_with("Hello, World!"));

        let result = registry
            .call("greet", args(json!({"name": "John", "language": "en"})))
            .await
            .unwrap();
        assert_eq!(text(&result), "Hello, John!");
    }

    #[tokio::test]
    async fn test_add_tool_replaces_existing() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        for reply in ["first", "second"] {
            registry.add_tool(
                Tool::new("echo", "Echo tool", schema(json!({}), &[])),
                sync_handler(move |_| Ok(reply.to_string())),
            );
        }

        assert_eq!(registry.len(), 1);
        let result = registry.call("echo", JsonObject::new()).await.unwrap();
        assert_eq!(text(&result), "second");
    }
}
