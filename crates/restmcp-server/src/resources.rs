//! Read-only text resources

use crate::error::{Result, ServerError};
use crate::ServerConfig;
use serde_json::{json, Value};

pub const SERVER_STATUS_URI: &str = "text://server-status";
pub const API_DOCS_URI: &str = "text://api-docs";

pub fn list() -> Vec<Value> {
    vec![
        json!({
            "uri": SERVER_STATUS_URI,
            "name": "server-status",
            "description": "Server status and available tools",
            "mimeType": "application/json",
        }),
        json!({
            "uri": API_DOCS_URI,
            "name": "api-docs",
            "description": "Tool reference",
            "mimeType": "text/markdown",
        }),
    ]
}

/// `resources/read` result for `uri`
pub fn read(uri: &str, config: &ServerConfig, tool_names: &[String]) -> Result<Value> {
    let (mime_type, text) = match uri {
        SERVER_STATUS_URI => ("application/json", server_status(config, tool_names)?),
        API_DOCS_URI => ("text/markdown", API_DOCS.trim_start().to_string()),
        _ => return Err(ServerError::ResourceNotFound(uri.to_string())),
    };

    Ok(json!({
        "contents": [{
            "uri": uri,
            "mimeType": mime_type,
            "text": text,
        }]
    }))
}

fn server_status(config: &ServerConfig, tool_names: &[String]) -> Result<String> {
    let status = json!({
        "service": config.name,
        "version": config.version,
        "environment": config.environment,
        "endpoints": tool_names,
    });
    Ok(serde_json::to_string_pretty(&status)?)
}

const API_DOCS: &str = r#"
# restmcp tool server

## Tools

### add_numbers(a: number, b: number)
Returns `"a + b = sum"`.

### greet(name: string, language: "zh" | "en" | "ja" = "zh")
Greeting in the requested language.

### hello_world(name: string = "World")
Simple greeting.

### get_time / get_current_time(timezone: "UTC" | "Asia/Taipei" = "UTC")
Current time as `YYYY-MM-DD HH:MM:SS`.

### echo_message(message: string, repeat: integer = 1)
Numbered lines, repeat clamped to 1..=5.

### format_json(json_string: string)
Pretty-printed JSON, or an error message.

### calculate(expression: string)
Digits, spaces and `+ - * / . ( )` only, at most 100 characters.
Example: `calculate("2 + 3 * 4")` returns `2 + 3 * 4 = 14`.

### get_transactions(user_id: string)
Transaction history, one line per entry.

### get_exchange_rate(base: string, target: string)
Example: `1 USD = 32.15 TWD`.

### get_server_info() / health_check()
Server status as JSON.

### async_calculation(x: number, delay: number = 1.0)
Squares `x` after waiting `delay` seconds (at most 10).
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_known_resources() {
        let config = ServerConfig::default();
        let names = vec!["calculate".to_string()];

        let status = read(SERVER_STATUS_URI, &config, &names).unwrap();
        let text = status["contents"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["endpoints"], json!(["calculate"]));

        let docs = read(API_DOCS_URI, &config, &names).unwrap();
        assert!(docs["contents"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("# restmcp tool server"));
    }

    #[test]
    fn test_unknown_resource() {
        let result = read("text://nope", &ServerConfig::default(), &[]);
        assert!(matches!(result, Err(ServerError::ResourceNotFound(_))));
    }

    #[test]
    fn test_list_matches_readable() {
        for resource in list() {
            let uri = resource["uri"].as_str().unwrap();
            assert!(read(uri, &ServerConfig::default(), &[]).is_ok());
        }
    }
}
