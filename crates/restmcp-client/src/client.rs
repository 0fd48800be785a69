//! Upstream client: session + translation + transport + normalization

use crate::error::{ClientError, Result};
use crate::normalize::normalize;
use crate::session::{SessionManager, SessionToken};
use crate::translate::translate;
use crate::transport::HttpTransport;
use crate::ClientConfig;
use async_trait::async_trait;
use restmcp_types::{OperationCall, Tool};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// What the proxy needs from an upstream
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Forward one operation and return its normalized result
    async fn call(&self, call: &OperationCall) -> Result<Value>;

    /// Startup handshake with the configured retry budget
    async fn establish_session(&self) -> Result<SessionToken>;

    fn session_ready(&self) -> bool;

    fn endpoint(&self) -> &str;
}

pub struct UpstreamClient {
    config: ClientConfig,
    transport: Arc<HttpTransport>,
    sessions: SessionManager,
    next_id: AtomicU64,
}

impl UpstreamClient {
    /// Create a client. No I/O happens until the first call or `connect`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        info!("Creating upstream client for URL: {}", config.server_url);
        debug!("Client config: {:?}", config);

        let url = url::Url::parse(&config.server_url)
            .map_err(|e| ClientError::InvalidUrl(format!("'{}': {}", config.server_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let transport = Arc::new(HttpTransport::new(&config)?);
        let sessions = SessionManager::new(Arc::clone(&transport), &config);

        Ok(Self {
            config,
            transport,
            sessions,
            next_id: AtomicU64::new(1),
        })
    }

    /// Run the startup handshake
    pub async fn connect(&self) -> Result<SessionToken> {
        self.sessions.establish().await
    }

    pub async fn call(&self, call: &OperationCall) -> Result<Value> {
        let session = self.sessions.ensure_session().await?;

        let id = format!("proxy-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = translate(call, id);
        info!(
            "Forwarding '{}' to {} as {}",
            call.name,
            self.transport.endpoint(),
            request.method
        );

        let response = self
            .transport
            .post(&request, Some(&session))
            .await
            .inspect_err(|e| {
                error!(
                    "Upstream call '{}' to {} failed: {}",
                    call.name,
                    self.transport.endpoint(),
                    e
                )
            })?;

        normalize(response.content_type.as_deref(), &response.body).inspect_err(|e| {
            error!(
                "Upstream call '{}' returned unusable response (status {}): {}",
                call.name, response.status, e
            )
        })
    }

    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Value> {
        self.call(&OperationCall::new(name, arguments)).await
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let result = self
            .call(&OperationCall::new("tools/list", Map::new()))
            .await?;
        let tools = result
            .get("tools")
            .cloned()
            .ok_or_else(|| ClientError::protocol("tools/list result has no 'tools' field"))?;
        Ok(serde_json::from_value(tools)?)
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn server_url(&self) -> &str {
        &self.config.server_url
    }
}

#[async_trait]
impl Upstream for UpstreamClient {
    async fn call(&self, call: &OperationCall) -> Result<Value> {
        UpstreamClient::call(self, call).await
    }

    async fn establish_session(&self) -> Result<SessionToken> {
        self.connect().await
    }

    fn session_ready(&self) -> bool {
        self.sessions.is_ready()
    }

    fn endpoint(&self) -> &str {
        self.server_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use serde_json::json;
    use std::time::Duration;
    use warp::{Filter, Reply};

    #[test]
    fn test_url_validation() {
        let result = UpstreamClient::new(ClientConfig::new("invalid-url"));
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));

        let result = UpstreamClient::new(ClientConfig::new("ftp://example.com/mcp"));
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));

        let result = UpstreamClient::new(ClientConfig::new("http://localhost:9000/mcp"));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_call_through_event_stream_upstream() {
        // Upstream answering every call as an SSE body with a tool result
        let route = warp::post()
            .and(warp::header::optional::<String>("mcp-session-id"))
            .and(warp::body::json())
            .map(|session: Option<String>, body: serde_json::Value| {
                let method = body["method"].as_str().unwrap_or_default().to_string();
                if method == "initialize" {
                    let reply = warp::reply::json(&json!({"jsonrpc": "2.0", "id": body["id"], "result": {}}));
                    return warp::reply::with_header(reply, "mcp-session-id", "abc").into_response();
                }
                if method.starts_with("notifications/") {
                    return warp::reply::with_status(warp::reply(), warp::http::StatusCode::ACCEPTED)
                        .into_response();
                }
                assert_eq!(session.as_deref(), Some("abc"));
                let envelope = json!({
                    "jsonrpc": "2.0",
                    "id": body["id"],
                    "result": {"content": [{"type": "text", "text": format!("called {}", body["params"]["name"])}]}
                });
                let sse = format!("event: message\ndata: {}\n\n", envelope);
                warp::reply::with_header(sse, "content-type", "text/event-stream").into_response()
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let config = ClientConfig::new(format!("http://{}/mcp", addr))
            .with_handshake_retry(RetryPolicy::fixed(2, Duration::from_millis(10)));
        let client = UpstreamClient::new(config).unwrap();

        let value = client.call_tool("get_time", Map::new()).await.unwrap();
        assert_eq!(value, json!("called \"get_time\""));
        assert!(client.session_ready());
        assert_eq!(client.sessions().handshake_count(), 1);
    }
}
