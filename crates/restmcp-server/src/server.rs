//! JSON-RPC over HTTP endpoint for the tool registry

use crate::error::{Result, ServerError};
use crate::registry::ToolRegistry;
use crate::resources;
use crate::tools::Ledger;
use crate::ServerConfig;
use restmcp_types::{JsonObject, JsonRpcError, JsonRpcResponse, SESSION_HEADER};
use rmcp::model::{
    Implementation, InitializeResult, ProtocolVersion, ResourcesCapability, ServerCapabilities,
    ToolsCapability,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use warp::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use warp::http::{HeaderValue, StatusCode};
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Tool server: registry, configuration and the set of live sessions
#[derive(Clone)]
pub struct ToolServer {
    config: Arc<ServerConfig>,
    registry: Arc<ToolRegistry>,
    sessions: Arc<RwLock<HashSet<String>>>,
}

impl ToolServer {
    /// Server with the builtin tools over the sample ledger
    pub fn new(config: ServerConfig) -> Self {
        let config = Arc::new(config);
        let registry = ToolRegistry::builtin(Arc::new(Ledger::sample()), Arc::clone(&config));
        Self {
            config,
            registry: Arc::new(registry),
            sessions: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone + Send + Sync + 'static {
        let server = self.clone();
        let with_server = warp::any().map(move || server.clone());

        let rpc = warp::path("mcp")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::header::optional::<String>(SESSION_HEADER))
            .and(warp::header::optional::<String>("accept"))
            .and(warp::body::bytes())
            .and(with_server.clone())
            .and_then(handle_rpc);

        let terminate = warp::path("mcp")
            .and(warp::path::end())
            .and(warp::delete())
            .and(warp::header::optional::<String>(SESSION_HEADER))
            .and(with_server)
            .and_then(handle_terminate);

        let health = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| warp::reply::json(&json!({"status": "healthy"})));

        rpc.or(terminate).or(health)
    }

    /// Bind `addr` and return the bound address and the server future,
    /// which completes once `shutdown` resolves.
    pub fn bind<F>(
        &self,
        addr: SocketAddr,
        shutdown: F,
    ) -> Result<(SocketAddr, impl Future<Output = ()> + Send + 'static)>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| ServerError::Bind {
                addr: addr.to_string(),
                reason: e.to_string(),
            })
    }

    pub async fn run<F>(self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (bound, server) = self.bind(addr, shutdown)?;
        info!(
            "{} ({}) listening on http://{}/mcp with {} tools",
            self.config.name,
            self.config.environment,
            bound,
            self.registry.len()
        );
        server.await;
        info!("Tool server stopped");
        Ok(())
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                resources: Some(ResourcesCapability::default()),
                ..Default::default()
            },
            server_info: Implementation {
                name: self.config.name.clone(),
                version: self.config.version.clone(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: self.config.instructions.clone(),
        }
    }

    async fn dispatch(&self, method: &str, params: Value) -> std::result::Result<Value, JsonRpcError> {
        match method {
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.registry.list() })),
            "tools/call" => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| JsonRpcError::invalid_params("tools/call requires a 'name'"))?;
                let arguments = match params.get("arguments") {
                    None | Some(Value::Null) => JsonObject::new(),
                    Some(Value::Object(map)) => map.clone(),
                    Some(_) => {
                        return Err(JsonRpcError::invalid_params("'arguments' must be an object"))
                    }
                };

                let result = self
                    .registry
                    .call(name, arguments)
                    .await
                    .map_err(|e| e.to_rpc_error())?;
                serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
            }
            "resources/list" => Ok(json!({ "resources": resources::list() })),
            "resources/read" => {
                let uri = params
                    .get("uri")
                    .and_then(Value::as_str)
                    .ok_or_else(|| JsonRpcError::invalid_params("resources/read requires a 'uri'"))?;
                resources::read(uri, &self.config, &self.registry.names())
                    .map_err(|e| e.to_rpc_error())
            }
            _ => Err(JsonRpcError::method_not_found(method)),
        }
    }
}

async fn handle_rpc(
    session: Option<String>,
    accept: Option<String>,
    body: Bytes,
    server: ToolServer,
) -> std::result::Result<Response, Infallible> {
    let stream = server.config.stream_responses
        && accept
            .as_deref()
            .map_or(false, |accept| accept.contains("text/event-stream"));

    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!("Rejecting unparseable JSON-RPC body: {}", e);
            let response = JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error(e.to_string()));
            return Ok(rpc_reply(&response, StatusCode::BAD_REQUEST, false));
        }
    };

    let id = message.get("id").cloned();
    let Some(method) = message.get("method").and_then(Value::as_str) else {
        let response = JsonRpcResponse::failure(
            id.unwrap_or(Value::Null),
            JsonRpcError::invalid_request("missing 'method'"),
        );
        return Ok(rpc_reply(&response, StatusCode::BAD_REQUEST, false));
    };
    let params = message.get("params").cloned().unwrap_or(Value::Null);
    debug!("Received {} (id {:?})", method, id);

    if method == "initialize" {
        let session_id = Uuid::new_v4().to_string();
        server.sessions.write().await.insert(session_id.clone());
        info!("Opened session {}", session_id);

        let result = match serde_json::to_value(server.initialize_result()) {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to serialize initialize result: {}", e);
                let response = JsonRpcResponse::failure(
                    id.unwrap_or(Value::Null),
                    JsonRpcError::internal(e.to_string()),
                );
                return Ok(rpc_reply(&response, StatusCode::INTERNAL_SERVER_ERROR, false));
            }
        };
        let response = JsonRpcResponse::success(id.unwrap_or(Value::Null), result);
        let reply = rpc_reply(&response, StatusCode::OK, stream);
        return Ok(warp::reply::with_header(reply, SESSION_HEADER, session_id).into_response());
    }

    let Some(session) = session else {
        warn!("Rejecting {} without a session id", method);
        let response = JsonRpcResponse::failure(
            id.unwrap_or(Value::Null),
            JsonRpcError::session_required("Bad Request: missing session id"),
        );
        return Ok(rpc_reply(&response, StatusCode::BAD_REQUEST, false));
    };
    if !server.sessions.read().await.contains(&session) {
        warn!("Rejecting {} for unknown session {}", method, session);
        let response = JsonRpcResponse::failure(
            id.unwrap_or(Value::Null),
            JsonRpcError::session_required("Session not found"),
        );
        return Ok(rpc_reply(&response, StatusCode::NOT_FOUND, false));
    }

    let Some(id) = id.filter(|_| !method.starts_with("notifications/")) else {
        debug!("Accepted notification {}", method);
        return Ok(StatusCode::ACCEPTED.into_response());
    };

    let response = match server.dispatch(method, params).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => {
            warn!("{} failed: {}", method, error);
            JsonRpcResponse::failure(id, error)
        }
    };
    Ok(rpc_reply(&response, StatusCode::OK, stream))
}

async fn handle_terminate(
    session: Option<String>,
    server: ToolServer,
) -> std::result::Result<Response, Infallible> {
    let Some(session) = session else {
        return Ok(StatusCode::BAD_REQUEST.into_response());
    };

    if server.sessions.write().await.remove(&session) {
        info!("Closed session {}", session);
        Ok(StatusCode::OK.into_response())
    } else {
        Ok(StatusCode::NOT_FOUND.into_response())
    }
}

/// JSON body, or a single `message` event when streaming
fn rpc_reply(response: &JsonRpcResponse, status: StatusCode, stream: bool) -> Response {
    if !stream {
        return warp::reply::with_status(warp::reply::json(response), status).into_response();
    }

    let payload = match serde_json::to_string(response) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to serialize JSON-RPC response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut reply = Response::new(format!("event: message\ndata: {}\n\n", payload).into());
    *reply.status_mut() = status;
    reply
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    reply
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    reply
}
