//! One-time upstream session handshake
//!
//! The session token is obtained from the `initialize` exchange and cached
//! for the lifetime of the [`SessionManager`]. Each handshake attempt runs
//! under a lock and re-checks the cache first, so concurrent callers that
//! find it empty wait for the in-flight attempt instead of starting their own.
//! Retry delays are spent outside the lock.

use crate::error::{ClientError, Result};
use crate::normalize::{decode_body, ReplyShape};
use crate::retry::{retry, RetryPolicy};
use crate::transport::HttpTransport;
use crate::ClientConfig;
use restmcp_types::{JsonRpcNotification, JsonRpcRequest};
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

/// Opaque session identifier issued by the upstream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct SessionManager {
    transport: Arc<HttpTransport>,
    client_name: String,
    client_version: String,
    protocol_version: String,
    startup_retry: RetryPolicy,
    token: OnceCell<SessionToken>,
    handshake_lock: Mutex<()>,
    handshakes: AtomicUsize,
}

impl SessionManager {
    pub fn new(transport: Arc<HttpTransport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            client_name: config.client_name.clone(),
            client_version: config.client_version.clone(),
            protocol_version: config.protocol_version.clone(),
            startup_retry: config.handshake_retry.clone(),
            token: OnceCell::new(),
            handshake_lock: Mutex::new(()),
            handshakes: AtomicUsize::new(0),
        }
    }

    /// Startup handshake, retried per the configured policy
    pub async fn establish(&self) -> Result<SessionToken> {
        let policy = self.startup_retry.clone();
        self.ensure_with(&policy).await
    }

    /// Cached token, or a single handshake attempt while the cache is empty
    pub async fn ensure_session(&self) -> Result<SessionToken> {
        self.ensure_with(&RetryPolicy::once()).await
    }

    /// True once a token is cached. Never waits on an in-flight handshake.
    pub fn is_ready(&self) -> bool {
        self.token.initialized()
    }

    /// Number of handshakes that produced a token
    pub fn handshake_count(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    async fn ensure_with(&self, policy: &RetryPolicy) -> Result<SessionToken> {
        if let Some(token) = self.token.get() {
            return Ok(token.clone());
        }

        retry(policy, "Session handshake", |_| self.attempt()).await
    }

    async fn attempt(&self) -> Result<SessionToken> {
        let _guard = self.handshake_lock.lock().await;
        if let Some(token) = self.token.get() {
            return Ok(token.clone());
        }

        let token = self.handshake().await?;
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        info!("Upstream session established with {}", self.transport.endpoint());
        let _ = self.token.set(token.clone());
        Ok(token)
    }

    async fn handshake(&self) -> Result<SessionToken> {
        debug!("Sending initialize to {}", self.transport.endpoint());

        let request = JsonRpcRequest::new(
            "initialize",
            "initialize",
            Some(json!({
                "protocolVersion": self.protocol_version,
                "capabilities": {},
                "clientInfo": {
                    "name": self.client_name,
                    "version": self.client_version,
                }
            })),
        );

        let response = self
            .transport
            .post(&request, None)
            .await
            .map_err(|e| ClientError::handshake(e.to_string()))?;

        let reply = decode_body(response.content_type.as_deref(), &response.body)
            .map_err(|e| ClientError::handshake(e.to_string()))?;
        if let ReplyShape::Failed(error) = ReplyShape::classify(reply) {
            return Err(ClientError::handshake(error.to_string()));
        }

        let token = response
            .session_id
            .map(SessionToken::new)
            .ok_or_else(|| ClientError::handshake("upstream did not return a session id"))?;

        self.transport
            .post(&JsonRpcNotification::new("notifications/initialized"), Some(&token))
            .await
            .map_err(|e| ClientError::handshake(e.to_string()))?;

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;
    use warp::{Filter, Reply};

    /// Minimal upstream: issues "sess-1" on initialize, accepts everything else
    fn spawn_upstream(issue_session: bool) -> (SocketAddr, Arc<AtomicUsize>) {
        let initializes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&initializes);

        let route = warp::post()
            .and(warp::body::json())
            .map(move |body: serde_json::Value| {
                if body["method"] == "initialize" {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let reply = warp::reply::json(&json!({
                        "jsonrpc": "2.0",
                        "id": body["id"],
                        "result": {"protocolVersion": "2024-11-05", "capabilities": {}}
                    }));
                    if issue_session {
                        warp::reply::with_header(reply, "mcp-session-id", "sess-1").into_response()
                    } else {
                        reply.into_response()
                    }
                } else {
                    warp::reply::with_status(warp::reply(), warp::http::StatusCode::ACCEPTED)
                        .into_response()
                }
            });

        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        (addr, initializes)
    }

    fn spawn_unavailable_upstream() -> SocketAddr {
        let route = warp::post().map(|| {
            warp::reply::with_status("starting", warp::http::StatusCode::SERVICE_UNAVAILABLE)
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    fn manager(addr: SocketAddr, retry: RetryPolicy) -> SessionManager {
        let config = ClientConfig::new(format!("http://{}/mcp", addr)).with_handshake_retry(retry);
        let transport = Arc::new(HttpTransport::new(&config).unwrap());
        SessionManager::new(transport, &config)
    }

    #[tokio::test]
    async fn test_handshake_caches_token() {
        let (addr, initializes) = spawn_upstream(true);
        let sessions = manager(addr, RetryPolicy::once());

        assert!(!sessions.is_ready());
        let first = sessions.ensure_session().await.unwrap();
        let second = sessions.ensure_session().await.unwrap();

        assert_eq!(first.as_str(), "sess-1");
        assert_eq!(first, second);
        assert!(sessions.is_ready());
        assert_eq!(sessions.handshake_count(), 1);
        assert_eq!(initializes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_handshake() {
        let (addr, initializes) = spawn_upstream(true);
        let sessions = Arc::new(manager(addr, RetryPolicy::once()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let sessions = Arc::clone(&sessions);
            handles.push(tokio::spawn(async move { sessions.ensure_session().await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(sessions.handshake_count(), 1);
        assert_eq!(initializes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_session_header_fails() {
        let (addr, _) = spawn_upstream(false);
        let sessions = manager(addr, RetryPolicy::once());

        let result = sessions.ensure_session().await;
        assert!(matches!(result, Err(ClientError::Handshake(_))));
        assert!(!sessions.is_ready());
    }

    #[tokio::test]
    async fn test_establish_retries_then_gives_up() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let addr: SocketAddr = ([127, 0, 0, 1], port).into();
        let sessions = manager(addr, RetryPolicy::fixed(3, Duration::from_millis(5)));

        let result = sessions.establish().await;
        assert!(matches!(result, Err(ClientError::Handshake(_))));
        assert_eq!(sessions.handshake_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ready_while_callers_reuse_session() {
        let (addr, _) = spawn_upstream(true);
        let sessions = Arc::new(manager(addr, RetryPolicy::once()));
        sessions.ensure_session().await.unwrap();

        let mut callers = Vec::new();
        for _ in 0..3 {
            let sessions = Arc::clone(&sessions);
            callers.push(tokio::spawn(async move {
                for _ in 0..20_000 {
                    sessions.ensure_session().await.unwrap();
                }
            }));
        }

        let mut not_ready = 0;
        for _ in 0..50_000 {
            if !sessions.is_ready() {
                not_ready += 1;
            }
        }
        for caller in callers {
            caller.await.unwrap();
        }

        assert_eq!(not_ready, 0);
        assert_eq!(sessions.handshake_count(), 1);
    }

    #[tokio::test]
    async fn test_request_not_blocked_by_startup_retries() {
        let addr = spawn_unavailable_upstream();
        let sessions = Arc::new(manager(addr, RetryPolicy::fixed(10, Duration::from_millis(300))));

        let startup = {
            let sessions = Arc::clone(&sessions);
            tokio::spawn(async move { sessions.establish().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        let result = sessions.ensure_session().await;
        let waited = started.elapsed();

        assert!(matches!(result, Err(ClientError::Handshake(_))));
        assert!(waited < Duration::from_secs(1), "request waited {:?}", waited);
        assert!(!sessions.is_ready());
        startup.abort();
    }
}
