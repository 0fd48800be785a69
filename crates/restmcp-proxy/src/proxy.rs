//! REST front end: `{method, params}` in, `{"result": ...}` out

use crate::auth::BearerAuth;
use crate::error::{ProxyError, Result};
use crate::ProxyConfig;
use restmcp_client::{ClientConfig, Upstream, UpstreamClient};
use restmcp_types::ProxyRequest;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

#[derive(Clone)]
pub struct RestProxy {
    upstream: Arc<dyn Upstream>,
    auth: Arc<BearerAuth>,
    config: Arc<ProxyConfig>,
}

impl RestProxy {
    pub fn new(upstream: Arc<dyn Upstream>, config: ProxyConfig) -> Self {
        Self {
            upstream,
            auth: Arc::new(BearerAuth::from_option(config.auth_token.clone())),
            config: Arc::new(config),
        }
    }

    /// Proxy backed by a real [`UpstreamClient`]
    pub fn connect(client: ClientConfig, config: ProxyConfig) -> Result<Self> {
        let upstream = UpstreamClient::new(client)?;
        Ok(Self::new(Arc::new(upstream), config))
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn upstream(&self) -> &Arc<dyn Upstream> {
        &self.upstream
    }

    /// Startup handshake. Failure is logged and the proxy keeps serving;
    /// requests then retry the handshake one attempt at a time.
    pub async fn startup(&self) -> bool {
        if !self.config.startup_handshake {
            info!("Startup handshake disabled, session will be opened by the first request");
            return false;
        }

        info!("Opening upstream session with {}", self.upstream.endpoint());
        match self.upstream.establish_session().await {
            Ok(_) => {
                info!("Upstream session ready");
                true
            }
            Err(e) => {
                error!(
                    "Could not open a session with {} after retrying: {}",
                    self.upstream.endpoint(),
                    e
                );
                false
            }
        }
    }

    /// Authorize, validate, forward and normalize one REST request
    pub async fn handle(&self, authorization: Option<&str>, body: &[u8]) -> Result<Value> {
        self.auth.authorize(authorization)?;

        let request: ProxyRequest = serde_json::from_slice(body).map_err(|e| {
            warn!("Rejecting unparseable request body: {}", e);
            ProxyError::InvalidBody(e.to_string())
        })?;
        let call = request.into_call().map_err(|e| {
            warn!("Rejecting request: {}", e);
            ProxyError::from(e)
        })?;

        debug!("Proxying '{}' with arguments {:?}", call.name, call.arguments);
        self.upstream.call(&call).await.map_err(|e| {
            let err = ProxyError::from(e);
            error!(
                "'{}' with arguments {} via {} failed with status {}: {}",
                call.name,
                serde_json::Value::Object(call.arguments.clone()),
                self.upstream.endpoint(),
                err.status().as_u16(),
                err
            );
            err
        })
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone + Send + Sync + 'static {
        let proxy = self.clone();
        let with_proxy = warp::any().map(move || proxy.clone());

        let forward = warp::path("rest-mcp")
            .or(warp::path("mcp-proxy"))
            .unify()
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::header::optional::<String>("authorization"))
            .and(warp::body::bytes())
            .and(with_proxy.clone())
            .and_then(handle_forward);

        let health = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_proxy)
            .map(|proxy: RestProxy| {
                let session = if proxy.upstream.session_ready() {
                    "ready"
                } else {
                    "pending"
                };
                warp::reply::json(&json!({"status": "ok", "session": session}))
            });

        let cors = warp::cors()
            .allow_any_origin()
            .allow_methods(vec!["GET", "POST", "OPTIONS"])
            .allow_headers(vec!["content-type", "authorization"]);

        forward.or(health).with(cors).recover(handle_rejection)
    }

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
            .map_err(|e| ProxyError::Bind {
                addr: addr.to_string(),
                reason: e.to_string(),
            })
    }

    /// Serve on the configured address while the startup handshake runs
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (addr, server) = self.bind(self.config.listen_addr, shutdown)?;
        info!(
            "REST proxy listening on http://{} (POST /rest-mcp, /mcp-proxy) -> {}",
            addr,
            self.upstream.endpoint()
        );
        if self.auth.is_enabled() {
            info!("Bearer token required on inbound requests");
        }

        tokio::join!(server, self.startup());
        info!("REST proxy stopped");
        Ok(())
    }
}

async fn handle_forward(
    authorization: Option<String>,
    body: Bytes,
    proxy: RestProxy,
) -> std::result::Result<Response, Infallible> {
    match proxy.handle(authorization.as_deref(), &body).await {
        Ok(result) => Ok(warp::reply::json(&json!({ "result": result })).into_response()),
        Err(e) => Ok(error_reply(&e)),
    }
}

fn error_reply(err: &ProxyError) -> Response {
    warp::reply::with_status(warp::reply::json(&err.to_body()), err.status()).into_response()
}

async fn handle_rejection(rejection: Rejection) -> std::result::Result<Response, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(forbidden) = rejection.find::<warp::cors::CorsForbidden>() {
        (StatusCode::FORBIDDEN, forbidden.to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        warn!("Unhandled rejection: {:?}", rejection);
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };

    Ok(warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
        .into_response())
}
