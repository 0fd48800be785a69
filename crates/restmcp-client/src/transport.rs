use crate::error::{ClientError, Result};
use crate::session::SessionToken;
use crate::ClientConfig;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client,
};
use restmcp_types::{ACCEPT_JSON_AND_SSE, SESSION_HEADER};
use serde::Serialize;
use tracing::debug;

/// What came back from one upstream POST
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub session_id: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

/// JSON-RPC over HTTP POST to a single upstream endpoint
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                ClientError::InvalidHeader(format!("Invalid header name '{}': {}", key, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ClientError::InvalidHeader(format!("Invalid header value for '{}': {}", key, e))
            })?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.server_url.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST a JSON payload, attaching the session header when one is known.
    ///
    /// Non-success statuses become [`ClientError::UpstreamStatus`].
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        session: Option<&SessionToken>,
    ) -> Result<UpstreamResponse> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON_AND_SSE));

        if let Some(session) = session {
            headers.insert(
                SESSION_HEADER,
                HeaderValue::from_str(session.as_str())
                    .map_err(|e| ClientError::InvalidHeader(format!("Invalid session ID: {}", e)))?,
            );
        }

        let body = serde_json::to_string(payload)?;
        debug!("Sending HTTP request to {}: {}", self.endpoint, body);

        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let text = response.text().await?;
        debug!("Received HTTP response (status {}): {}", status, text);

        if !status.is_success() {
            return Err(ClientError::UpstreamStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(UpstreamResponse {
            status: status.as_u16(),
            session_id,
            content_type,
            body: text,
        })
    }
}
