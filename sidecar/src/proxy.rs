use axum::{
    body::{Body, Bytes},
    http::{request::Parts, HeaderValue, Response, StatusCode},
};
use crate::error::GateError;
use reqwest::Client;

/// Request headers not copied to the upstream
const SKIPPED_REQUEST_HEADERS: [&str; 4] = ["host", "connection", "transfer-encoding", "content-length"];

/// Response headers not relayed back; the body is re-framed locally
const SKIPPED_RESPONSE_HEADERS: [&str; 3] = ["connection", "transfer-encoding", "content-length"];

/// Forwarding seam between the gate and the upstream
///
/// Accepts pre-read request parts and body bytes, since the gate must buffer
/// the body to validate it.
#[allow(async_fn_in_trait)]
pub trait Proxy: Send + Sync {
    async fn forward(
        &self,
        parts: &Parts,
        body_bytes: Bytes,
        upstream_url: &str,
    ) -> Result<Response<Body>, GateError>;
}

/// reqwest-based HTTP proxy implementation
pub struct HttpProxy {
    client: Client,
}

impl HttpProxy {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl Proxy for HttpProxy {
    async fn forward(
        &self,
        parts: &Parts,
        body_bytes: Bytes,
        upstream_url: &str,
    ) -> Result<Response<Body>, GateError> {
        let path = parts.uri.path();
        let upstream_uri = match parts.uri.query() {
            Some(query) if !query.is_empty() => format!("{}{}?{}", upstream_url, path, query),
            _ => format!("{}{}", upstream_url, path),
        };

        // axum and reqwest sit on different `http` major versions
        let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
            .map_err(|e| GateError::ProxyError(format!("Unsupported HTTP method: {}", e)))?;

        let mut upstream_req = self.client.request(method, &upstream_uri).body(body_bytes);

        for (name, value) in &parts.headers {
            if SKIPPED_REQUEST_HEADERS.contains(&name.as_str()) {
                continue;
            }
            upstream_req = upstream_req.header(name.as_str(), value.as_bytes());
        }

        let response = upstream_req
            .send()
            .await
            .map_err(|e| GateError::ProxyError(format!("Upstream request failed: {}", e)))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|_| GateError::ProxyError("Invalid status code from upstream".to_string()))?;

        let mut relayed = Response::builder().status(status);
        for (name, value) in response.headers() {
            if SKIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
                continue;
            }
            relayed = relayed.header(
                name.as_str(),
                HeaderValue::from_bytes(value.as_bytes())
                    .map_err(|e| GateError::ProxyError(format!("Invalid header value: {}", e)))?,
            );
        }

        let body_bytes = response
            .bytes()
            .await
            .map_err(|e| GateError::ProxyError(format!("Failed to read response body: {}", e)))?;

        relayed
            .body(Body::from(body_bytes))
            .map_err(|e| GateError::ProxyError(format!("Failed to build response: {}", e)))
    }
}
