//! HTTP surface: validate each request body, then forward or reject

use crate::error::GateError;
use crate::proxy::Proxy;
use crate::state::SharedState;
use crate::validator::Verdict;
use axum::{
    extract::{Request, State},
    response::Response,
    routing::any,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Router sending every path and method through the anti-replay guard
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", any(anti_replay_guard))
        .route("/*path", any(anti_replay_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn anti_replay_guard(
    State(state): State<SharedState>,
    req: Request,
) -> Result<Response, GateError> {
    let (parts, body) = req.into_parts();

    let span = tracing::info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %parts.method,
        path = %parts.uri.path()
    );

    async move {
        let body_bytes = axum::body::to_bytes(body, state.max_body_bytes)
            .await
            .map_err(|e| {
                let error_msg = e.to_string();
                if error_msg.contains("length limit") || error_msg.contains("too large") {
                    warn!(
                        policy_decision = "deny",
                        reason = "payload_too_large",
                        body_size_limit = state.max_body_bytes,
                        "Request denied: body exceeds size limit"
                    );
                    GateError::PayloadTooLarge(state.max_body_bytes)
                } else {
                    GateError::InternalError(format!("Failed to read request body: {}", e))
                }
            })?;

        if let Verdict::Reject(reason) = state.validator.validate(&body_bytes) {
            warn!(
                policy_decision = "deny",
                reason = %reason,
                status = reason.status_code(),
                "Request denied by anti-replay check"
            );
            return Err(GateError::from(reason));
        }

        info!("Request validated, forwarding to upstream");

        let response = state
            .proxy
            .forward(&parts, body_bytes, &state.upstream_url)
            .await
            .map_err(|e| {
                error!(
                    proxy_error = %e,
                    upstream_url = %state.upstream_url,
                    "Failed to forward request to upstream"
                );
                e
            })?;

        info!(
            upstream_status = response.status().as_u16(),
            "Request forwarded successfully"
        );
        Ok::<Response, GateError>(response)
    }
    .instrument(span)
    .await
}
