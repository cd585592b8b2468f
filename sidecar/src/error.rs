use crate::validator::RejectReason;
use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

/// Anti-replay sidecar error types; every request-level variant fails closed
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Malformed request payload")]
    MalformedPayload,

    #[error("Request timestamp outside the replay window")]
    TimestampOutOfWindow,

    #[error("Nonce already used")]
    NonceReplayed,

    #[error("Signature mismatch")]
    SignatureMismatch,

    #[error("Request body too large (limit {0} bytes)")]
    PayloadTooLarge(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Proxy error: {0}")]
    ProxyError(String),
}

impl From<RejectReason> for GateError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::MalformedPayload => GateError::MalformedPayload,
            RejectReason::TimestampOutOfWindow => GateError::TimestampOutOfWindow,
            RejectReason::NonceReplayed => GateError::NonceReplayed,
            RejectReason::SignatureMismatch => GateError::SignatureMismatch,
        }
    }
}

impl From<GateError> for StatusCode {
    fn from(err: GateError) -> Self {
        From::from(&err)
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> axum::response::Response {
        let status: StatusCode = From::from(&self);
        let body = format!("{}", self);
        (status, body).into_response()
    }
}

impl From<&GateError> for StatusCode {
    fn from(err: &GateError) -> Self {
        match err {
            GateError::MalformedPayload => StatusCode::BAD_REQUEST,
            GateError::TimestampOutOfWindow => StatusCode::FORBIDDEN,
            GateError::NonceReplayed => StatusCode::FORBIDDEN,
            GateError::SignatureMismatch => StatusCode::FORBIDDEN,
            GateError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GateError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::ProxyError(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        GateError::ProxyError(format!("HTTP request failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reasons_keep_their_status() {
        for reason in [
            RejectReason::MalformedPayload,
            RejectReason::TimestampOutOfWindow,
            RejectReason::NonceReplayed,
            RejectReason::SignatureMismatch,
        ] {
            let status: StatusCode = GateError::from(reason).into();
            assert_eq!(status.as_u16(), reason.status_code());
        }
    }

    #[test]
    fn test_non_verdict_errors() {
        assert_eq!(StatusCode::from(GateError::PayloadTooLarge(10)), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(StatusCode::from(GateError::ProxyError("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            StatusCode::from(GateError::ConfigError("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
