//! Renders a `StatusError` as the tenant node's HTTP error envelope:
//! `{code, message, ...extras}` with the status carried on
//! `StatusError::http_status`. The message is always passed
//! through [`crate::error_sanitization::sanitize_message`] before it
//! reaches the wire.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use opr_core::StatusError;

use crate::error_sanitization::sanitize_message;

/// Wraps a [`StatusError`] so axum handlers can return it directly via
/// `Result<Json<_>, TenantError>`.
#[derive(Debug)]
pub struct TenantError(pub StatusError);

impl From<StatusError> for TenantError {
    fn from(e: StatusError) -> Self {
        Self(e)
    }
}

impl IntoResponse for TenantError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut envelope = self.0.to_envelope();
        if let Some(object) = envelope.as_object_mut() {
            if let Some(message) = object.get("message").and_then(|v| v.as_str()).map(sanitize_message) {
                object.insert("message".to_string(), serde_json::Value::String(message));
            }
        }
        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn status_code_comes_from_status_error() {
        let err = TenantError(StatusError::forbidden("AUTH_ERROR_ORG_NOT_AUTHORIZED", "nope"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
