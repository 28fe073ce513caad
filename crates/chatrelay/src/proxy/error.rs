//! Error handling for the chat relay endpoint
//!
//! Everything here happens before the first frame is sent. Once streaming
//! has started, failures travel through the body as a
//! [`TranscodeError`](crate::transcode::TranscodeError) instead.
//!
//! - Validation errors: 400 with every issue listed
//! - Upstream rejections: passed through with the provider's status
//! - Network errors: 502 Bad Gateway
//! - Anything else: 500

use axum::{
    body::Body,
    http::{Response, StatusCode, header},
    response::IntoResponse,
};
use thiserror::Error;

use super::request::ValidationIssue;

/// Errors that can occur while setting up a relayed chat stream
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    /// Request body failed parsing or validation
    #[error("Invalid request: {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    /// Upstream provider answered with a non-success status
    #[error("Upstream error: {status}")]
    Upstream { status: StatusCode, body: String },

    /// Network-level error (connection, timeout, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// Internal failure while building the response
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status returned to the client
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Validation(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::Network(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ProxyError::Validation(_) => "validation",
            ProxyError::Upstream { .. } => "upstream",
            ProxyError::Network(_) => "network",
            ProxyError::Internal(_) => "internal",
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            ProxyError::Validation(issues) => serde_json::json!({
                "error": "Invalid request",
                "details": issues,
            }),
            ProxyError::Upstream { status, body } => serde_json::json!({
                "error": "Upstream error",
                "status": status.as_u16(),
                "message": body,
            }),
            ProxyError::Network(message) => serde_json::json!({
                "error": "Upstream unreachable",
                "message": message,
            }),
            ProxyError::Internal(message) => serde_json::json!({
                "error": "Failed to process request",
                "message": message,
            }),
        }
    }

    /// Log the error at a level matching its category
    pub fn log(&self) {
        match self {
            ProxyError::Validation(issues) => tracing::warn!(
                error_type = self.category(),
                issues = issues.len(),
                "Rejected chat request"
            ),
            ProxyError::Upstream { status, body } => tracing::error!(
                error_type = self.category(),
                status = %status,
                body_length = body.len(),
                "Upstream returned error, passing through to client"
            ),
            _ => tracing::error!(
                error_type = self.category(),
                error_message = %self,
                "Chat request failed"
            ),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response<Body> {
        Response::builder()
            .status(self.status())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(self.body().to_string()))
            .unwrap_or_else(|_| {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            })
    }
}
