use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Methods `/api/chat` accepts, as advertised in `Allow` and the CORS
/// allow-methods header.
pub const ALLOWED_METHODS: &str = "POST, OPTIONS";

/// Everything that can go wrong while relaying one request. Each variant
/// maps to a status code and a JSON body; nothing escapes to the transport
/// layer unmapped.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The caller sent a malformed or empty payload.
    #[error("{0}")]
    Validation(String),

    /// The caller's origin is not granted under the configured policy.
    #[error("{0}")]
    Forbidden(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    /// The upstream call failed: network failure, non-2xx response, or a
    /// response shape we could not use. Carries the provider's detail when
    /// one was reported.
    #[error("upstream completion request failed: {0}")]
    Upstream(String),

    /// Unexpected relay fault. Detail is logged, never sent to the caller.
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let method_not_allowed = matches!(self, RelayError::MethodNotAllowed);

        let (status, body) = match self {
            RelayError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: reason,
                    details: None,
                },
            ),
            RelayError::Forbidden(reason) => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    error: reason,
                    details: None,
                },
            ),
            RelayError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorBody {
                    error: "method not allowed".to_string(),
                    details: Some(format!("allowed methods: {ALLOWED_METHODS}")),
                },
            ),
            RelayError::Upstream(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "upstream completion request failed".to_string(),
                    details: Some(detail),
                },
            ),
            RelayError::Internal(detail) => {
                error!("internal relay error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "internal server error".to_string(),
                        details: None,
                    },
                )
            }
        };

        let mut response = (status, Json(body)).into_response();
        if method_not_allowed {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }
        response
    }
}
