use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::{RelayError, ALLOWED_METHODS};
use crate::RelayState;

/// Route middleware guarding `/api/chat`.
///
/// `OPTIONS` is always answered as a CORS preflight (204, no body). Any
/// other method besides `POST` is refused outright. A `POST` proceeds only
/// if the configured policy grants the request's origin; the grant is then
/// stamped onto whatever response comes back, success or error, so browser
/// callers can read error bodies too.
pub async fn origin_gate(
    State(state): State<RelayState>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let grant = state.config.cors.grant(origin.as_deref());

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else if request.method() != Method::POST {
        RelayError::MethodNotAllowed.into_response()
    } else if grant.is_none() {
        warn!(
            origin = origin.as_deref().unwrap_or("<none>"),
            "refusing request from ungranted origin"
        );
        RelayError::Forbidden("origin not allowed".to_string()).into_response()
    } else {
        next.run(request).await
    };

    if let Some(value) = grant.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
    }

    response
}
