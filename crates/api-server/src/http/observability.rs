use std::time::Instant;

use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{MatchedPath, RawPathParams, Request};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, field, info, info_span, warn};
use uuid::Uuid;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const SESSION_ID_PARAM: &str = "session_id";
const MAX_CLIENT_REQUEST_ID_LEN: usize = 64;

/// Wraps every request in an `http_request` span carrying the request id and,
/// on session routes, the session id. Handler logs inherit both.
pub(super) async fn request_observability_middleware(
    path_params: Result<RawPathParams, RawPathParamsRejection>,
    req: Request,
    next: Next,
) -> Response {
    let request_id =
        client_request_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let span = info_span!(
        "http_request",
        request_id = %request_id,
        method = %req.method(),
        route = %route,
        session_id = field::Empty,
    );
    if let Some(session_id) = path_params.ok().as_ref().and_then(session_id_param) {
        span.record(SESSION_ID_PARAM, session_id);
    }

    let started_at = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status();
    let latency_ms = started_at.elapsed().as_millis() as u64;
    span.in_scope(|| {
        if status.is_server_error() {
            warn!(status = status.as_u16(), latency_ms, "request failed");
        } else {
            info!(status = status.as_u16(), latency_ms, "request completed");
        }
    });

    response
}

fn session_id_param(params: &RawPathParams) -> Option<&str> {
    params
        .iter()
        .find(|(name, _)| *name == SESSION_ID_PARAM)
        .map(|(_, value)| value)
}

/// The widget may tag its calls with its own id. Anything that is not short
/// visible ASCII is replaced by a generated UUID.
fn client_request_id(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(&REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let usable = !raw.is_empty()
        && raw.len() <= MAX_CLIENT_REQUEST_ID_LEN
        && raw.bytes().all(|byte| byte.is_ascii_graphic());
    usable.then(|| raw.to_string())
}
