mod health;
mod metrics;
mod render;
mod verify;

pub use health::{health_handler, health_router};
pub use metrics::metrics_handler;
pub use render::render_handler;
pub use verify::verify_handler;

use axum::{
    Json, Router,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{SecondsFormat, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::{RATE_LIMIT_ENTRIES, RATE_LIMITED};
use crate::rate_limit::client_ip;
use crate::state::AppState;

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
];

/// Routes of the JSON API.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/verify", post(verify_handler))
        .route("/api/render", post(render_handler))
        .route("/health", get(|| health_handler("mermaid-http-api")))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

/// Run the limiter for this request, returns the client identifier when allowed
/// and a finished 429 otherwise.
pub(crate) fn admit<T: Serialize>(
    state: &AppState,
    headers: &HeaderMap,
    denied_body: impl FnOnce() -> T,
) -> Result<String, Response> {
    let ip = client_ip(headers);
    let allowed = state.rate_limiter.check(&ip);
    RATE_LIMIT_ENTRIES.set(state.rate_limiter.len() as f64);

    if allowed {
        return Ok(ip);
    }

    RATE_LIMITED.with_label_values(&["http"]).inc();
    log::warn!("Rate limit exceeded for {}", ip);

    let reset = state.rate_limiter.reset_time(&ip);
    let reset_at = Utc::now() + TimeDelta::milliseconds(reset.as_millis() as i64);
    let retry_after = reset.as_millis().div_ceil(1000);

    let mut out = HeaderMap::new();
    set_header(&mut out, "x-ratelimit-remaining", "0");
    set_header(
        &mut out,
        "x-ratelimit-reset",
        &reset_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    set_header(&mut out, "retry-after", &retry_after.to_string());

    Err((StatusCode::TOO_MANY_REQUESTS, out, Json(denied_body())).into_response())
}

/// JSON response with the quota and security headers attached.
pub(crate) fn respond<T: Serialize>(
    state: &AppState,
    ip: &str,
    status: StatusCode,
    body: &T,
) -> Response {
    let mut headers = HeaderMap::new();
    set_header(
        &mut headers,
        "x-ratelimit-remaining",
        &state.rate_limiter.remaining(ip).to_string(),
    );
    for &(name, value) in SECURITY_HEADERS {
        set_header(&mut headers, name, value);
    }
    (status, headers, Json(body)).into_response()
}
