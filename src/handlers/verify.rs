use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde_json::json;
use std::sync::Arc;

use super::{RATE_LIMIT_MESSAGE, admit, respond};
use crate::error::GENERIC_ERROR;
use crate::metrics::REQUEST_TOTAL;
use crate::models::parse_code;
use crate::state::AppState;

// POST /api/verify -> {ok: true} | {ok: false, error}
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    REQUEST_TOTAL.with_label_values(&["http", "verify"]).inc();

    let ip = match admit(&state, &headers, || json!({ "ok": false, "error": RATE_LIMIT_MESSAGE })) {
        Ok(ip) => ip,
        Err(denied) => return denied,
    };

    let code = match parse_code(&body) {
        Ok(code) => code,
        Err(message) => {
            return respond(&state, &ip, StatusCode::BAD_REQUEST, &json!({ "ok": false, "error": message }));
        }
    };

    match state.diagrams.verify(&code).await {
        Ok(result) => {
            let status = if result.is_ok() {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            respond(&state, &ip, status, &result)
        }
        Err(e) => {
            log::error!("Verify endpoint error: {}", e);
            respond(
                &state,
                &ip,
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "ok": false, "error": GENERIC_ERROR }),
            )
        }
    }
}
