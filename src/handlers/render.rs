use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use std::sync::Arc;

use super::{RATE_LIMIT_MESSAGE, admit, respond};
use crate::error::DiagramError;
use crate::metrics::REQUEST_TOTAL;
use crate::models::{ErrorResponse, RenderResponse, parse_code};
use crate::sanitize::sanitize_svg;
use crate::state::AppState;

fn error_body(message: impl Into<String>) -> ErrorResponse {
    ErrorResponse {
        error: message.into(),
    }
}

// POST /api/render -> {svg}
pub async fn render_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    REQUEST_TOTAL.with_label_values(&["http", "render"]).inc();

    let ip = match admit(&state, &headers, || error_body(RATE_LIMIT_MESSAGE)) {
        Ok(ip) => ip,
        Err(denied) => return denied,
    };

    let code = match parse_code(&body) {
        Ok(code) => code,
        Err(message) => return respond(&state, &ip, StatusCode::BAD_REQUEST, &error_body(message)),
    };

    let result = match state.diagrams.render(&code).await {
        Ok(raw) => sanitize_svg(&raw).map_err(DiagramError::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(svg) => respond(&state, &ip, StatusCode::OK, &RenderResponse { svg }),
        Err(e) if e.is_client_error() => {
            respond(&state, &ip, StatusCode::BAD_REQUEST, &error_body(e.public_message()))
        }
        Err(e) => {
            log::error!("Render endpoint error: {}", e);
            respond(
                &state,
                &ip,
                StatusCode::INTERNAL_SERVER_ERROR,
                &error_body(e.public_message()),
            )
        }
    }
}
