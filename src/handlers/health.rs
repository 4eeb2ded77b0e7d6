use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

// health handler
pub async fn health_handler(service: &'static str) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": service,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Standalone liveness server: `/` and `/health` answer, everything else is 404.
pub fn health_router(service: &'static str) -> Router {
    Router::new()
        .route("/", get(move || health_handler(service)))
        .route("/health", get(move || health_handler(service)))
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not Found") })
}
