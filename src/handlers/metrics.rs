use axum::response::IntoResponse;

pub async fn metrics_handler() -> impl IntoResponse {
    crate::metrics::render_metrics()
}
