use std::sync::Arc;

use crate::diagram::DiagramService;
use crate::rate_limit::RateLimiter;

// app's shared state, built once in main and handed to every handler
pub struct AppState {
    pub diagrams: Arc<DiagramService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(diagrams: Arc<DiagramService>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            diagrams,
            rate_limiter,
        }
    }
}
