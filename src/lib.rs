pub mod config;
pub mod diagram;
pub mod error;
pub mod handlers;
pub mod load_balancer;
pub mod mcp;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod sanitize;
pub mod state;
