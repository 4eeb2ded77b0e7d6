use clap::Parser;
use rmcp::ServiceExt;
use std::sync::Arc;
use std::time::Duration;

use mermaid_gateway::config::{Args, Command};
use mermaid_gateway::diagram::{DiagramService, HttpEngine};
use mermaid_gateway::handlers;
use mermaid_gateway::load_balancer::{LoadBalancer, health_checker};
use mermaid_gateway::mcp::DiagramServer;
use mermaid_gateway::rate_limit::RateLimiter;
use mermaid_gateway::state::AppState;

type BoxError = Box<dyn std::error::Error>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // stderr only, stdout belongs to the MCP transport
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let pool = Arc::new(
        LoadBalancer::new(&args.backends).ok_or("At least one render backend required")?,
    );
    let client = reqwest::Client::new();
    tokio::spawn(health_checker(
        Arc::clone(&pool),
        client.clone(),
        Duration::from_secs(args.health_interval),
    ));

    let diagrams = Arc::new(DiagramService::new(Arc::new(HttpEngine::new(client, pool))));

    let rate_limiter = Arc::new(RateLimiter::new(
        args.rate_limit,
        Duration::from_secs(args.rate_window),
    ));
    rate_limiter.spawn_sweeper(Duration::from_secs(args.sweep_interval));
    log::info!(
        "Rate limit: {} requests per {} seconds",
        args.rate_limit,
        args.rate_window
    );

    let result = match args.command {
        Command::Serve { port } => serve_http(port, diagrams, Arc::clone(&rate_limiter)).await,
        Command::Mcp { health_port } => {
            serve_mcp(health_port, diagrams, Arc::clone(&rate_limiter)).await
        }
    };

    rate_limiter.shutdown();
    result
}

async fn serve_http(
    port: u16,
    diagrams: Arc<DiagramService>,
    rate_limiter: Arc<RateLimiter>,
) -> Result<(), BoxError> {
    let state = Arc::new(AppState::new(diagrams, rate_limiter));
    let app = handlers::router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    log::info!("Mermaid HTTP API running on http://localhost:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Could not listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            log::info!("Shutting down");
        })
        .await?;
    Ok(())
}

async fn serve_mcp(
    health_port: u16,
    diagrams: Arc<DiagramService>,
    rate_limiter: Arc<RateLimiter>,
) -> Result<(), BoxError> {
    // liveness endpoint for deployment platforms
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", health_port)).await {
            Ok(listener) => {
                log::info!("Health check server listening on port {}", health_port);
                if let Err(e) =
                    axum::serve(listener, handlers::health_router("mermaid-mcp-server")).await
                {
                    log::error!("Health check server stopped: {}", e);
                }
            }
            Err(e) => log::error!("Health check server failed to bind: {}", e),
        }
    });

    let service = DiagramServer::new(diagrams, rate_limiter)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| log::error!("MCP server error: {}", e))?;
    log::info!("Mermaid MCP server running on stdio");

    service.waiting().await?;
    Ok(())
}
