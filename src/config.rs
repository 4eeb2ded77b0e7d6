use clap::{Parser, Subcommand};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "mermaid-gateway")]
#[command(about = "Mermaid verification, rendering and SVG export over HTTP and MCP")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    // Render backends (comma-separated)
    // Example: "localhost:8000,render-2:8000"
    #[arg(short, long, env = "RENDER_BACKENDS", default_value = "http://localhost:8000")]
    pub backends: String,

    // Rate limit max requests per window
    #[arg(long, env = "RATE_LIMIT", default_value_t = 100)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_WINDOW", default_value_t = 3600)]
    pub rate_window: u64,

    // How often expired rate limit entries are swept, in seconds
    #[arg(long, default_value_t = 300)]
    pub sweep_interval: u64,

    // Backend health check interval in seconds
    #[arg(long, default_value_t = 30)]
    pub health_interval: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the JSON HTTP API
    Serve {
        #[arg(short, long, env = "PORT", default_value_t = 3000)]
        port: u16,
    },
    /// Run the MCP tool server on stdio
    Mcp {
        // Port of the auxiliary health endpoint
        #[arg(long, env = "HEALTH_PORT", default_value_t = 8080)]
        health_port: u16,
    },
}
