use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::diagram::{DiagramService, ExportResult};
use crate::error::DiagramError;
use crate::handlers::RATE_LIMIT_MESSAGE;
use crate::metrics::{RATE_LIMIT_ENTRIES, RATE_LIMITED, REQUEST_TOTAL};
use crate::models::{CodeRequest, RenderResponse};
use crate::rate_limit::RateLimiter;
use crate::sanitize::sanitize_svg;

/// Rate limit key for the single stdio peer.
pub const STDIO_IDENTIFIER: &str = "stdio";

const INSTRUCTIONS: &str = "Mermaid diagram tools. Use `verify` to check syntax, `render` to get \
sanitized SVG for inline display, and `svg` to get a downloadable SVG with a suggested filename.";

fn json_text<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("Serialization error: {}", e))
}

fn success<T: Serialize>(value: &T) -> CallToolResult {
    CallToolResult::success(vec![Content::text(json_text(value))])
}

fn error_result(body: serde_json::Value) -> CallToolResult {
    CallToolResult::error(vec![Content::text(json_text(&body))])
}

fn failure(operation: &str, err: &DiagramError) -> CallToolResult {
    if !err.is_client_error() {
        log::error!("MCP {} tool error: {}", operation, err);
    }
    error_result(json!({ "error": err.public_message() }))
}

// --- Server ---

#[derive(Clone)]
pub struct DiagramServer {
    diagrams: Arc<DiagramService>,
    rate_limiter: Arc<RateLimiter>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DiagramServer {
    pub fn new(diagrams: Arc<DiagramService>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            diagrams,
            rate_limiter,
            tool_router: Self::tool_router(),
        }
    }

    // Rate limit and argument check shared by every tool; Some(..) is the rejection
    fn gate(&self, operation: &str, code: &str) -> Option<CallToolResult> {
        REQUEST_TOTAL.with_label_values(&["mcp", operation]).inc();

        let allowed = self.rate_limiter.check(STDIO_IDENTIFIER);
        RATE_LIMIT_ENTRIES.set(self.rate_limiter.len() as f64);
        if !allowed {
            RATE_LIMITED.with_label_values(&["mcp"]).inc();
            let retry_after = self
                .rate_limiter
                .reset_time(STDIO_IDENTIFIER)
                .as_millis()
                .div_ceil(1000);
            return Some(error_result(json!({
                "error": RATE_LIMIT_MESSAGE,
                "remaining": 0,
                "retryAfter": retry_after as u64,
            })));
        }

        if code.is_empty() {
            return Some(error_result(
                json!({ "error": "Missing or invalid required parameter: code" }),
            ));
        }
        None
    }

    #[tool(
        description = "Verify Mermaid diagram syntax without rendering. Returns {ok: true} if valid, {ok: false, error: string} if invalid."
    )]
    async fn verify(
        &self,
        Parameters(req): Parameters<CodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(rejected) = self.gate("verify", &req.code) {
            return Ok(rejected);
        }

        match self.diagrams.verify(&req.code).await {
            Ok(result) => Ok(success(&result)),
            Err(e) => Ok(failure("verify", &e)),
        }
    }

    #[tool(
        description = "Render Mermaid diagram to SVG for inline display. Returns {svg: string} with sanitized SVG content."
    )]
    async fn render(
        &self,
        Parameters(req): Parameters<CodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(rejected) = self.gate("render", &req.code) {
            return Ok(rejected);
        }

        let result = match self.diagrams.render(&req.code).await {
            Ok(raw) => sanitize_svg(&raw).map_err(DiagramError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(svg) => Ok(success(&RenderResponse { svg })),
            Err(e) => Ok(failure("render", &e)),
        }
    }

    #[tool(
        description = "Generate downloadable SVG export of Mermaid diagram. Returns {svg: string, filename: string}."
    )]
    async fn svg(
        &self,
        Parameters(req): Parameters<CodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(rejected) = self.gate("svg", &req.code) {
            return Ok(rejected);
        }

        let result = match self.diagrams.export_svg(&req.code).await {
            Ok(export) => sanitize_svg(&export.svg)
                .map(|svg| ExportResult {
                    svg,
                    filename: export.filename,
                })
                .map_err(DiagramError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(export) => Ok(success(&export)),
            Err(e) => Ok(failure("svg", &e)),
        }
    }
}

#[tool_handler]
impl ServerHandler for DiagramServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
