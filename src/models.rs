use rmcp::schemars;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Body of every diagram request, HTTP and MCP alike
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CodeRequest {
    /// Mermaid diagram code
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub svg: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Pull `code` out of a raw JSON body, with a caller-facing message on failure.
///
/// Absent, `null`, `false`, `0` and `""` all count as missing.
pub fn parse_code(body: &[u8]) -> Result<String, &'static str> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| "Invalid JSON in request body")?;

    let Value::Object(mut map) = value else {
        return Err("Request body must be an object");
    };

    match map.remove("code") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Err("Missing required field: code"),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Err("Missing required field: code"),
        Some(Value::String(code)) if code.is_empty() => Err("Missing required field: code"),
        Some(Value::String(code)) => Ok(code),
        Some(_) => Err("Field \"code\" must be a string"),
    }
}
