use thiserror::Error;

/// Message returned to callers in place of internal failure detail.
pub const GENERIC_ERROR: &str = "An unexpected error occurred";

// Failures reported by a diagram engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Syntax(String),

    #[error("No healthy render backends available")]
    NoBackend,

    #[error("Render backend {url} failed: {reason}")]
    Backend { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("Invalid input: svg must be a non-empty string")]
    EmptyInput,

    #[error("Failed to sanitize SVG")]
    Rejected,
}

/// Errors produced by the verify / render / export pipeline.
#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("Invalid input: code must be a non-empty string")]
    EmptyCode,

    #[error("Code exceeds maximum length of 50KB")]
    TooLarge,

    #[error("{0}")]
    Syntax(String),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error(transparent)]
    Engine(EngineError),
}

impl From<EngineError> for DiagramError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Syntax(message) => DiagramError::Syntax(message),
            other => DiagramError::Engine(other),
        }
    }
}

impl DiagramError {
    // Caller's fault: bad input or bad diagram
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DiagramError::EmptyCode | DiagramError::TooLarge | DiagramError::Syntax(_)
        )
    }

    /// Message safe to hand back over any transport. Internal engine failures
    /// are collapsed into [`GENERIC_ERROR`].
    pub fn public_message(&self) -> String {
        match self {
            DiagramError::Engine(_) => GENERIC_ERROR.to_string(),
            other => other.to_string(),
        }
    }
}
