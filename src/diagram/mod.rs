//! Verify / render / export pipeline on top of a [`DiagramEngine`].
//!
//! Size and emptiness checks happen here, before the engine is involved, so a
//! bad request never reaches a render backend.

mod engine;

pub use engine::{DiagramEngine, HttpEngine};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::ser::SerializeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{DiagramError, EngineError};
use crate::metrics::{RENDER_FAILURES, RENDER_LATENCY};

/// Largest accepted diagram source, in characters.
pub const MAX_CODE_LENGTH: usize = 50_000;

/// Outcome of a syntax check, serialized as `{"ok":true}` or
/// `{"ok":false,"error":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Valid,
    Invalid(String),
}

impl VerificationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, VerificationResult::Valid)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            VerificationResult::Valid => None,
            VerificationResult::Invalid(error) => Some(error),
        }
    }
}

impl Serialize for VerificationResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("ok", &self.is_ok())?;
        if let Some(error) = self.error() {
            map.serialize_entry("error", error)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub svg: String,
    pub filename: String,
}

fn check_input(code: &str) -> Result<(), DiagramError> {
    if code.is_empty() {
        return Err(DiagramError::EmptyCode);
    }
    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(DiagramError::TooLarge);
    }
    Ok(())
}

/// `mermaid-<epoch millis>-<9 random chars>`, unique per render.
pub fn render_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("mermaid-{}-{}", Utc::now().timestamp_millis(), &suffix[..9])
}

/// `diagram-2024-05-01T12-30-45.svg` for the given instant.
pub fn export_filename(at: DateTime<Utc>) -> String {
    format!("diagram-{}.svg", at.format("%Y-%m-%dT%H-%M-%S"))
}

pub struct DiagramService {
    engine: Arc<dyn DiagramEngine>,
}

impl DiagramService {
    pub fn new(engine: Arc<dyn DiagramEngine>) -> Self {
        Self { engine }
    }

    /// Check syntax without rendering.
    ///
    /// Input and syntax problems come back as [`VerificationResult::Invalid`];
    /// only engine failures (no backend, backend down) are errors.
    pub async fn verify(&self, code: &str) -> Result<VerificationResult, DiagramError> {
        if let Err(e) = check_input(code) {
            return Ok(VerificationResult::Invalid(e.to_string()));
        }

        match self.engine.parse(code).await {
            Ok(()) => Ok(VerificationResult::Valid),
            Err(EngineError::Syntax(message)) => Ok(VerificationResult::Invalid(message)),
            Err(e) => Err(e.into()),
        }
    }

    /// Verify, then render to raw (unsanitized) SVG.
    pub async fn render(&self, code: &str) -> Result<String, DiagramError> {
        check_input(code)?;

        let verification = self.verify(code).await?;
        if let Some(error) = verification.error() {
            return Err(DiagramError::Syntax(error.to_string()));
        }

        let id = render_id();
        let start = Instant::now();
        let result = self.engine.render(&id, code).await;
        RENDER_LATENCY.observe(start.elapsed().as_secs_f64());

        result.map_err(|e| {
            RENDER_FAILURES.inc();
            e.into()
        })
    }

    pub async fn export_svg(&self, code: &str) -> Result<ExportResult, DiagramError> {
        let svg = self.render(code).await?;
        Ok(ExportResult {
            svg,
            filename: export_filename(Utc::now()),
        })
    }
}
