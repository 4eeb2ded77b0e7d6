use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;

use crate::error::EngineError;
use crate::load_balancer::LoadBalancer;

/// The Mermaid engine seam.
///
/// `parse` only has to tell valid from invalid; `render` produces raw SVG whose
/// element IDs are namespaced under `id`.
#[async_trait]
pub trait DiagramEngine: Send + Sync {
    async fn parse(&self, code: &str) -> Result<(), EngineError>;

    async fn render(&self, id: &str, code: &str) -> Result<String, EngineError>;
}

lazy_static! {
    static ref RE_ROOT_ID: Regex = Regex::new(r#"<svg\b[^>]*?\sid="([^"]+)""#).unwrap();
    static ref RE_ERROR_PREFIX: Regex = Regex::new(r"^Error \d{3}:\s*").unwrap();
}

/// Engine backed by Kroki-compatible render services
/// (`POST {backend}/mermaid/svg`, body is the diagram text).
pub struct HttpEngine {
    client: reqwest::Client,
    pool: Arc<LoadBalancer>,
}

impl HttpEngine {
    pub fn new(client: reqwest::Client, pool: Arc<LoadBalancer>) -> Self {
        Self { client, pool }
    }

    async fn post_diagram(&self, code: &str) -> Result<String, EngineError> {
        let backend = self.pool.get_backend().ok_or(EngineError::NoBackend)?;
        log::debug!("Rendering on backend {}", backend.url);

        let result = self
            .client
            .post(format!("{}/mermaid/svg", backend.url))
            .header(CONTENT_TYPE, "text/plain")
            .body(code.to_string())
            .send()
            .await;

        let res = match result {
            Ok(res) => res,
            // unreachable backend, let the health checker bring it back
            Err(e) => {
                backend.set_healthy(false);
                log::warn!("Backend {} failed, marked unhealthy: {}", backend.url, e);
                return Err(EngineError::Backend {
                    url: backend.url.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let status = res.status();
        let body = res.text().await.map_err(|e| EngineError::Backend {
            url: backend.url.clone(),
            reason: format!("Read error: {}", e),
        })?;

        if status.is_success() {
            return Ok(body);
        }
        // 400 is the only status a render service uses for bad diagram source
        if status == StatusCode::BAD_REQUEST {
            return Err(EngineError::Syntax(syntax_message(&body)));
        }

        // any other 4xx means a misrouted or misconfigured backend, not bad input
        if status.is_client_error() {
            backend.set_healthy(false);
            log::warn!("Backend {} answered {}, marked unhealthy", backend.url, status);
        }
        log::debug!("Backend {} error body: {}", backend.url, body);
        Err(EngineError::Backend {
            url: backend.url.clone(),
            reason: format!("HTTP {}", status),
        })
    }
}

#[async_trait]
impl DiagramEngine for HttpEngine {
    // Render services have no parse-only endpoint, a render that succeeds is a valid parse
    async fn parse(&self, code: &str) -> Result<(), EngineError> {
        self.post_diagram(code).await.map(|_| ())
    }

    async fn render(&self, id: &str, code: &str) -> Result<String, EngineError> {
        let svg = self.post_diagram(code).await?;
        Ok(namespace_ids(&svg, id))
    }
}

fn syntax_message(body: &str) -> String {
    let message = RE_ERROR_PREFIX.replace(body.trim(), "");
    if message.is_empty() {
        "Invalid Mermaid syntax".to_string()
    } else {
        message.into_owned()
    }
}

/// Rewrite the root `<svg id>` and every reference derived from it to `id`.
fn namespace_ids(svg: &str, id: &str) -> String {
    let Some(old) = RE_ROOT_ID.captures(svg).map(|c| c[1].to_string()) else {
        return svg.to_string();
    };
    if old == id {
        return svg.to_string();
    }

    let pattern = format!(r#"(id="|#){}([-_"\s.,:){{])"#, regex::escape(&old));
    match Regex::new(&pattern) {
        Ok(re) => re
            .replace_all(svg, |caps: &Captures| format!("{}{}{}", &caps[1], id, &caps[2]))
            .into_owned(),
        Err(e) => {
            log::warn!("Could not namespace SVG ids: {}", e);
            svg.to_string()
        }
    }
}
