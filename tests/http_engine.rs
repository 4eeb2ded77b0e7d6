//! `HttpEngine` against fake Kroki-style render backends.

use axum::{Router, http::StatusCode, routing::post};
use mermaid_gateway::diagram::{DiagramEngine, DiagramService, HttpEngine};
use mermaid_gateway::error::{DiagramError, EngineError, GENERIC_ERROR};
use mermaid_gateway::load_balancer::LoadBalancer;
use std::sync::Arc;

async fn fake_backend(body: String) -> (StatusCode, String) {
    if body.starts_with("graph") {
        (
            StatusCode::OK,
            r#"<svg id="container" xmlns="http://www.w3.org/2000/svg"><style>#container .node{fill:#eee}</style><g class="node"><rect width="80" height="40"/></g></svg>"#.to_string(),
        )
    } else if body == "crash" {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string())
    } else if body == "misrouted" {
        (
            StatusCode::NOT_FOUND,
            "<html><body>nginx 404 internal-host render-7.prod</body></html>".to_string(),
        )
    } else if body == "throttled" {
        (StatusCode::TOO_MANY_REQUESTS, "slow down".to_string())
    } else {
        (
            StatusCode::BAD_REQUEST,
            "Error 400: Parse error on line 1:\nnot mermaid\n^".to_string(),
        )
    }
}

async fn spawn_backend() -> String {
    let app = Router::new().route("/mermaid/svg", post(fake_backend));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn engine(backends: &str) -> (Arc<LoadBalancer>, HttpEngine) {
    let pool = Arc::new(LoadBalancer::new(backends).unwrap());
    (pool.clone(), HttpEngine::new(reqwest::Client::new(), pool))
}

#[tokio::test]
async fn renders_and_namespaces_ids() {
    let (_, engine) = engine(&spawn_backend().await);
    let svg = engine.render("mermaid-1700000000000-abcdefghi", "graph TD\n A --> B").await.unwrap();
    assert!(svg.contains(r#"id="mermaid-1700000000000-abcdefghi""#));
    assert!(svg.contains("#mermaid-1700000000000-abcdefghi .node"));
    assert!(!svg.contains("container"));
}

#[tokio::test]
async fn client_errors_are_syntax_errors() {
    let (_, engine) = engine(&spawn_backend().await);
    match engine.parse("not mermaid").await {
        Err(EngineError::Syntax(message)) => {
            assert!(message.starts_with("Parse error on line 1:"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(engine.parse("graph LR\n A --> B").await.is_ok());
}

#[tokio::test]
async fn server_errors_are_backend_failures() {
    let (pool, engine) = engine(&spawn_backend().await);
    let err = engine.parse("crash").await.unwrap_err();
    assert!(matches!(err, EngineError::Backend { .. }));
    // a 5xx answer still means the backend is reachable
    assert!(pool.all_backends()[0].is_healthy());
}

#[tokio::test]
async fn other_client_statuses_are_backend_failures() {
    for code in ["misrouted", "throttled"] {
        let (pool, engine) = engine(&spawn_backend().await);
        let err = engine.parse(code).await.unwrap_err();
        assert!(matches!(err, EngineError::Backend { .. }), "{}: {:?}", code, err);
        assert!(!err.to_string().contains("render-7.prod"));
        assert!(!pool.all_backends()[0].is_healthy());
    }
}

#[tokio::test]
async fn backend_404_is_not_disclosed() {
    let (_, engine) = engine(&spawn_backend().await);
    let service = DiagramService::new(Arc::new(engine));

    let err = service.verify("misrouted").await.unwrap_err();
    assert!(!err.is_client_error());
    assert_eq!(err.public_message(), GENERIC_ERROR);
}

#[tokio::test]
async fn unreachable_backend_is_marked_unhealthy() {
    // bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (pool, engine) = engine(&format!("http://{}", addr));
    assert!(matches!(
        engine.parse("graph TD").await,
        Err(EngineError::Backend { .. })
    ));
    assert!(!pool.all_backends()[0].is_healthy());
    assert!(matches!(engine.parse("graph TD").await, Err(EngineError::NoBackend)));
}

#[tokio::test]
async fn pipeline_over_http_backend() {
    let (_, engine) = engine(&spawn_backend().await);
    let service = DiagramService::new(Arc::new(engine));

    assert!(service.verify("graph TD\n A --> B").await.unwrap().is_ok());

    let export = service.export_svg("graph TD\n A --> B").await.unwrap();
    assert!(export.svg.contains(r#"<svg id="mermaid-"#));

    let err = service.render("not mermaid").await.unwrap_err();
    assert!(matches!(err, DiagramError::Syntax(_)));
    assert!(err.is_client_error());
}
