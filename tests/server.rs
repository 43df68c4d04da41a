//! Integration tests for the HTTP server: health, dispatch status codes,
//! forwarding to live backends, and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::IntoResponse;
use gourmet::config::model::{Config, Defaults, HeaderRules, Route, ServerEntry};
use gourmet::config::ConfigVersion;
use gourmet::health::HealthResponse;
use gourmet::server::{self, AppState, LoadedConfig, RouterOptions};

fn entry(url: &str, weight: u32) -> ServerEntry {
    ServerEntry {
        url: url.into(),
        weight,
        timeout: None,
        max_fails: None,
        fail_timeout: None,
    }
}

fn route(pattern: &str, servers: Vec<ServerEntry>) -> Route {
    Route {
        pattern: pattern.into(),
        timeout: None,
        headers: HeaderRules::default(),
        servers,
    }
}

fn config(routes: Vec<Route>) -> Config {
    Config {
        defaults: Defaults::default(),
        routes,
    }
}

async fn echo(State(name): State<&'static str>, uri: Uri, headers: HeaderMap) -> impl IntoResponse {
    let seen = |key: &str| {
        headers
            .get(key)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    (
        [
            ("x-backend", name.to_string()),
            ("x-seen-via", seen("via")),
            ("x-seen-forwarded-for", seen("x-forwarded-for")),
            ("x-seen-correlation-id", seen("x-correlation-id")),
        ],
        uri.to_string(),
    )
}

/// Starts a backend that answers every request with its own name and the
/// request URI.
async fn start_backend(name: &'static str) -> SocketAddr {
    let app = axum::Router::new().fallback(echo).with_state(name);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing is listening on.
async fn dead_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn start_proxy(config: Config) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    start_proxy_with(config, RouterOptions::default()).await
}

async fn start_proxy_with(
    config: Config,
    options: RouterOptions,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let loaded = LoadedConfig::new(config, ConfigVersion::Hash("test-hash".into()), "test").unwrap();
    let state = Arc::new(AppState::new(loaded));
    let router = server::build_router(state, options);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    (addr, shutdown_tx)
}

fn api_only() -> Config {
    config(vec![route(
        "/api/.*",
        vec![entry("http://127.0.0.1:19999", 1)],
    )])
}

#[tokio::test]
async fn health_endpoint_reports_pools() {
    let (addr, shutdown) = start_proxy(api_only()).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let health: HealthResponse = resp.json().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(health.config.source, "test");
    assert_eq!(health.config.version, "test-has");
    assert_eq!(health.config.routes, 1);
    assert_eq!(health.config.servers, 1);
    assert_eq!(health.stats.requests_forwarded, 0);
    assert_eq!(health.pools.len(), 1);
    assert_eq!(health.pools[0].pattern, "/api/.*");
    assert_eq!(health.pools[0].available, 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn unmatched_path_returns_404_with_correlation_id() {
    let (addr, shutdown) = start_proxy(api_only()).await;

    let resp = reqwest::get(format!("http://{addr}/nonexistent")).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert!(resp.headers().contains_key("x-correlation-id"));

    let health: HealthResponse = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.stats.requests_unrouted, 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn requests_follow_weighted_rotation() {
    let one = start_backend("one").await;
    let two = start_backend("two").await;
    let (addr, shutdown) = start_proxy(config(vec![route(
        "/api/.*",
        vec![
            entry(&format!("http://{one}"), 2),
            entry(&format!("http://{two}"), 1),
        ],
    )]))
    .await;

    let client = reqwest::Client::new();
    let mut seen = Vec::new();
    for _ in 0..6 {
        let resp = client
            .get(format!("http://{addr}/api/items?page=2"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        seen.push(resp.headers()["x-backend"].to_str().unwrap().to_string());
        assert_eq!(resp.text().await.unwrap(), "/api/items?page=2");
    }
    assert_eq!(seen, ["one", "one", "two", "one", "one", "two"]);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn forwarded_request_carries_proxy_headers() {
    let backend = start_backend("echo").await;
    let (addr, shutdown) = start_proxy(config(vec![route(
        ".*",
        vec![entry(&format!("http://{backend}"), 1)],
    )]))
    .await;

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/anything"))
        .header("x-correlation-id", "req-42")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-correlation-id"], "req-42");
    assert_eq!(resp.headers()["x-seen-correlation-id"], "req-42");
    assert_eq!(resp.headers()["x-seen-via"], "1.1 gourmet");
    assert_eq!(resp.headers()["x-seen-forwarded-for"], "127.0.0.1");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn failing_server_is_taken_out_then_503() {
    let dead = dead_addr().await;
    let mut cfg = config(vec![route(
        "/api/.*",
        vec![entry(&format!("http://{dead}"), 1)],
    )]);
    cfg.defaults.max_fails = 1;
    cfg.defaults.fail_timeout = 60_000;
    let (addr, shutdown) = start_proxy(cfg).await;

    let url = format!("http://{addr}/api/x");
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 502);
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 503);

    let health: HealthResponse = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.status, "degraded");
    assert_eq!(health.pools[0].available, 0);
    assert_eq!(health.stats.requests_failed, 1);
    assert_eq!(health.stats.requests_unavailable, 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn traffic_moves_to_the_healthy_server() {
    let dead = dead_addr().await;
    let live = start_backend("live").await;
    let mut cfg = config(vec![route(
        ".*",
        vec![
            entry(&format!("http://{dead}"), 1),
            entry(&format!("http://{live}"), 1),
        ],
    )]);
    cfg.defaults.max_fails = 1;
    let (addr, shutdown) = start_proxy(cfg).await;

    let url = format!("http://{addr}/page");
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 502);
    for _ in 0..3 {
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["x-backend"], "live");
    }

    let _ = shutdown.send(());
}

#[tokio::test]
async fn cors_preflight_is_answered_when_enabled() {
    let options = RouterOptions {
        cors: true,
        ..RouterOptions::default()
    };
    let (addr, shutdown) = start_proxy_with(api_only(), options).await;

    let resp = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("http://{addr}/api/items"))
        .header("origin", "http://app.example")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let options = RouterOptions {
        max_body: 16,
        ..RouterOptions::default()
    };
    let (addr, shutdown) = start_proxy_with(api_only(), options).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/upload"))
        .body(vec![b'x'; 1024])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn graceful_shutdown_works() {
    let (addr, shutdown) = start_proxy(api_only()).await;

    let url = format!("http://{addr}/health");
    assert!(reqwest::get(&url).await.is_ok());

    let _ = shutdown.send(());

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let result = reqwest::get(&url).await;
    assert!(result.is_err());
}
