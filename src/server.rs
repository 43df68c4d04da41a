//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the loaded
//! config with its [`Dispatcher`], HTTP client, stats, and uptime),
//! [`build_router`] for constructing the Axum router with middleware
//! layers, [`build_http_client`] for the connection-pooled hyper client,
//! and [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::model::Config;
use crate::config::{ConfigVersion, Origin};
use crate::dispatch::Dispatcher;
use crate::error::DispatchError;
use crate::health::health_handler;
use crate::{middleware, proxy};

/// A config snapshot together with the dispatcher built from it.
///
/// Both are swapped together on reload so a request never sees routes
/// from one config and defaults from another.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub version: ConfigVersion,
    pub source_name: String,
    pub origin: Origin,
    pub loaded_at: Instant,
}

impl LoadedConfig {
    pub fn new(
        config: Config,
        version: ConfigVersion,
        source_name: impl Into<String>,
    ) -> Result<Self, DispatchError> {
        let dispatcher = Dispatcher::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            version,
            source_name: source_name.into(),
            origin: Origin::Primary,
            loaded_at: Instant::now(),
        })
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }
}

/// Request outcome counters reported by `/health`.
#[derive(Debug, Default)]
pub struct Stats {
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
    pub no_route: AtomicU64,
    pub unavailable: AtomicU64,
    pub config_reloads: AtomicU64,
}

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub config: RwLock<LoadedConfig>,
    pub http_client: HttpClient,
    pub start_time: Instant,
    pub stats: Stats,
}

impl AppState {
    #[must_use]
    pub fn new(loaded: LoadedConfig) -> Self {
        Self {
            config: RwLock::new(loaded),
            http_client: build_http_client(),
            start_time: Instant::now(),
            stats: Stats::default(),
        }
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // rustls cannot pick a crypto provider on its own when more than one
    // is compiled in; install ring explicitly.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

#[derive(Debug, Clone, Copy)]
pub struct RouterOptions {
    pub max_body: usize,
    pub cors: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            max_body: 1_048_576,
            cors: false,
        }
    }
}

pub fn build_router(state: Arc<AppState>, options: RouterOptions) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .fallback(proxy::forward_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(options.max_body)),
        );

    let router = if options.cors {
        router.layer(middleware::cors_layer())
    } else {
        router
    };

    router.with_state(state)
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    CtrlC,
    Terminate,
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// A handler that fails to install never fires; the other one still does.
pub async fn shutdown_signal() {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Signal::CtrlC,
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for Ctrl+C");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                Signal::Terminate
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Signal>();

    let received = tokio::select! {
        s = interrupt => s,
        s = terminate => s,
    };
    tracing::info!(signal = ?received, "shutdown requested");
}
