//! `gourmet run`: start the proxy server.
//!
//! Loads the config file (with an optional fallback file), builds the
//! dispatcher, starts the Axum HTTP server with graceful shutdown, and
//! spawns a background refresh loop that rebuilds the dispatcher when
//! the config file changes.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::config::sources;
use crate::config::{ConfigResolver, ConfigSource, ConfigWatcher, Resolved};
use crate::error::GourmetError;
use crate::logging;
use crate::server::{self, AppState, LoadedConfig, RouterOptions};

const CANDIDATES: [&str; 4] = [
    "gourmet.yaml",
    "gourmet.yml",
    "gourmet.json",
    "gourmet.toml",
];

pub async fn execute(args: RunArgs) -> Result<(), GourmetError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let resolver = resolve_config_sources(&args).await?;
    let (watcher, resolved) = ConfigWatcher::start(resolver).await?;
    let loaded = build_loaded(resolved, args.timeout)?;

    for (priority, (pattern, pool)) in loaded.dispatcher.router().routes().enumerate() {
        tracing::info!(
            priority = priority + 1,
            pattern = %pattern,
            servers = pool.servers().len(),
            "route registered"
        );
    }
    let route_count = loaded.config.routes.len();
    let server_count = loaded.config.total_servers();

    let state = Arc::new(AppState::new(loaded));

    // Shutdown signal: dropping shutdown_tx closes the channel and stops the refresh loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let refresh_state = state.clone();
    let poll_interval = args.poll_interval;
    let timeout_override = args.timeout;
    let refresh_handle = tokio::spawn(async move {
        config_refresh_loop(
            refresh_state,
            watcher,
            poll_interval,
            timeout_override,
            shutdown_rx,
        )
        .await;
    });

    let router = server::build_router(
        state,
        RouterOptions {
            max_body: args.max_body,
            cors: args.cors,
        },
    );

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        routes = route_count,
        servers = server_count,
        "gourmet started"
    );

    // Wrap the shutdown signal to also stop the config refresh loop immediately
    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    if let Err(e) = refresh_handle.await {
        tracing::error!(error = %e, "config refresh task failed");
    }

    tracing::info!("gourmet stopped");
    Ok(())
}

/// Apply CLI overrides and build the dispatcher for a freshly loaded config.
fn build_loaded(
    resolved: Resolved,
    timeout_override: Option<u64>,
) -> Result<LoadedConfig, GourmetError> {
    let Resolved {
        mut config,
        version,
        origin,
        source_name,
    } = resolved;
    if let Some(timeout) = timeout_override {
        config.defaults.timeout = timeout;
    }
    Ok(LoadedConfig::new(config, version, source_name)?.with_origin(origin))
}

async fn resolve_config_sources(args: &RunArgs) -> Result<ConfigResolver, GourmetError> {
    let primary = match args.config.as_deref() {
        Some(path) => Some(create_file_source(path)?),
        None => auto_detect().await?,
    };

    let fallback = args
        .fallback_config
        .as_deref()
        .map(create_file_source)
        .transpose()?;

    match (primary, fallback) {
        (Some(primary), fallback) => Ok(ConfigResolver::new(primary, fallback)),
        (None, Some(fallback)) => Ok(ConfigResolver::new(fallback, None)),
        (None, None) => Err(GourmetError::NoConfigSource {
            hint: "Provide --config <file> or create ./gourmet.yaml.\n  \
                   Run 'gourmet init' to create a config file."
                .into(),
        }),
    }
}

async fn auto_detect() -> Result<Option<Box<dyn ConfigSource>>, GourmetError> {
    for name in &CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return create_file_source(&path).map(Some);
        }
    }
    Ok(None)
}

fn create_file_source(path: &Path) -> Result<Box<dyn ConfigSource>, GourmetError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(Box::new(sources::yaml::new(path.to_path_buf()))),

        #[cfg(feature = "json")]
        "json" => Ok(Box::new(sources::json::new(path.to_path_buf()))),

        #[cfg(feature = "toml")]
        "toml" => Ok(Box::new(sources::toml_source::new(path.to_path_buf()))),

        other => Err(GourmetError::UnsupportedFormat(other.to_string())),
    }
}

async fn config_refresh_loop(
    state: Arc<AppState>,
    mut watcher: ConfigWatcher,
    interval_secs: u64,
    timeout_override: Option<u64>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("config refresh loop shutting down");
                return;
            }
        }

        let (active_version, active_origin) = {
            let loaded = state.config.read().await;
            (loaded.version.clone(), loaded.origin)
        };

        let reloaded = match watcher.poll(&active_version, active_origin).await {
            Ok(Some(resolved)) => build_loaded(resolved, timeout_override),
            Ok(None) => continue,
            Err(e) => Err(e),
        };
        match reloaded {
            Ok(loaded) => {
                let route_count = loaded.config.routes.len();
                let version = loaded.version.short().to_string();
                let source = loaded.source_name.clone();
                *state.config.write().await = loaded;
                state.stats.config_reloads.fetch_add(1, Ordering::Relaxed);
                tracing::info!(routes = route_count, version = %version, source = %source, "config reloaded");
            }
            Err(e) => {
                tracing::error!(error = %e, "config reload failed, keeping current config");
            }
        }
    }
}
