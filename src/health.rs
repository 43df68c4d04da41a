//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the server
//! version, uptime, config source metadata, route/server counts,
//! cumulative request statistics, and the current availability of every
//! upstream server, pools listed in routing priority order.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub stats: StatsResponse,
    pub pools: Vec<PoolHealth>,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
    pub loaded_ago_seconds: u64,
    pub routes: usize,
    pub servers: usize,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub requests_unrouted: u64,
    pub requests_unavailable: u64,
    pub config_reloads: u64,
}

#[derive(Serialize, Deserialize)]
pub struct PoolHealth {
    pub pattern: String,
    pub available: usize,
    pub servers: Vec<ServerHealth>,
}

#[derive(Serialize, Deserialize)]
pub struct ServerHealth {
    pub url: String,
    pub weight: u32,
    pub available: bool,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (config, dispatcher, source_name, version_str, loaded_ago) = {
        let loaded = state.config.read().await;
        (
            Arc::clone(&loaded.config),
            Arc::clone(&loaded.dispatcher),
            loaded.source_name.clone(),
            loaded.version.short().to_string(),
            loaded.loaded_at.elapsed().as_secs(),
        )
    };

    let pools: Vec<PoolHealth> = dispatcher
        .router()
        .routes()
        .map(|(pattern, pool)| {
            let servers: Vec<ServerHealth> = pool
                .servers()
                .iter()
                .map(|s| ServerHealth {
                    url: s.url().to_string(),
                    weight: s.weight(),
                    available: s.is_available(),
                })
                .collect();
            PoolHealth {
                pattern: pattern.to_string(),
                available: servers.iter().filter(|s| s.available).count(),
                servers,
            }
        })
        .collect();

    let degraded = pools.iter().any(|p| p.available == 0);
    let stats = &state.stats;

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config: ConfigHealth {
            source: source_name,
            version: version_str,
            loaded_ago_seconds: loaded_ago,
            routes: config.routes.len(),
            servers: config.total_servers(),
        },
        stats: StatsResponse {
            requests_forwarded: stats.forwarded.load(Ordering::Relaxed),
            requests_failed: stats.failed.load(Ordering::Relaxed),
            requests_unrouted: stats.no_route.load(Ordering::Relaxed),
            requests_unavailable: stats.unavailable.load(Ordering::Relaxed),
            config_reloads: stats.config_reloads.load(Ordering::Relaxed),
        },
        pools,
    })
}
