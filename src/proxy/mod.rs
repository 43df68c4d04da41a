//! Core HTTP forwarding handler.
//!
//! The [`forward_handler`] function is the Axum fallback that receives
//! every non-`/health` request, asks the [`Dispatcher`](crate::dispatch::Dispatcher)
//! for an upstream server, and forwards the request to it. Submodules
//! handle header construction ([`headers`]) and the upstream exchange
//! ([`forward`]).
//!
//! Dispatch failures map to `404` (no route) and `503` (no available
//! server); upstream failures map to `502` and count against the
//! server's availability.

pub mod forward;
pub mod headers;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::error::DispatchError;
use crate::server::AppState;

#[must_use]
pub const fn status_for(error: &DispatchError) -> StatusCode {
    match error {
        DispatchError::NoRouteMatched { .. } => StatusCode::NOT_FOUND,
        DispatchError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::InvalidPool { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn status_response(status: StatusCode, correlation_id: &str) -> Response {
    let mut response = status.into_response();
    if let Ok(value) = correlation_id.parse() {
        response.headers_mut().insert("x-correlation-id", value);
    }
    response
}

#[allow(clippy::significant_drop_tightening, clippy::cast_possible_truncation)]
pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path();
    let correlation_id = req_headers
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    // Clone the Arcs to release the RwLock before any .await
    let (config, dispatcher) = {
        let loaded = state.config.read().await;
        (Arc::clone(&loaded.config), Arc::clone(&loaded.dispatcher))
    };

    let server = match dispatcher.dispatch(path) {
        Ok(server) => server,
        Err(e) => {
            let counter = match &e {
                DispatchError::NoRouteMatched { .. } => &state.stats.no_route,
                _ => &state.stats.unavailable,
            };
            counter.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                correlation_id = %correlation_id,
                method = %method,
                path = %path,
                error = %e,
                "dispatch failed"
            );
            return status_response(status_for(&e), &correlation_id);
        }
    };

    tracing::debug!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        server = %server.address(),
        "request dispatched"
    );

    let client_ip = addr.ip().to_string();
    let start = Instant::now();
    let result = forward::forward(forward::ForwardRequest {
        client: &state.http_client,
        server: &server,
        method: &method,
        uri: &uri,
        original_headers: &req_headers,
        body: &body,
        defaults: &config.defaults,
        client_ip: &client_ip,
        correlation_id: &correlation_id,
    })
    .await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(upstream) => {
            server.record_success();
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                correlation_id = %correlation_id,
                method = %method,
                path = %path,
                server = %server.address(),
                status = upstream.status.as_u16(),
                latency_ms,
                "upstream responded"
            );

            let mut resp_headers = upstream.headers;
            headers::strip_response_hop_by_hop(&mut resp_headers);
            let mut builder = Response::builder().status(upstream.status);
            for (key, value) in &resp_headers {
                builder = builder.header(key, value);
            }
            builder
                .header("x-correlation-id", &correlation_id)
                .body(axum::body::Body::from(upstream.body))
                .unwrap_or_else(|e| {
                    tracing::error!(
                        correlation_id = %correlation_id,
                        error = %e,
                        "failed to build response"
                    );
                    status_response(StatusCode::BAD_GATEWAY, &correlation_id)
                })
        }
        Err(e) => {
            server.record_failure();
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                correlation_id = %correlation_id,
                method = %method,
                path = %path,
                server = %server.address(),
                latency_ms,
                error = %e,
                "upstream request failed"
            );
            status_response(StatusCode::BAD_GATEWAY, &correlation_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_errors_map_to_http_status() {
        assert_eq!(
            status_for(&DispatchError::NoRouteMatched { path: "/".into() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&DispatchError::UpstreamUnavailable { pool: ".*".into() }),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn status_response_echoes_correlation_id() {
        let response = status_response(StatusCode::BAD_GATEWAY, "abc-123");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers().get("x-correlation-id").unwrap(), "abc-123");
    }
}
