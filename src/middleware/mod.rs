//! Tower middleware layers beyond the tracing and body-limit layers
//! installed in [`server::build_router`](crate::server::build_router).
//!
//! Correlation ID handling lives in [`proxy::forward_handler`](crate::proxy::forward_handler).

use axum::http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

/// Permissive CORS: any origin, the common methods, and any request header.
///
/// `x-correlation-id` is exposed so browser clients can report it.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static("x-correlation-id")])
}
