//! Forwarding of one request to the selected upstream server.
//!
//! The upstream URL is the server's base URL with the request path
//! appended and the request query carried over. The whole exchange,
//! including collecting the response body, is bounded by the server's
//! timeout.

use std::time::Duration;

use axum::http::{HeaderMap, Method, Uri};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::StatusCode;
use url::Url;

use crate::config::model::Defaults;
use crate::dispatch::Server;
use crate::server::HttpClient;

use super::headers::build_forwarded_headers;

#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream body read failed: {0}")]
    Body(#[from] hyper::Error),

    #[error("upstream timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

pub struct ForwardRequest<'a> {
    pub client: &'a HttpClient,
    pub server: &'a Server,
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub original_headers: &'a HeaderMap,
    pub body: &'a Bytes,
    pub defaults: &'a Defaults,
    pub client_ip: &'a str,
    pub correlation_id: &'a str,
}

/// Join the server's base URL with the incoming request path and query.
#[must_use]
pub fn upstream_url(base: &Url, uri: &Uri) -> Url {
    let mut url = base.clone();
    let base_path = base.path().trim_end_matches('/');
    url.set_path(&format!("{base_path}{}", uri.path()));
    url.set_query(uri.query());
    url
}

pub async fn forward(req: ForwardRequest<'_>) -> Result<UpstreamResponse, ForwardError> {
    let url = upstream_url(req.server.url(), req.uri);
    let headers = build_forwarded_headers(
        req.original_headers,
        req.client_ip,
        &url,
        req.server.headers(),
        req.defaults,
        req.correlation_id,
    );

    let mut builder = hyper::Request::builder()
        .method(req.method.clone())
        .uri(url.as_str());
    for (key, value) in &headers {
        builder = builder.header(key, value);
    }
    let request = builder.body(Full::new(req.body.clone()))?;

    let timeout = req.server.timeout();
    let exchange = async {
        let response = req.client.request(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await?.to_bytes();
        Ok::<_, ForwardError>(UpstreamResponse {
            status,
            headers,
            body,
        })
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| ForwardError::Timeout(timeout))?
}
