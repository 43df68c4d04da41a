//! Header construction for upstream requests and hop-by-hop stripping.
//!
//! [`build_forwarded_headers`] copies the client headers (when forwarding
//! is enabled), drops hop-by-hop headers, points `Host` at the selected
//! server, adds proxy metadata (`X-Forwarded-*`, `X-Real-IP`, `Via`),
//! then applies the global and per-route header rules, route rules last.
//! `X-Correlation-Id` is always set so upstream logs can be joined with ours.

use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::model::{Defaults, HeaderRules};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Strip hop-by-hop headers and `content-length` from an upstream response.
///
/// The forwarder collects the whole upstream body, so the origin's
/// `transfer-encoding` and `content-length` no longer describe what we
/// send. Axum sets `content-length` from the collected bytes.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(hyper::header::CONTENT_LENGTH);
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: &str,
    target_url: &url::Url,
    route_rules: &HeaderRules,
    defaults: &Defaults,
    correlation_id: &str,
) -> HeaderMap {
    let mut headers = if defaults.forward_headers {
        original.clone()
    } else {
        HeaderMap::new()
    };

    if defaults.strip_hop_by_hop {
        for name in HOP_BY_HOP.iter() {
            headers.remove(name);
        }
    }

    if let Some(host) = target_url.host_str() {
        let authority = target_url
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
        insert_str(&mut headers, "host", &authority);
    }

    if defaults.proxy_headers {
        add_proxy_headers(&mut headers, original, client_ip);
    }

    insert_str(&mut headers, "x-correlation-id", correlation_id);

    apply_rules(&mut headers, &defaults.headers, "defaults");
    apply_rules(&mut headers, route_rules, "route");

    headers
}

/// Proxy metadata describing the client-to-proxy hop.
///
/// `X-Real-IP` is the connected peer, never a value taken from the
/// client-supplied chain. The listener speaks plain HTTP, so that is the
/// forwarded protocol whatever the upstream scheme.
fn add_proxy_headers(headers: &mut HeaderMap, original: &HeaderMap, client_ip: &str) {
    // Append to an existing chain.
    let chain = original
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || client_ip.to_string(),
            |existing| format!("{existing}, {client_ip}"),
        );
    insert_str(headers, "x-forwarded-for", &chain);
    insert_str(headers, "x-real-ip", client_ip);
    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));

    if let Some(original_host) = original.get("host") {
        headers.insert("x-forwarded-host", original_host.clone());
    }

    headers.insert("via", HeaderValue::from_static("1.1 gourmet"));
}

fn insert_str(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(val) = HeaderValue::from_str(value) {
        headers.insert(name, val);
    }
}

fn apply_rules(headers: &mut HeaderMap, rules: &HeaderRules, scope: &str) {
    for (key, value) in &rules.add {
        match (key.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            (Ok(name), Ok(val)) => {
                headers.insert(name, val);
            }
            _ => {
                tracing::warn!(header = %key, scope, "invalid header name or value in headers.add, skipping");
            }
        }
    }

    for key in &rules.strip {
        if let Ok(name) = key.parse::<HeaderName>() {
            headers.remove(&name);
        }
    }
}
