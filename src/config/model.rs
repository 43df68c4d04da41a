//! Serde data structures for the gourmet configuration file.
//!
//! Contains [`Config`] (the root), [`Route`], [`ServerEntry`],
//! [`Defaults`], and [`HeaderRules`]. All types derive `Serialize` and
//! `Deserialize` with `deny_unknown_fields` for strict parsing.
//!
//! Route order is significant: the first route whose pattern matches a
//! request path receives it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const fn default_timeout() -> u64 {
    5000
}

const fn default_max_fails() -> u32 {
    3
}

const fn default_fail_timeout() -> u64 {
    10_000
}

const fn default_weight() -> u32 {
    1
}

const fn default_true() -> bool {
    true
}

fn is_default_timeout(v: &u64) -> bool {
    *v == default_timeout()
}

fn is_default_max_fails(v: &u32) -> bool {
    *v == default_max_fails()
}

fn is_default_fail_timeout(v: &u64) -> bool {
    *v == default_fail_timeout()
}

fn is_default_weight(v: &u32) -> bool {
    *v == default_weight()
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_default_defaults(v: &Defaults) -> bool {
    v.timeout == default_timeout()
        && v.forward_headers
        && v.proxy_headers
        && v.strip_hop_by_hop
        && v.max_fails == default_max_fails()
        && v.fail_timeout == default_fail_timeout()
        && v.headers.is_default()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "is_default_defaults")]
    pub defaults: Defaults,

    pub routes: Vec<Route>,
}

impl Config {
    #[must_use]
    pub fn total_servers(&self) -> usize {
        self.routes.iter().map(|r| r.servers.len()).sum()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(
        default = "default_timeout",
        skip_serializing_if = "is_default_timeout"
    )]
    pub timeout: u64,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub forward_headers: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub proxy_headers: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub strip_hop_by_hop: bool,

    /// Consecutive forwarding failures before a server is taken out of
    /// rotation. `0` disables passive health tracking.
    #[serde(
        default = "default_max_fails",
        skip_serializing_if = "is_default_max_fails"
    )]
    pub max_fails: u32,

    /// Milliseconds a failed server stays out of rotation.
    #[serde(
        default = "default_fail_timeout",
        skip_serializing_if = "is_default_fail_timeout"
    )]
    pub fail_timeout: u64,

    #[serde(default, skip_serializing_if = "HeaderRules::is_default")]
    pub headers: HeaderRules,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            forward_headers: default_true(),
            proxy_headers: default_true(),
            strip_hop_by_hop: default_true(),
            max_fails: default_max_fails(),
            fail_timeout: default_fail_timeout(),
            headers: HeaderRules::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Route {
    /// Regular expression matched against the whole request path.
    pub pattern: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "HeaderRules::is_default")]
    pub headers: HeaderRules,

    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerEntry {
    pub url: String,

    #[serde(default = "default_weight", skip_serializing_if = "is_default_weight")]
    pub weight: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fails: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRules {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub add: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strip: Vec<String>,
}

impl HeaderRules {
    fn is_default(&self) -> bool {
        self.add.is_empty() && self.strip.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_weight_defaults_to_one() {
        let entry: ServerEntry = serde_json::from_str(r#"{"url": "http://a:80"}"#).unwrap();
        assert_eq!(entry.weight, 1);
        assert!(entry.max_fails.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<Route, _> =
            serde_json::from_str(r#"{"pattern": "/", "servers": [], "method": "GET"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn defaults_are_omitted_when_serializing() {
        let config = Config {
            defaults: Defaults::default(),
            routes: vec![],
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"routes":[]}"#);
    }
}
