//! Request dispatch: path routing and upstream server selection.
//!
//! [`Dispatcher::dispatch`] is the per-request entry point. It resolves
//! the request path to a [`Pool`] through the [`Router`], then asks that
//! pool's [`RoundRobin`](balancer::RoundRobin) selector for a server.
//! Nothing in this module performs I/O; the caller forwards the request
//! to the returned [`Server`].

pub mod balancer;
pub mod routing;
pub mod upstream;

use std::sync::Arc;
use std::time::Duration;

use url::Url;

pub use balancer::Pool;
pub use routing::Router;
pub use upstream::{Availability, Server};

use crate::config::model::{Config, Defaults, Route, ServerEntry};
use crate::error::DispatchError;
use upstream::{AlwaysAvailable, PassiveHealth};

#[derive(Debug)]
pub struct Dispatcher {
    router: Router,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(router: Router) -> Self {
        Self { router }
    }

    /// Build pools and routes from a validated config, keeping route order.
    pub fn from_config(config: &Config) -> Result<Self, DispatchError> {
        let mut router = Router::new();
        for route in &config.routes {
            let pool = build_pool(route, &config.defaults)?;
            router.add_route(&route.pattern, pool)?;
        }
        Ok(Self { router })
    }

    /// Pick the server that should receive a request for `path`.
    pub fn dispatch(&self, path: &str) -> Result<Arc<Server>, DispatchError> {
        let pool = self
            .router
            .match_path(path)
            .ok_or_else(|| DispatchError::NoRouteMatched {
                path: path.to_string(),
            })?;
        pool.next_server()
    }

    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }
}

fn build_pool(route: &Route, defaults: &Defaults) -> Result<Pool, DispatchError> {
    let headers = Arc::new(route.headers.clone());
    let servers = route
        .servers
        .iter()
        .map(|entry| {
            build_server(entry, route, defaults).map(|s| s.with_headers(Arc::clone(&headers)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Pool::new(route.pattern.clone(), servers)
}

fn build_server(
    entry: &ServerEntry,
    route: &Route,
    defaults: &Defaults,
) -> Result<Server, DispatchError> {
    let url = Url::parse(&entry.url).map_err(|e| DispatchError::InvalidPool {
        pool: route.pattern.clone(),
        reason: format!("invalid server url '{}': {e}", entry.url),
    })?;

    let timeout_ms = entry.timeout.or(route.timeout).unwrap_or(defaults.timeout);
    let max_fails = entry.max_fails.unwrap_or(defaults.max_fails);
    let fail_timeout = entry.fail_timeout.unwrap_or(defaults.fail_timeout);

    let server = Server::new(url, entry.weight).with_timeout(Duration::from_millis(timeout_ms));
    Ok(if max_fails == 0 {
        server.with_availability(AlwaysAvailable)
    } else {
        server.with_availability(PassiveHealth::new(
            max_fails,
            Duration::from_millis(fail_timeout),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::HeaderRules;

    fn entry(url: &str, weight: u32) -> ServerEntry {
        ServerEntry {
            url: url.into(),
            weight,
            timeout: None,
            max_fails: None,
            fail_timeout: None,
        }
    }

    fn config() -> Config {
        let mut headers = HeaderRules::default();
        headers.add.insert("x-pool".into(), "api".into());
        Config {
            defaults: Defaults::default(),
            routes: vec![
                Route {
                    pattern: "/api/.*".into(),
                    timeout: Some(2000),
                    headers,
                    servers: vec![entry("http://api-1:8080", 2), {
                        let mut e = entry("http://api-2:8080", 1);
                        e.timeout = Some(500);
                        e
                    }],
                },
                Route {
                    pattern: ".*".into(),
                    timeout: None,
                    headers: HeaderRules::default(),
                    servers: vec![entry("http://web:80", 1)],
                },
            ],
        }
    }

    #[test]
    fn builds_routes_in_config_order() {
        let dispatcher = Dispatcher::from_config(&config()).unwrap();
        let patterns: Vec<&str> = dispatcher.router().routes().map(|(p, _)| p).collect();
        assert_eq!(patterns, ["/api/.*", ".*"]);
    }

    #[test]
    fn resolves_timeouts_from_most_specific_level() {
        let dispatcher = Dispatcher::from_config(&config()).unwrap();
        let (_, api) = dispatcher.router().routes().next().unwrap();
        assert_eq!(api.servers()[0].timeout(), Duration::from_millis(2000));
        assert_eq!(api.servers()[1].timeout(), Duration::from_millis(500));

        let web = dispatcher.dispatch("/index.html").unwrap();
        assert_eq!(web.timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn route_headers_are_shared_by_pool_servers() {
        let dispatcher = Dispatcher::from_config(&config()).unwrap();
        let server = dispatcher.dispatch("/api/users").unwrap();
        assert_eq!(server.headers().add.get("x-pool").unwrap(), "api");
    }

    #[test]
    fn dispatch_follows_weights_within_pool() {
        let dispatcher = Dispatcher::from_config(&config()).unwrap();
        let picked: Vec<String> = (0..3)
            .map(|_| dispatcher.dispatch("/api/x").unwrap().address())
            .collect();
        assert_eq!(picked, ["api-1:8080", "api-1:8080", "api-2:8080"]);
    }

    #[test]
    fn unmatched_path_is_reported() {
        let mut config = config();
        config.routes.pop();
        let dispatcher = Dispatcher::from_config(&config).unwrap();
        assert_eq!(
            dispatcher.dispatch("/index.html").unwrap_err(),
            DispatchError::NoRouteMatched {
                path: "/index.html".into()
            }
        );
    }

    #[test]
    fn unparsable_server_url_is_invalid_pool() {
        let mut config = config();
        config.routes[1].servers[0].url = "not a url".into();
        let err = Dispatcher::from_config(&config).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidPool { ref pool, .. } if pool == ".*"));
    }

    #[test]
    fn repeated_failures_take_server_out_of_rotation() {
        let mut config = config();
        config.routes[1].servers.push(entry("http://web-2:80", 1));
        config.defaults.max_fails = 1;
        let dispatcher = Dispatcher::from_config(&config).unwrap();

        let first = dispatcher.dispatch("/").unwrap();
        assert_eq!(first.address(), "web:80");
        first.record_failure();

        for _ in 0..3 {
            assert_eq!(dispatcher.dispatch("/").unwrap().address(), "web-2:80");
        }
    }
}
