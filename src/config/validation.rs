//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as missing routes, patterns that do not compile, duplicate
//! patterns, empty server lists, zero weights and timeouts, and malformed
//! server URLs. Returns every [`ValidationError`] found, with per-field
//! suggestions, so the user can fix the file in one pass.

use url::Url;

use super::model::Config;
use crate::dispatch::routing::compile_pattern;
use crate::error::ValidationError;

/// Validate a single route pattern. Returns `Ok(())` or a human-readable error.
pub fn validate_pattern(pattern: &str) -> Result<(), String> {
    if pattern.is_empty() {
        return Err("pattern cannot be empty".into());
    }
    compile_pattern(pattern)
        .map(|_| ())
        .map_err(|e| format!("pattern does not compile: {e}"))
}

/// Validate a single server URL. Returns `Ok(())` or a human-readable error.
pub fn validate_server_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.host_str().is_none() {
                Err(format!("'{url}' has no host"))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.defaults.timeout == 0 {
        errors.push(ValidationError {
            route: "(root)".into(),
            field: "defaults.timeout".into(),
            message: "timeout must be greater than 0".into(),
            suggestion: None,
        });
    }

    if config.routes.is_empty() {
        errors.push(ValidationError {
            route: "(root)".into(),
            field: "routes".into(),
            message: "at least one route must be defined".into(),
            suggestion: None,
        });
        return Err(errors);
    }

    let mut seen_patterns = std::collections::HashSet::new();

    for (i, route) in config.routes.iter().enumerate() {
        let route_id = if route.pattern.is_empty() {
            format!("routes[{i}]")
        } else {
            route.pattern.clone()
        };

        if let Err(msg) = validate_pattern(&route.pattern) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "pattern".into(),
                message: msg,
                suggestion: None,
            });
        }

        if !seen_patterns.insert(&route.pattern) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "pattern".into(),
                message: "duplicate route pattern".into(),
                suggestion: Some("the second route can never match".into()),
            });
        }

        if route.timeout == Some(0) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "timeout".into(),
                message: "timeout must be greater than 0".into(),
                suggestion: Some("omit it to use defaults.timeout".into()),
            });
        }

        if route.servers.is_empty() {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "servers".into(),
                message: "at least one server must be defined".into(),
                suggestion: None,
            });
        }

        for server in &route.servers {
            if let Err(msg) = validate_server_url(&server.url) {
                errors.push(ValidationError {
                    route: route_id.clone(),
                    field: "servers.url".into(),
                    message: msg,
                    suggestion: if server.url.contains("://") {
                        None
                    } else {
                        Some(format!("did you mean 'http://{}'?", server.url))
                    },
                });
            }

            if server.weight == 0 {
                errors.push(ValidationError {
                    route: route_id.clone(),
                    field: "servers.weight".into(),
                    message: format!("{}: weight must be at least 1", server.url),
                    suggestion: None,
                });
            }

            if server.timeout == Some(0) {
                errors.push(ValidationError {
                    route: route_id.clone(),
                    field: "servers.timeout".into(),
                    message: format!("{}: timeout must be greater than 0", server.url),
                    suggestion: None,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!(
        "  {} routes, {} servers\n",
        config.routes.len(),
        config.total_servers()
    )];

    for (priority, route) in config.routes.iter().enumerate() {
        let timeout = route.timeout.map_or_else(
            || format!("{}ms (default)", config.defaults.timeout),
            |t| format!("{t}ms"),
        );
        let servers = route
            .servers
            .iter()
            .map(|s| {
                if s.weight > 1 {
                    format!("{} (weight {})", s.url, s.weight)
                } else {
                    s.url.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        lines.push(format!(
            "  #{} {}  -> {} servers",
            priority + 1,
            route.pattern,
            route.servers.len(),
        ));
        lines.push(format!("    servers: {servers}"));
        lines.push(format!("    timeout: {timeout}"));
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{Config, Defaults, Route, ServerEntry};

    fn server(url: &str) -> ServerEntry {
        ServerEntry {
            url: url.into(),
            weight: 1,
            timeout: None,
            max_fails: None,
            fail_timeout: None,
        }
    }

    fn config_with(routes: Vec<Route>) -> Config {
        Config {
            defaults: Defaults::default(),
            routes,
        }
    }

    fn route(pattern: &str, servers: Vec<ServerEntry>) -> Route {
        Route {
            pattern: pattern.into(),
            timeout: None,
            headers: Default::default(),
            servers,
        }
    }

    #[test]
    fn valid_config_passes() {
        let config = config_with(vec![route("/api/.*", vec![server("http://localhost:8080")])]);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn empty_routes_fails() {
        let errors = validate(&config_with(vec![])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("at least one route"));
    }

    #[test]
    fn empty_servers_fails() {
        let errors = validate(&config_with(vec![route("/api", vec![])])).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("at least one server")));
    }

    #[test]
    fn uncompilable_pattern_fails() {
        let config = config_with(vec![route("/api/(unclosed", vec![server("http://a:80")])]);
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "pattern"
            && e.message.contains("does not compile")));
    }

    #[test]
    fn duplicate_pattern_fails() {
        let config = config_with(vec![
            route("/api/.*", vec![server("http://a:80")]),
            route("/api/.*", vec![server("http://b:80")]),
        ]);
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn zero_weight_fails() {
        let mut entry = server("http://a:80");
        entry.weight = 0;
        let errors = validate(&config_with(vec![route(".*", vec![entry])])).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "servers.weight"));
    }

    #[test]
    fn invalid_url_suggests_scheme() {
        let config = config_with(vec![route(".*", vec![server("localhost:8080")])]);
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "servers.url"));
    }

    #[test]
    fn non_http_scheme_fails() {
        let config = config_with(vec![route(".*", vec![server("ftp://files:21")])]);
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("unsupported scheme 'ftp'")));
    }

    #[test]
    fn report_lists_routes_in_priority_order() {
        let mut weighted = server("http://a:80");
        weighted.weight = 3;
        let config = config_with(vec![
            route("/api/.*", vec![weighted]),
            route(".*", vec![server("http://b:80")]),
        ]);
        let report = format_validation_report("gourmet.yaml", &config);
        let api = report.find("#1 /api/.*").unwrap();
        let catch_all = report.find("#2 .*").unwrap();
        assert!(api < catch_all);
        assert!(report.contains("http://a:80 (weight 3)"));
    }
}
