//! Unified error types for gourmet.
//!
//! Defines [`GourmetError`] (the main crate error enum),
//! [`DispatchError`] for routing and server selection failures, and
//! [`ValidationError`] for config validation failures. All use
//! `thiserror` for `Display` and `Error` derives. Error messages
//! include contextual hints to guide the user toward a fix.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub route: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  route {}: {}: {}", self.route, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

/// Failures of the dispatch pipeline.
///
/// `NoRouteMatched` and `UpstreamUnavailable` are request-time outcomes
/// that the HTTP layer maps to 404 and 503. `InvalidPool` only occurs
/// while a [`Dispatcher`](crate::dispatch::Dispatcher) is being built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("no route matched path '{path}'")]
    NoRouteMatched { path: String },

    #[error("no upstream server available for '{pool}'")]
    UpstreamUnavailable { pool: String },

    #[error("invalid pool '{pool}': {reason}")]
    InvalidPool { pool: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GourmetError {
    #[error("No config source found.\n\n  {hint}")]
    NoConfigSource { hint: String },

    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),

    #[error("{0}")]
    Dispatch(#[from] DispatchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_includes_suggestion() {
        let err = ValidationError {
            route: "api".into(),
            field: "pattern".into(),
            message: "pattern does not compile".into(),
            suggestion: Some("escape the bracket".into()),
        };
        assert_eq!(
            err.to_string(),
            "  route api: pattern: pattern does not compile (escape the bracket)"
        );
    }

    #[test]
    fn dispatch_error_converts_into_crate_error() {
        let err: GourmetError = DispatchError::InvalidPool {
            pool: "/api/.*".into(),
            reason: "pool has no servers".into(),
        }
        .into();
        assert_eq!(err.to_string(), "invalid pool '/api/.*': pool has no servers");
    }
}
