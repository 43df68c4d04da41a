//! Concrete [`ConfigSource`](super::ConfigSource) implementations.
//!
//! Provides file-based sources (YAML, JSON, TOML) gated by feature flags
//! and the [`parse_config_str`] helper for format-specific deserialization.

pub mod file_source;

#[cfg(feature = "yaml")]
pub mod yaml;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "toml")]
pub mod toml_source;

use sha2::{Digest, Sha256};

use crate::config::model::Config;
use crate::error::GourmetError;

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, GourmetError> {
    let parsed: Result<Config, Box<dyn std::error::Error + Send + Sync>> = match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(Into::into),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(Into::into),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(Into::into),

        other => return Err(GourmetError::UnsupportedFormat(other.to_string())),
    };

    parsed.map_err(|source| GourmetError::ConfigParse {
        path: path_display.to_string(),
        source,
    })
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
