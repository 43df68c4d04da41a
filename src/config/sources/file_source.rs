//! Generic async file-based config source with SHA256 change detection.
//!
//! [`FileSource`] implements [`ConfigSource`] for any file format by
//! accepting a deserialization function at construction time. It reads
//! the file asynchronously via Tokio, validates the result, and computes
//! a SHA256 hash of the raw bytes for version tracking.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::sha256_hex;
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::GourmetError;

pub type Deserializer = fn(&str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>>;

pub struct FileSource {
    path: PathBuf,
    name: &'static str,
    deserialize: Deserializer,
}

impl FileSource {
    #[must_use]
    pub fn new(path: PathBuf, name: &'static str, deserialize: Deserializer) -> Self {
        Self {
            path,
            name,
            deserialize,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_content(&self) -> Result<String, GourmetError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GourmetError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                GourmetError::Io(e)
            }
        })
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), GourmetError> {
        let content = self.read_content().await?;

        let config = (self.deserialize)(&content).map_err(|e| GourmetError::ConfigParse {
            path: self.path.display().to_string(),
            source: e,
        })?;

        validate(&config).map_err(|errors| GourmetError::ConfigValidation { errors })?;

        let hash = sha256_hex(content.as_bytes());
        tracing::debug!(path = %self.path.display(), version = %&hash[..8], "config file loaded");
        Ok((config, ConfigVersion::Hash(hash)))
    }

    async fn current_version(&self) -> Result<ConfigVersion, GourmetError> {
        let content = self.read_content().await?;
        Ok(ConfigVersion::Hash(sha256_hex(content.as_bytes())))
    }
}
