//! Configuration loading, validation, and hot-reloading.
//!
//! Defines the [`ConfigSource`] trait for pluggable config files, the
//! [`ConfigResolver`] that falls back to a secondary file when the
//! primary one cannot be loaded, the [`ConfigWatcher`] used by the
//! refresh loop, and the [`ConfigVersion`] enum for change detection.
//! Submodules provide the data model, validation logic, and the file
//! source implementations.

pub mod model;
pub mod sources;
pub mod validation;

use async_trait::async_trait;

use crate::error::GourmetError;
use model::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
}

impl ConfigVersion {
    /// Short form used in logs and the health payload.
    #[must_use]
    pub fn short(&self) -> &str {
        match self {
            Self::Hash(h) => h.get(..8).unwrap_or(h),
        }
    }
}

// async_trait is required here because ConfigSource is used as Box<dyn ConfigSource>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Parse and validate the current content.
    async fn load(&self) -> Result<(Config, ConfigVersion), GourmetError>;

    /// Version of the current raw content, whether or not it is valid.
    async fn current_version(&self) -> Result<ConfigVersion, GourmetError>;
}

/// Which of the resolver's sources produced a config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Primary,
    Fallback,
}

#[derive(Debug)]
pub struct Resolved {
    pub config: Config,
    pub version: ConfigVersion,
    pub origin: Origin,
    pub source_name: String,
}

/// Raw content versions of both sources; `None` when a source is unreadable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    primary: Option<ConfigVersion>,
    fallback: Option<ConfigVersion>,
}

pub struct ConfigResolver {
    primary: Box<dyn ConfigSource>,
    fallback: Option<Box<dyn ConfigSource>>,
}

impl ConfigResolver {
    #[must_use]
    pub fn new(primary: Box<dyn ConfigSource>, fallback: Option<Box<dyn ConfigSource>>) -> Self {
        Self { primary, fallback }
    }

    pub async fn load_with_fallback(&self) -> Result<Resolved, GourmetError> {
        let primary_err = match self.primary.load().await {
            Ok((config, version)) => {
                return Ok(Resolved {
                    config,
                    version,
                    origin: Origin::Primary,
                    source_name: self.primary.name().to_string(),
                })
            }
            Err(e) => e,
        };
        let Some(ref fallback) = self.fallback else {
            return Err(primary_err);
        };
        tracing::warn!(
            primary = self.primary.name(),
            fallback = fallback.name(),
            error = %primary_err,
            "primary config file failed, using fallback"
        );
        let (config, version) = fallback.load().await?;
        Ok(Resolved {
            config,
            version,
            origin: Origin::Fallback,
            source_name: format!("{} (fallback)", fallback.name()),
        })
    }

    pub async fn fingerprint(&self) -> Fingerprint {
        let primary = self.primary.current_version().await.ok();
        let fallback = match self.fallback {
            Some(ref fallback) => fallback.current_version().await.ok(),
            None => None,
        };
        Fingerprint { primary, fallback }
    }

}

/// Tracks the sources' content between polls of the refresh loop.
///
/// A reload happens only when a source file's raw content changed since
/// the last poll, and a reloaded config is handed out only when it differs
/// from the active one. An invalid primary with a fallback in use is
/// therefore loaded once, not once per poll.
pub struct ConfigWatcher {
    resolver: ConfigResolver,
    seen: Fingerprint,
}

impl ConfigWatcher {
    /// Loads the initial config and records what the sources held.
    pub async fn start(resolver: ConfigResolver) -> Result<(Self, Resolved), GourmetError> {
        let seen = resolver.fingerprint().await;
        let resolved = resolver.load_with_fallback().await?;
        Ok((Self { resolver, seen }, resolved))
    }

    /// Returns a config to swap in, or `None` when nothing changed.
    pub async fn poll(
        &mut self,
        active_version: &ConfigVersion,
        active_origin: Origin,
    ) -> Result<Option<Resolved>, GourmetError> {
        let current = self.resolver.fingerprint().await;
        if current == self.seen {
            return Ok(None);
        }
        self.seen = current;
        tracing::info!("config change detected, reloading");

        let resolved = self.resolver.load_with_fallback().await?;
        if resolved.version == *active_version && resolved.origin == active_origin {
            tracing::debug!("reloaded config matches the active one");
            return Ok(None);
        }
        Ok(Some(resolved))
    }
}
