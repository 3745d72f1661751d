//! Deployment configuration loaded from TOML.

use crate::{ConfigError, KickAfter, KickPolicy, NeverKick};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tabletop_piles::{BufferStrategy, Fresh, Pooled, TurnOrderOptions};
use tracing::{debug, info, instrument};

/// Top-level configuration.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct TabletopConfig {
    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    log_filter: String,

    /// Pile storage settings.
    #[serde(default)]
    piles: PileSettings,

    /// Turn order policy for games that use one.
    #[serde(default)]
    turn_order: TurnOrderOptions,

    /// Undeliverable-message settings.
    #[serde(default)]
    outbox: OutboxSettings,
}

/// Pile storage settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct PileSettings {
    /// Reuse released pile buffers instead of allocating new ones.
    #[serde(default)]
    pooled: bool,
}

/// Undeliverable-message settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct OutboxSettings {
    /// Kick a player once this many messages are waiting; unset never kicks.
    #[serde(default)]
    auto_kick_after: Option<usize>,
}

impl Default for TabletopConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            piles: PileSettings::default(),
            turn_order: TurnOrderOptions::default(),
            outbox: OutboxSettings::default(),
        }
    }
}

#[instrument]
fn default_log_filter() -> String {
    "info".to_string()
}

impl TabletopConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml_str(&content)?;
        info!(pooled = config.piles.pooled, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid configuration.
    #[instrument(skip(content))]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.outbox.auto_kick_after == Some(0) {
            return Err(ConfigError::new(
                "outbox.auto_kick_after must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the buffer strategy piles should use, sharing `pool` when
    /// pooling is enabled.
    pub fn buffer_strategy<T: Send + 'static>(&self, pool: &Pooled<T>) -> Arc<dyn BufferStrategy<T>> {
        if self.piles.pooled {
            Arc::new(pool.clone())
        } else {
            Arc::new(Fresh)
        }
    }

    /// Returns the kick policy for new outboxes.
    pub fn kick_policy(&self) -> Arc<dyn KickPolicy> {
        match self.outbox.auto_kick_after {
            Some(limit) => Arc::new(KickAfter(limit)),
            None => Arc::new(NeverKick),
        }
    }
}
