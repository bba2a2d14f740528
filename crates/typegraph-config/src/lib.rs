//! typegraph configuration management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.typegraph/config.toml`
//! - Local config: `.typegraph/config.toml` (in the working directory)
//! - Programmatic overrides via [`ConfigOverrides`]
//!
//! Configuration is merged in order: global -> local -> overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};

/// Root configuration for the typegraph engine.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Schema lifecycle configuration
    pub schema: SchemaConfig,

    /// Write pipeline configuration
    pub pipeline: PipelineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Validate the merged configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        Ok(())
    }
}

/// Controls how `ensureSchema` behaves when it encounters a changed
/// definition.
///
/// # Example TOML
///
/// ```toml
/// [schema]
/// auto_migrate = true
/// throw_on_breaking = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Apply safe (non-breaking) migrations without being asked.
    /// When `false`, a changed definition always yields `Pending`.
    pub auto_migrate: bool,

    /// Return a migration error instead of `EnsureOutcome::Breaking` when a
    /// breaking change is detected.
    pub throw_on_breaking: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            auto_migrate: false,
            throw_on_breaking: true,
        }
    }
}

/// Defaults applied to the write pipeline when a caller doesn't specify
/// them explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of items validated together before the batch cache is reset.
    pub batch_size: usize,

    /// Temporal mode used for queries that don't specify one.
    pub default_temporal_mode: DefaultTemporalMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            default_temporal_mode: DefaultTemporalMode::default(),
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which instances a query sees when no explicit `TemporalQuery` is given.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultTemporalMode {
    /// Only instances that are live and currently valid.
    #[default]
    Current,
    /// Live instances regardless of validity window.
    IncludeEnded,
    /// Everything, including soft-deleted instances.
    IncludeTombstones,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, ANSI-colored format
    #[default]
    Pretty,
    /// JSON structured logging
    Json,
}

/// Overrides applied on top of the merged file configuration.
///
/// Typically populated from CLI flags or environment variables by an
/// embedder; fields left as `None` leave the merged value untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override `schema.auto_migrate`
    pub auto_migrate: Option<bool>,

    /// Override `schema.throw_on_breaking`
    pub throw_on_breaking: Option<bool>,

    /// Override `pipeline.batch_size`
    pub batch_size: Option<usize>,

    /// Override `logging.level`
    pub log_level: Option<String>,
}

impl EngineConfig {
    /// Apply overrides to this configuration in place.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(auto_migrate) = overrides.auto_migrate {
            self.schema.auto_migrate = auto_migrate;
        }

        if let Some(throw_on_breaking) = overrides.throw_on_breaking {
            self.schema.throw_on_breaking = throw_on_breaking;
        }

        if let Some(batch_size) = overrides.batch_size {
            self.pipeline.batch_size = batch_size;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let mut cfg = EngineConfig::default();
        cfg.pipeline.batch_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn schema_defaults_match_conservative_migration_policy() {
        let cfg = EngineConfig::default();
        assert!(!cfg.schema.auto_migrate);
        assert!(cfg.schema.throw_on_breaking);
    }
}
