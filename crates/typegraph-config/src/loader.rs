//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.typegraph/config.toml`
//! 2. Local config: `.typegraph/config.toml` (in the working directory)
//! 3. Programmatic overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{ConfigOverrides, EngineConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
const GLOBAL_CONFIG_DIR: &str = ".typegraph";

/// Local configuration directory name.
const LOCAL_CONFIG_DIR: &str = ".typegraph";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.typegraph`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<EngineConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.typegraph`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a working directory.
    pub fn local_config_path(&self, working_dir: &Path) -> PathBuf {
        working_dir.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a working directory with optional overrides.
    ///
    /// Merges config in order: global -> local -> overrides.
    pub fn load(
        &mut self,
        working_dir: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<EngineConfig, ConfigError> {
        let mut config = EngineConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(working_dir)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;

        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<EngineConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("no home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;

        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a working directory.
    pub fn load_local(&self, working_dir: &Path) -> Result<Option<EngineConfig>, ConfigError> {
        let local_path = self.local_config_path(working_dir);

        if !local_path.exists() {
            trace!("local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Save configuration to the global config file.
    pub fn save_global(&self, config: &EngineConfig) -> Result<(), ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        let global_path = global_dir.join(CONFIG_FILE_NAME);
        save_config_file(&global_path, config)
    }

    /// Save configuration to the local config file for a working directory.
    pub fn save_local(
        &self,
        working_dir: &Path,
        config: &EngineConfig,
    ) -> Result<(), ConfigError> {
        let local_path = self.local_config_path(working_dir);
        save_config_file(&local_path, config)
    }

    /// Initialize global configuration directory.
    ///
    /// Creates `~/.typegraph/config.toml` with default configuration.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        if !global_dir.exists() {
            std::fs::create_dir_all(global_dir)
                .map_err(|e| ConfigError::create_dir(global_dir, e))?;
        }

        let config_path = global_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            let default_config = EngineConfig::default();
            save_config_file(&config_path, &default_config)?;
        }

        Ok(config_path)
    }

    /// Initialize local configuration for a working directory.
    ///
    /// Creates `.typegraph/config.toml` with default configuration.
    pub fn init_local(&self, working_dir: &Path) -> Result<PathBuf, ConfigError> {
        let local_dir = working_dir.join(LOCAL_CONFIG_DIR);

        if !local_dir.exists() {
            std::fs::create_dir_all(&local_dir)
                .map_err(|e| ConfigError::create_dir(&local_dir, e))?;
        }

        let config_path = local_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            let default_config = EngineConfig::default();
            save_config_file(&config_path, &default_config)?;
        }

        Ok(config_path)
    }

    /// Clear cached global configuration.
    ///
    /// Forces reload on next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &EngineConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// This performs a field-by-field merge, allowing partial configs.
fn merge_configs(base: EngineConfig, overlay: EngineConfig) -> EngineConfig {
    EngineConfig {
        schema: merge_schema(base.schema, overlay.schema),
        pipeline: merge_pipeline(base.pipeline, overlay.pipeline),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

/// Merge schema config, overlay values override base.
fn merge_schema(base: crate::SchemaConfig, overlay: crate::SchemaConfig) -> crate::SchemaConfig {
    crate::SchemaConfig {
        auto_migrate: overlay.auto_migrate,
        throw_on_breaking: overlay.throw_on_breaking,
    }
}

/// Merge pipeline config.
fn merge_pipeline(
    base: crate::PipelineConfig,
    overlay: crate::PipelineConfig,
) -> crate::PipelineConfig {
    crate::PipelineConfig {
        batch_size: if overlay.batch_size != 500 {
            overlay.batch_size
        } else {
            base.batch_size
        },
        default_temporal_mode: overlay.default_temporal_mode,
    }
}

/// Merge logging config.
fn merge_logging(base: crate::LoggingConfig, overlay: crate::LoggingConfig) -> crate::LoggingConfig {
    crate::LoggingConfig {
        level: if overlay.level != "info" {
            overlay.level
        } else {
            base.level
        },
        format: overlay.format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config(content: &str, dir: &Path, filename: &str) -> PathBuf {
        let config_dir = dir.join(".typegraph");
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join(filename);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_default_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.pipeline.batch_size, 500);
        assert!(!config.schema.auto_migrate);
    }

    #[test]
    fn load_local_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        create_test_config(
            r#"
            [pipeline]
            batch_size = 250

            [schema]
            auto_migrate = true
            "#,
            temp.path(),
            "config.toml",
        );

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.pipeline.batch_size, 250);
        assert!(config.schema.auto_migrate);
    }

    #[test]
    fn global_overrides_default() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
            [logging]
            level = "debug"

            [pipeline]
            batch_size = 100
            "#,
        )
        .unwrap();

        create_test_config(
            r#"
            [pipeline]
            batch_size = 50
            "#,
            temp.path(),
            "config.toml",
        );

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.pipeline.batch_size, 50);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn overrides_apply_last() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let overrides = ConfigOverrides {
            log_level: Some("trace".to_string()),
            batch_size: Some(42),
            ..Default::default()
        };

        let config = loader.load(temp.path(), Some(&overrides)).unwrap();

        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.pipeline.batch_size, 42);
    }

    #[test]
    fn save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let mut config = EngineConfig::default();
        config.pipeline.batch_size = 77;
        config.logging.level = "warn".to_string();

        loader.save_local(temp.path(), &config).unwrap();

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let loaded = loader.load(temp.path(), None).unwrap();

        assert_eq!(loaded.pipeline.batch_size, 77);
        assert_eq!(loaded.logging.level, "warn");
    }

    #[test]
    fn init_local_creates_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config_path = loader.init_local(temp.path()).unwrap();

        assert!(config_path.exists());
        assert!(config_path.ends_with(".typegraph/config.toml"));

        let content = std::fs::read_to_string(&config_path).unwrap();
        let _: EngineConfig = toml::from_str(&content).unwrap();
    }

    #[test]
    fn cache_clearing() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let mut loader = ConfigLoader::with_global_dir(&global_dir);

        let _ = loader.load_global().unwrap();
        assert!(loader.global_config.is_some());

        loader.clear_cache();
        assert!(loader.global_config.is_none());
    }
}
