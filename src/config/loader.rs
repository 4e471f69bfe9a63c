//! Configuration Loader
//!
//! Environment-aware configuration loading on top of the `config` crate.
//! Sources are layered in this order, later sources overriding earlier ones:
//!
//! 1. built-in defaults (`#[serde(default)]` on every section)
//! 2. `<dir>/pipeline.yaml`
//! 3. `<dir>/pipeline.<environment>.yaml`
//! 4. `PIPELINE__`-prefixed environment variables, `__` separating nested keys
//!    (e.g. `PIPELINE__POLLING__INTERVAL_MS=250`)

use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::PipelineConfig;
use crate::constants::{CONFIG_FILE_STEM, DEFAULT_CONFIG_DIRECTORY, ENV_PREFIX};

/// Loaded, validated configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: PipelineConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory.
    ///
    /// An explicit directory must exist; the default one may be absent.
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = match config_dir {
            Some(dir) if !dir.is_dir() => {
                return Err(ConfigurationError::directory_not_found(dir.display().to_string()));
            }
            Some(dir) => dir,
            None => PathBuf::from(DEFAULT_CONFIG_DIRECTORY),
        };

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        crate::logging::log_config_loaded(environment, &config_directory, &config);

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Build a manager around an in-memory configuration, skipping file discovery
    pub fn from_config(config: PipelineConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: PathBuf::from(DEFAULT_CONFIG_DIRECTORY),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get the environment the configuration was loaded for
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the directory configuration files were read from
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Get current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("PIPELINE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<PipelineConfig> {
        let base_file = config_directory.join(format!("{CONFIG_FILE_STEM}.yaml"));
        let env_file = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.yaml"));

        debug!(
            base = %base_file.display(),
            overlay = %env_file.display(),
            "Merging configuration sources"
        );

        let merged = Config::builder()
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        merged
            .try_deserialize::<PipelineConfig>()
            .map_err(ConfigurationError::deserialize_error)
    }
}
