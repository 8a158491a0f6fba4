//! Configuration Loader
//!
//! Environment-aware layered loading: a base file, an environment overlay,
//! then `INVOKER__`-prefixed environment variables, merged in that order and
//! validated before use.

use super::error::ConfigResult;
use super::InvokerConfig;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded, validated configuration plus where it came from.
#[derive(Debug)]
pub struct ConfigManager {
    config: InvokerConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection.
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory.
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load from a specific directory with an explicit environment.
    ///
    /// Useful in tests, which should not mutate process-global environment
    /// variables to pick an overlay.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let base = config_directory.join("invoker-core");
        let overlay = config_directory.join(format!("invoker-core.{environment}"));

        let config: InvokerConfig = config::Config::builder()
            .add_source(config::File::from(base).required(false))
            .add_source(config::File::from(overlay).required(false))
            .add_source(
                config::Environment::with_prefix("INVOKER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        info!(
            environment = %environment,
            failure_threshold = config.circuit_breaker.failure_threshold,
            max_concurrent_tasks = config.execution.max_concurrent_tasks,
            "✅ Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// The loaded configuration.
    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &PathBuf {
        &self.config_directory
    }

    /// Environment name from `INVOKER_ENV`, then `APP_ENV`, defaulting to
    /// "development".
    pub fn detect_environment() -> String {
        env::var("INVOKER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        PathBuf::from("config")
    }
}
