//! Configuration loader
//!
//! Loads [`EngineConfig`] from defaults, a TOML file and the environment
//! with Figment, then validates it.

use crate::config::{
    EngineConfig, FactoryConfig, LoggingConfig, PreprocessorConfig, RegistryConfig, SourceConfig,
};
use crate::constants::{
    CONFIG_ENV_PREFIX, CONFIG_ENV_SEPARATOR, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILENAME,
};
use crate::error_ext::ErrorContext;
use crate::logging::{log_config_loaded, parse_log_level};
use exten_domain::error::{Error, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader service
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Configuration file path
    config_path: Option<PathBuf>,

    /// Environment prefix
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new configuration loader with default settings
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: CONFIG_ENV_PREFIX.to_string(),
        }
    }

    /// Set the configuration file path
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources
    ///
    /// Configuration sources are merged in this order (later sources override earlier):
    /// 1. Default values from `EngineConfig::default()`
    /// 2. TOML configuration file (explicit path, or `exten.toml` if found)
    /// 3. Environment variables, e.g. `EXTEN_FACTORY__ENABLE_HOT_RELOAD=false`
    pub fn load(&self) -> Result<EngineConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(EngineConfig::default()));

        if let Some(config_path) = &self.config_path {
            if config_path.exists() {
                figment = figment.merge(Toml::file(config_path));
                log_config_loaded(config_path, true);
            } else {
                log_config_loaded(config_path, false);
            }
        } else if let Some(default_path) = Self::find_default_config_path() {
            figment = figment.merge(Toml::file(&default_path));
            log_config_loaded(&default_path, true);
        }

        // Single underscore ends the prefix, double underscore nests
        figment = figment.merge(
            Env::prefixed(&format!("{}_", self.env_prefix)).split(CONFIG_ENV_SEPARATOR),
        );

        let config: EngineConfig = figment
            .extract()
            .config_context("Failed to extract configuration")?;

        validate_engine_config(&config)?;
        Ok(config)
    }

    /// Reload configuration from the same sources
    pub fn reload(&self) -> Result<EngineConfig> {
        self.load()
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, config: &EngineConfig, path: P) -> Result<()> {
        let toml_string =
            toml::to_string_pretty(config).config_context("Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), toml_string).io_context("Failed to write config file")?;

        Ok(())
    }

    /// Get the current configuration file path
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// First existing default configuration file
    fn find_default_config_path() -> Option<PathBuf> {
        let current_dir = env::current_dir().ok()?;

        let candidates = [
            Some(current_dir.join(DEFAULT_CONFIG_FILENAME)),
            Some(
                current_dir
                    .join(DEFAULT_CONFIG_DIR)
                    .join(DEFAULT_CONFIG_FILENAME),
            ),
            dirs::config_dir().map(|d| d.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILENAME)),
        ];

        candidates.into_iter().flatten().find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate every configuration section
pub fn validate_engine_config(config: &EngineConfig) -> Result<()> {
    validate_source_config(&config.source)?;
    validate_preprocessor_config(&config.preprocessor)?;
    parse_log_level(&config.logging.level)?;
    Ok(())
}

fn validate_source_config(config: &SourceConfig) -> Result<()> {
    let extension = config.unit_extension.trim();
    if extension.is_empty() {
        return Err(Error::configuration("Unit extension cannot be empty"));
    }
    if extension.starts_with('.') {
        return Err(Error::configuration(format!(
            "Unit extension must not start with a dot: {extension}"
        )));
    }
    Ok(())
}

fn validate_preprocessor_config(config: &PreprocessorConfig) -> Result<()> {
    if config.enable_library_units && config.library_suffix.trim().is_empty() {
        return Err(Error::configuration(
            "Library suffix cannot be empty when library units are enabled",
        ));
    }
    if config
        .removed_regions
        .iter()
        .any(|region| region.trim().is_empty())
    {
        return Err(Error::configuration("Removed region names cannot be empty"));
    }
    Ok(())
}

/// Configuration builder for programmatic configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: EngineConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factory(mut self, factory: FactoryConfig) -> Self {
        self.config.factory = factory;
        self
    }

    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.config.registry = registry;
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: PreprocessorConfig) -> Self {
        self.config.preprocessor = preprocessor;
        self
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.config.source = source;
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Point the source store at `root_dir`
    pub fn with_root_dir<P: Into<PathBuf>>(mut self, root_dir: P) -> Self {
        self.config.source.root_dir = root_dir.into();
        self
    }

    pub fn with_hot_reload(mut self, enabled: bool) -> Self {
        self.config.factory.enable_hot_reload = enabled;
        self.config.source.watch = enabled;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<EngineConfig> {
        validate_engine_config(&self.config)?;
        Ok(self.config)
    }
}
