//! Root configuration

use super::{FactoryConfig, LoggingConfig, PreprocessorConfig, RegistryConfig, SourceConfig};
use serde::{Deserialize, Serialize};

/// Complete engine configuration, one field per TOML section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Unit factory behavior
    pub factory: FactoryConfig,

    /// Extension registry behavior
    pub registry: RegistryConfig,

    /// Directive preprocessor settings
    pub preprocessor: PreprocessorConfig,

    /// Directory-backed source store
    pub source: SourceConfig,

    /// Logging
    pub logging: LoggingConfig,
}
