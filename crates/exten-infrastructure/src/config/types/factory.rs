//! Unit factory and registry configuration types

use exten_application::FactoryOptions;
use serde::{Deserialize, Serialize};

/// Unit factory configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FactoryConfig {
    /// Evict cached units when the source store reports a change
    pub enable_hot_reload: bool,

    /// Reject definitions that were not registered up front
    pub allow_only_defined_units: bool,

    /// Imports added to every compilation
    pub imports: Vec<String>,

    /// External references added to every compilation
    pub references: Vec<String>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            enable_hot_reload: true,
            allow_only_defined_units: false,
            imports: Vec::new(),
            references: Vec::new(),
        }
    }
}

impl FactoryConfig {
    /// Factory options carrying these settings and no pre-registered definitions
    pub fn to_options(&self) -> FactoryOptions {
        FactoryOptions {
            enable_hot_reload: self.enable_hot_reload,
            allow_only_defined_units: self.allow_only_defined_units,
            definitions: Vec::new(),
            imports: self.imports.clone(),
            references: self.references.clone(),
        }
    }
}

/// Extension registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Reject extension points that were not registered up front
    pub allow_only_preregistered_extensions: bool,
}
