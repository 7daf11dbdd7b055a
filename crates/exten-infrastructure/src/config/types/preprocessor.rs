//! Preprocessor configuration types

use crate::constants::{DEFAULT_LIBRARY_SUFFIX, DEFAULT_REMOVED_REGIONS};
use serde::{Deserialize, Serialize};

/// Directive preprocessor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PreprocessorConfig {
    /// Comment out `#load` lines whose file name starts with `_`
    pub exclude_underscore_loads: bool,

    /// Treat loads ending in `library_suffix` as library units
    pub enable_library_units: bool,

    /// Regions whose lines are commented out
    pub removed_regions: Vec<String>,

    /// Collect `using name;` lines as imports
    pub auto_imports: bool,

    /// Suffix marking a loaded path as a library unit
    pub library_suffix: String,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            exclude_underscore_loads: true,
            enable_library_units: true,
            removed_regions: DEFAULT_REMOVED_REGIONS
                .iter()
                .map(|region| (*region).to_string())
                .collect(),
            auto_imports: true,
            library_suffix: DEFAULT_LIBRARY_SUFFIX.to_string(),
        }
    }
}
