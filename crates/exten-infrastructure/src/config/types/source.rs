//! Source store configuration types

use crate::constants::{DEFAULT_SOURCE_ROOT, DEFAULT_UNIT_EXTENSION};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory-backed source store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding unit sources
    pub root_dir: PathBuf,

    /// File extension of unit sources, without the dot
    pub unit_extension: String,

    /// Watch the directory and report changes to the unit factory
    pub watch: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(DEFAULT_SOURCE_ROOT),
            unit_extension: DEFAULT_UNIT_EXTENSION.to_string(),
            watch: true,
        }
    }
}
