//! Events published by the engine and its collaborators

use crate::value_objects::UnitDefinition;

/// A source store reports that the text behind `path` changed
///
/// Delivered at least once per change; a store may coalesce bursts of
/// writes into one notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceChanged {
    /// Store-resolved path of the changed source
    pub path: String,
}

impl SourceChanged {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self { path: path.into() }
    }
}

/// The unit factory dropped a compiled unit from its cache
#[derive(Debug, Clone)]
pub struct UnitEvicted {
    /// Definition of the evicted unit
    pub definition: UnitDefinition,
    /// Source path the unit was compiled from
    pub source_path: String,
}
