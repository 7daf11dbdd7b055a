//! In-memory source store

use super::paths::{resolve_relative, unit_path};
use crate::constants::DEFAULT_UNIT_EXTENSION;
use exten_domain::UnitDefinition;
use exten_domain::error::{Error, Result};
use exten_domain::events::{ChangeFeed, SourceChanged};
use exten_domain::ports::SourceStore;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Source store backed by a map
///
/// Every write publishes a [`SourceChanged`] notification synchronously,
/// so hot reload is observable as soon as the write returns.
#[derive(Debug)]
pub struct InMemorySourceStore {
    files: RwLock<HashMap<String, String>>,
    unit_extension: String,
    changes: ChangeFeed<SourceChanged>,
}

impl InMemorySourceStore {
    pub fn new() -> Self {
        Self::with_unit_extension(DEFAULT_UNIT_EXTENSION)
    }

    pub fn with_unit_extension<S: Into<String>>(extension: S) -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            unit_extension: extension.into(),
            changes: ChangeFeed::new(),
        }
    }

    /// Store path of the unit with `key`
    pub fn unit_path(&self, key: &str) -> String {
        unit_path(key, &self.unit_extension)
    }

    /// Write the unit with `key` and notify listeners
    pub fn insert_unit(&self, key: &str, text: &str) {
        self.insert(&self.unit_path(key), text);
    }

    /// Write a file and notify listeners
    pub fn insert(&self, path: &str, text: &str) {
        self.insert_silently(path, text);
        debug!(path = %path, "Source updated");
        self.changes.publish(&SourceChanged::new(path));
    }

    /// Write a file without notifying anybody
    pub fn insert_silently(&self, path: &str, text: &str) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), text.to_string());
    }

    /// Delete a file; listeners are notified if it existed
    pub fn remove(&self, path: &str) -> Option<String> {
        let removed = self
            .files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
        if removed.is_some() {
            self.changes.publish(&SourceChanged::new(path));
        }
        removed
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    /// Stored paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    fn read(&self, path: &str) -> Option<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }
}

impl Default for InMemorySourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceStore for InMemorySourceStore {
    fn resolve_source_text(&self, definition: &UnitDefinition) -> Result<Option<String>> {
        Ok(self.read(&self.unit_path(definition.key())))
    }

    fn resolve_source_path(&self, definition: &UnitDefinition) -> Result<String> {
        Ok(self.unit_path(definition.key()))
    }

    fn resolve_reference_text(&self, _definition: &UnitDefinition, path: &str) -> Result<String> {
        self.read(path)
            .ok_or_else(|| Error::not_found(format!("referenced source {path}")))
    }

    fn resolve_reference_path(
        &self,
        _definition: &UnitDefinition,
        relative_path: &str,
        base_path: Option<&str>,
    ) -> Result<String> {
        resolve_relative(base_path, relative_path)
    }

    fn change_feed(&self) -> Option<&ChangeFeed<SourceChanged>> {
        Some(&self.changes)
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}
