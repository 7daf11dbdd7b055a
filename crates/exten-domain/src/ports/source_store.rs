//! Source Store Port
//!
//! Defines where unit and library text comes from and how the engine learns
//! that it changed.

use crate::error::Result;
use crate::events::{ChangeFeed, SourceChanged};
use crate::value_objects::UnitDefinition;

/// Source store interface
///
/// Paths returned by the store are opaque to the engine except for equality:
/// they are used as cache keys for libraries and matched verbatim against
/// change notifications.
pub trait SourceStore: Send + Sync {
    /// Text of the unit behind `definition`, or `None` if the store has none
    fn resolve_source_text(&self, definition: &UnitDefinition) -> Result<Option<String>>;

    /// Store path of the unit behind `definition`
    fn resolve_source_path(&self, definition: &UnitDefinition) -> Result<String>;

    /// Text of a referenced file (library or plain reference) at a resolved path
    fn resolve_reference_text(&self, definition: &UnitDefinition, path: &str) -> Result<String>;

    /// Resolve a path written inside a unit relative to the file that wrote it
    fn resolve_reference_path(
        &self,
        definition: &UnitDefinition,
        relative_path: &str,
        base_path: Option<&str>,
    ) -> Result<String>;

    /// Change notifications, one per changed path; `None` if the store never changes
    fn change_feed(&self) -> Option<&ChangeFeed<SourceChanged>> {
        None
    }

    /// Short name for diagnostics
    fn store_name(&self) -> &str;
}
