//! Preprocessor Port

use crate::error::Result;
use crate::value_objects::PreprocessResult;

/// Turns raw unit text into normalized text plus directive metadata
pub trait Preprocessor: Send + Sync {
    /// Normalize `text` and extract its imports, libraries and references
    fn preprocess(&self, text: &str) -> Result<PreprocessResult>;

    /// Whether `path` names a library unit rather than a plain reference
    fn is_library_path(&self, path: &str) -> bool;
}
