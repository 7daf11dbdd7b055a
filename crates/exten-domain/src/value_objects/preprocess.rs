//! Preprocessor output

/// Normalized unit text plus the metadata extracted from its directives
///
/// Produced fresh on every compile attempt; only the compiled artifact is
/// cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessResult {
    /// Text handed to the compiler
    pub text: String,
    /// Import directives, in declaration order
    pub imports: Vec<String>,
    /// Library unit paths, in declaration order
    pub libraries: Vec<String>,
    /// Plain-text reference paths, in declaration order
    pub references: Vec<String>,
}

impl PreprocessResult {
    /// Result with normalized text and no directives
    pub fn from_text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Whether the normalized text contains no logic at all
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
