//! Directive preprocessor
//!
//! Line-oriented preprocessing of unit text:
//!
//! | Directive | Effect |
//! |-----------|--------|
//! | `#load "path"` | library unit if `path` ends with the library suffix, plain reference otherwise; the line is commented out |
//! | `#load "_name"` | commented out and dropped when underscore loads are excluded |
//! | `#region name` ... `#endregion` | every line commented out when `name` is a removed region |
//! | `using name;` | recorded as an import, line kept |
//!
//! Directives are only recognized before a `//` or `/*` comment on the same line.

use crate::config::PreprocessorConfig;
use crate::constants::{
    BLOCK_COMMENT, ENDREGION_DIRECTIVE, IMPORT_KEYWORD, LINE_COMMENT, LOAD_DIRECTIVE,
    REGION_DIRECTIVE,
};
use exten_domain::PreprocessResult;
use exten_domain::error::Result;
use exten_domain::ports::Preprocessor;
use tracing::trace;

/// Preprocessor for `#load`, `#region` and `using` directives
#[derive(Debug, Clone, Default)]
pub struct DirectivePreprocessor {
    config: PreprocessorConfig,
}

impl DirectivePreprocessor {
    pub fn new(config: PreprocessorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessorConfig {
        &self.config
    }

    pub fn with_exclude_underscore_loads(mut self, exclude: bool) -> Self {
        self.config.exclude_underscore_loads = exclude;
        self
    }

    pub fn with_library_units(mut self, enabled: bool) -> Self {
        self.config.enable_library_units = enabled;
        self
    }

    /// Add regions to the removed set
    pub fn with_removed_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .removed_regions
            .extend(regions.into_iter().map(Into::into));
        self
    }

    pub fn with_auto_imports(mut self, enabled: bool) -> Self {
        self.config.auto_imports = enabled;
        self
    }

    fn is_removed_region(&self, open_regions: &[String]) -> bool {
        open_regions
            .iter()
            .any(|open| self.config.removed_regions.contains(open))
    }

    fn is_excluded_load(&self, path: &str) -> bool {
        self.config.exclude_underscore_loads && file_name(path).starts_with('_')
    }
}

/// The part of a line that may hold a directive
fn directive_part(line: &str) -> &str {
    let trimmed = line.trim_start();
    let end = [LINE_COMMENT, BLOCK_COMMENT]
        .iter()
        .filter_map(|marker| trimmed.find(marker))
        .min()
        .unwrap_or(trimmed.len());
    trimmed[..end].trim_end()
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// `using name;` to `name`; `using (...)` statements are not imports
fn parse_import(directive: &str) -> Option<&str> {
    let rest = directive.strip_prefix(IMPORT_KEYWORD)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name = rest.trim().strip_suffix(';')?.trim();
    (!name.is_empty() && !name.contains('(')).then_some(name)
}

fn commented(line: &str) -> String {
    format!("{LINE_COMMENT}{line}")
}

impl Preprocessor for DirectivePreprocessor {
    fn preprocess(&self, text: &str) -> Result<PreprocessResult> {
        let mut result = PreprocessResult::default();
        let mut body = Vec::new();
        let mut open_regions: Vec<String> = Vec::new();

        for line in text.lines() {
            let directive = directive_part(line);

            if let Some(name) = directive.strip_prefix(REGION_DIRECTIVE) {
                open_regions.push(name.trim().to_string());
            }
            if self.is_removed_region(&open_regions) {
                body.push(commented(line));
                if directive.starts_with(ENDREGION_DIRECTIVE) {
                    open_regions.pop();
                }
                continue;
            }
            if directive.starts_with(ENDREGION_DIRECTIVE) {
                open_regions.pop();
                body.push(line.to_string());
                continue;
            }

            if let Some(rest) = directive.strip_prefix(LOAD_DIRECTIVE) {
                let path = rest.trim().trim_matches('"');
                if self.is_excluded_load(path) {
                    trace!(path = %path, "Dropped underscore load");
                } else if self.is_library_path(path) {
                    result.libraries.push(path.to_string());
                } else {
                    result.references.push(path.to_string());
                }
                body.push(commented(line));
                continue;
            }

            if self.config.auto_imports
                && let Some(import) = parse_import(directive)
                && !result.imports.iter().any(|known| known == import)
            {
                result.imports.push(import.to_string());
            }
            body.push(line.to_string());
        }

        result.text = body.join("\n");
        Ok(result)
    }

    fn is_library_path(&self, path: &str) -> bool {
        self.config.enable_library_units
            && !self.config.library_suffix.is_empty()
            && path.ends_with(&self.config.library_suffix)
    }
}
