//! Unit factory options

use exten_domain::UnitDefinition;

/// Read-only inputs of the unit factory
#[derive(Debug, Clone)]
pub struct FactoryOptions {
    /// Evict cached units when the source store reports a change
    pub enable_hot_reload: bool,
    /// Reject definitions that were not pre-registered
    pub allow_only_defined_units: bool,
    /// Pre-registered definitions
    pub definitions: Vec<UnitDefinition>,
    /// Imports added to every compilation
    pub imports: Vec<String>,
    /// External references added to every compilation
    pub references: Vec<String>,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            enable_hot_reload: true,
            allow_only_defined_units: false,
            definitions: Vec::new(),
            imports: Vec::new(),
            references: Vec::new(),
        }
    }
}

impl FactoryOptions {
    pub fn with_hot_reload(mut self, enabled: bool) -> Self {
        self.enable_hot_reload = enabled;
        self
    }

    /// Only the given definitions may be resolved
    pub fn restricted_to<I>(mut self, definitions: I) -> Self
    where
        I: IntoIterator<Item = UnitDefinition>,
    {
        self.allow_only_defined_units = true;
        self.definitions.extend(definitions);
        self
    }

    pub fn with_definition(mut self, definition: UnitDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn with_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports.extend(imports.into_iter().map(Into::into));
        self
    }

    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references.extend(references.into_iter().map(Into::into));
        self
    }

    /// Declared imports followed by the configured ones, without duplicates
    pub(crate) fn merged_imports(&self, declared: &[String]) -> Vec<String> {
        let mut imports = declared.to_vec();
        for import in &self.imports {
            if !imports.contains(import) {
                imports.push(import.clone());
            }
        }
        imports
    }
}
