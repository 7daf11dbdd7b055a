//! Static dependency analysis
//!
//! Walks a source directory without compiling anything and reports, for
//! every unit, the libraries it loads (dependencies first) and any cycle or
//! missing file on the way.

use exten_domain::error::{Error, Result};
use exten_domain::ports::{Preprocessor, SourceStore};
use exten_domain::{Shape, UnitDefinition};
use exten_infrastructure::source::FileSystemSourceStore;
use tracing::debug;

/// Dependency summary of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub key: String,
    pub path: String,
    /// Library paths, each after the libraries it loads
    pub libraries: Vec<String>,
    /// Plain references declared by the unit itself
    pub references: Vec<String>,
    /// First problem found while walking the library graph
    pub problem: Option<String>,
}

impl UnitReport {
    pub fn is_ok(&self) -> bool {
        self.problem.is_none()
    }
}

/// Report every non-library unit under the store's root, sorted by key
pub fn inspect_units(
    store: &FileSystemSourceStore,
    preprocessor: &dyn Preprocessor,
) -> Result<Vec<UnitReport>> {
    let mut reports = Vec::new();
    for key in store.unit_keys()? {
        let definition = UnitDefinition::new(key.as_str(), Shape::unit(), Shape::unit());
        let path = store.resolve_source_path(&definition)?;
        if preprocessor.is_library_path(&path) {
            continue;
        }
        let Some(text) = store.resolve_source_text(&definition)? else {
            continue;
        };
        let preprocessed = preprocessor.preprocess(&text)?;

        let mut walk = LibraryWalk {
            store,
            preprocessor,
            definition: &definition,
            ordered: Vec::new(),
        };
        let problem = preprocessed
            .libraries
            .iter()
            .try_for_each(|declared| {
                let resolved = store.resolve_reference_path(&definition, declared, Some(&path))?;
                walk.visit(&resolved, &mut Vec::new())
            })
            .err()
            .map(|e| e.to_string());

        let references = preprocessed
            .references
            .iter()
            .map(|declared| store.resolve_reference_path(&definition, declared, Some(&path)))
            .collect::<Result<Vec<_>>>()?;

        debug!(unit = %key, libraries = walk.ordered.len(), "Inspected unit");
        reports.push(UnitReport {
            key,
            path,
            libraries: walk.ordered,
            references,
            problem,
        });
    }
    Ok(reports)
}

struct LibraryWalk<'a> {
    store: &'a FileSystemSourceStore,
    preprocessor: &'a dyn Preprocessor,
    definition: &'a UnitDefinition,
    ordered: Vec<String>,
}

impl LibraryWalk<'_> {
    fn visit(&mut self, path: &str, stack: &mut Vec<String>) -> Result<()> {
        if stack.iter().any(|p| p == path) {
            return Err(Error::dependency_cycle(
                stack.iter().map(String::as_str).chain([path]),
            ));
        }
        if self.ordered.iter().any(|p| p == path) {
            return Ok(());
        }

        let text = self.store.resolve_reference_text(self.definition, path)?;
        let preprocessed = self.preprocessor.preprocess(&text)?;
        stack.push(path.to_string());
        for declared in &preprocessed.libraries {
            let resolved = self
                .store
                .resolve_reference_path(self.definition, declared, Some(path))?;
            self.visit(&resolved, stack)?;
        }
        stack.pop();
        self.ordered.push(path.to_string());
        Ok(())
    }
}
