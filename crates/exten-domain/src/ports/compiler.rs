//! Compiler/Executor Port
//!
//! The engine never compiles anything itself. It assembles a
//! [`CompileRequest`] and hands it to a [`ScriptCompiler`]; the returned
//! [`ScriptArtifact`] is what gets cached and invoked.

use crate::error::Result;
use crate::value_objects::{Shape, UnitDefinition};
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Dynamically typed value passed into and out of artifacts
pub type ScriptValue = Box<dyn Any + Send>;

/// What the compiler is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// An invocable unit
    Script,
    /// A library imported by other units, never invoked directly
    Library,
}

/// A plain-text file pulled in by a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencedSource {
    /// Store-resolved path
    pub path: String,
    /// Normalized text
    pub text: String,
}

/// Everything the compiler needs to build one artifact
#[derive(Clone)]
pub struct CompileRequest {
    /// Definition that triggered the compilation
    pub definition: UnitDefinition,
    pub kind: ArtifactKind,
    /// Store path of the text being compiled
    pub path: String,
    /// Normalized text
    pub text: String,
    /// Imports declared by the text plus configured imports
    pub imports: Vec<String>,
    /// Artifacts of every library this text depends on, transitively
    pub libraries: Vec<Arc<dyn ScriptArtifact>>,
    /// Plain-text references, transitively resolved
    pub references: Vec<ReferencedSource>,
    /// Externally configured references (host assemblies, modules, ...)
    pub external_references: Vec<String>,
    pub input: Shape,
    pub output: Shape,
}

impl fmt::Debug for CompileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileRequest")
            .field("definition", &self.definition)
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("imports", &self.imports)
            .field("libraries", &self.libraries.len())
            .field("references", &self.references.len())
            .field("external_references", &self.external_references)
            .finish_non_exhaustive()
    }
}

/// Compiler collaborator
#[async_trait]
pub trait ScriptCompiler: Send + Sync {
    /// Build an artifact; diagnostics are reported as [`crate::error::Error::Compilation`]
    async fn compile(
        &self,
        request: CompileRequest,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn ScriptArtifact>>;

    /// Short name for diagnostics
    fn compiler_name(&self) -> &str;
}

/// A compiled, invocable artifact
#[async_trait]
pub trait ScriptArtifact: Send + Sync {
    /// Run the artifact; `None` means the unit produced no value
    async fn invoke(
        &self,
        input: ScriptValue,
        cancel: &CancellationToken,
    ) -> Result<Option<ScriptValue>>;

    /// Access to the concrete artifact, used by compilers to read library declarations
    fn as_any(&self) -> &(dyn Any + Send + Sync);
}
