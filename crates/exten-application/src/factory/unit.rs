//! Compiled units
//!
//! A [`CompiledUnit`] is created uncompiled and compiles on first use. The
//! first caller takes the unit's compile lock; everybody else waits on it and
//! observes the outcome. A failed compile is terminal for the unit.

use super::library::{CompiledLibrary, LibraryCache, transitive_closure};
use super::locks::TouchedPaths;
use arc_swap::ArcSwap;
use exten_domain::error::{Error, Result};
use exten_domain::ports::{ArtifactKind, CompileRequest, ReferencedSource, ScriptArtifact};
use exten_domain::{PreprocessResult, UnitDefinition};
use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Builds restarted because sources changed mid-compile, before giving up
const MAX_BUILD_ATTEMPTS: usize = 8;

/// Result of a successful compilation
pub struct CompiledState {
    artifact: Arc<dyn ScriptArtifact>,
    dependencies: Vec<Arc<CompiledLibrary>>,
    reference_paths: Vec<String>,
}

/// Lifecycle state of a unit
pub enum UnitState {
    Uncompiled,
    Compiled(CompiledState),
    /// Compilation failed; `paths` are the library and reference paths that
    /// were involved, so a change to any of them evicts the unit
    Error {
        message: String,
        paths: Vec<String>,
    },
    Disposed,
}

impl fmt::Debug for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uncompiled => f.write_str("Uncompiled"),
            Self::Compiled(state) => f
                .debug_struct("Compiled")
                .field("dependencies", &state.dependencies.len())
                .field("reference_paths", &state.reference_paths)
                .finish(),
            Self::Error { message, .. } => f.debug_tuple("Error").field(message).finish(),
            Self::Disposed => f.write_str("Disposed"),
        }
    }
}

/// A unit resolved from the source store, compiled lazily
pub struct CompiledUnit {
    definition: UnitDefinition,
    preprocessed: PreprocessResult,
    source_path: String,
    state: ArcSwap<UnitState>,
    compile_lock: AsyncMutex<()>,
    libraries: Arc<LibraryCache>,
}

impl CompiledUnit {
    pub(crate) fn new(
        definition: UnitDefinition,
        preprocessed: PreprocessResult,
        source_path: String,
        libraries: Arc<LibraryCache>,
    ) -> Self {
        Self {
            definition,
            preprocessed,
            source_path,
            state: ArcSwap::from_pointee(UnitState::Uncompiled),
            compile_lock: AsyncMutex::new(()),
            libraries,
        }
    }

    pub fn definition(&self) -> &UnitDefinition {
        &self.definition
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Preprocessed text this unit compiles from
    pub fn preprocessed(&self) -> &PreprocessResult {
        &self.preprocessed
    }

    /// Whether the unit has no logic; such a unit never compiles and yields no output
    pub fn is_logic_empty(&self) -> bool {
        self.preprocessed.is_blank()
    }

    pub fn is_compiled(&self) -> bool {
        matches!(**self.state.load(), UnitState::Compiled(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(**self.state.load(), UnitState::Error { .. })
    }

    pub fn is_disposed(&self) -> bool {
        matches!(**self.state.load(), UnitState::Disposed)
    }

    /// Snapshot of the current state
    pub fn state(&self) -> Arc<UnitState> {
        self.state.load_full()
    }

    /// Libraries this unit was compiled against, transitively; empty until compiled
    pub fn dependencies(&self) -> Vec<Arc<CompiledLibrary>> {
        match &**self.state.load() {
            UnitState::Compiled(state) => state.dependencies.clone(),
            _ => Vec::new(),
        }
    }

    /// Resolved paths of the plain references this unit pulled in
    pub fn reference_paths(&self) -> Vec<String> {
        match &**self.state.load() {
            UnitState::Compiled(state) => state.reference_paths.clone(),
            UnitState::Error { paths, .. } => paths.clone(),
            _ => Vec::new(),
        }
    }

    /// Whether a change to `path` invalidates this unit
    pub(crate) fn is_affected_by(
        &self,
        path: &str,
        removed: &HashSet<*const CompiledLibrary>,
    ) -> bool {
        if self.source_path == path {
            return true;
        }
        match &**self.state.load() {
            UnitState::Compiled(state) => {
                state.reference_paths.iter().any(|p| p == path)
                    || state.dependencies.iter().any(|library| {
                        library.path() == path || removed.contains(&Arc::as_ptr(library))
                    })
            }
            UnitState::Error { paths, .. } => paths.iter().any(|p| p == path),
            UnitState::Uncompiled | UnitState::Disposed => false,
        }
    }

    /// Compile the unit if it is not compiled yet
    ///
    /// Concurrent callers share one compilation. Cancelling one caller's
    /// token only aborts that caller; the unit stays uncompiled and the next
    /// caller retries. When a library or reference changes while the unit
    /// compiles, the build starts over against the new sources. When the unit
    /// itself is evicted meanwhile, the result is discarded and the call
    /// fails with `Disposed`.
    pub async fn compile(&self, cancel: &CancellationToken) -> Result<()> {
        if self.is_logic_empty() || self.check_state()? {
            return Ok(());
        }

        let _guard = tokio::select! {
            guard = self.compile_lock.lock() => guard,
            () = cancel.cancelled() => {
                return Err(Error::cancelled(format!("compile unit {}", self.definition)));
            }
        };
        if self.check_state()? {
            return Ok(());
        }
        let uncompiled = self.state.load_full();

        for _ in 0..MAX_BUILD_ATTEMPTS {
            let mut touched = TouchedPaths::default();
            let built = self.build(cancel, &mut touched).await;
            if let Err(e @ Error::Cancelled { .. }) = built {
                return Err(e);
            }

            // Installed under the global lock, so an eviction either sees the
            // new state or has already bumped a generation this build read.
            let verdict = {
                let global = self.libraries.locks().global();
                if touched.is_current(&global) {
                    let (next, outcome) = match built {
                        Ok(state) => (UnitState::Compiled(state), Ok(())),
                        Err(e) => (
                            UnitState::Error {
                                message: e.to_string(),
                                paths: touched.paths(),
                            },
                            Err(e),
                        ),
                    };
                    let previous = self.state.compare_and_swap(&uncompiled, Arc::new(next));
                    Some((Arc::ptr_eq(&*previous, &uncompiled), outcome))
                } else {
                    None
                }
            };

            match verdict {
                None => {
                    debug!(unit = %self.definition, "Sources changed while compiling; rebuilding");
                }
                Some((false, _)) => {
                    debug!(unit = %self.definition, "Unit evicted while compiling");
                    return Err(Error::disposed(format!("unit {}", self.definition)));
                }
                Some((true, Ok(()))) => {
                    debug!(
                        unit = %self.definition,
                        dependencies = self.dependencies().len(),
                        "Compiled unit"
                    );
                    return Ok(());
                }
                Some((true, Err(e))) => {
                    warn!(unit = %self.definition, error = %e, "Unit compilation failed");
                    return Err(e);
                }
            }
        }
        Err(Error::compilation(format!(
            "sources of unit {} kept changing during compilation",
            self.definition
        )))
    }

    /// `Ok(true)` when there is nothing left to compile
    fn check_state(&self) -> Result<bool> {
        match &**self.state.load() {
            UnitState::Uncompiled => Ok(false),
            UnitState::Compiled(_) => Ok(true),
            UnitState::Error { message, .. } => Err(Error::compilation(format!(
                "Unit {} failed to compile earlier: {message}",
                self.definition
            ))),
            UnitState::Disposed => Err(Error::disposed(format!("unit {}", self.definition))),
        }
    }

    async fn build(
        &self,
        cancel: &CancellationToken,
        touched: &mut TouchedPaths,
    ) -> Result<CompiledState> {
        let env = self.libraries.environment();

        let mut direct = Vec::with_capacity(self.preprocessed.libraries.len());
        for declared in &self.preprocessed.libraries {
            let path = env.store.resolve_reference_path(
                &self.definition,
                declared,
                Some(&self.source_path),
            )?;
            let library = self
                .libraries
                .compile(&self.definition, &path, &[], touched, cancel)
                .await?;
            direct.push(library);
        }
        let dependencies = transitive_closure(&direct);

        let references = self.resolve_references(touched)?;
        let reference_paths = references.iter().map(|r| r.path.clone()).collect();

        let request = CompileRequest {
            definition: self.definition.clone(),
            kind: ArtifactKind::Script,
            path: self.source_path.clone(),
            text: self.preprocessed.text.clone(),
            imports: env.options.merged_imports(&self.preprocessed.imports),
            libraries: dependencies
                .iter()
                .map(|library| Arc::clone(library.artifact()))
                .collect(),
            references,
            external_references: env.options.references.clone(),
            input: self.definition.input(),
            output: self.definition.output(),
        };
        let artifact = env.compiler.compile(request, cancel).await?;

        Ok(CompiledState {
            artifact,
            dependencies,
            reference_paths,
        })
    }

    /// Plain references, followed transitively relative to the file that declared them
    fn resolve_references(&self, touched: &mut TouchedPaths) -> Result<Vec<ReferencedSource>> {
        let env = self.libraries.environment();
        let mut pending: VecDeque<(String, String)> = self
            .preprocessed
            .references
            .iter()
            .map(|declared| (declared.clone(), self.source_path.clone()))
            .collect();
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        while let Some((declared, base)) = pending.pop_front() {
            let path = env
                .store
                .resolve_reference_path(&self.definition, &declared, Some(&base))?;
            if !seen.insert(path.clone()) {
                continue;
            }
            touched.record(&path, self.libraries.locks().generation(&path));
            let text = env.store.resolve_reference_text(&self.definition, &path)?;
            let nested = env.preprocessor.preprocess(&text)?;
            pending.extend(
                nested
                    .references
                    .into_iter()
                    .map(|declared| (declared, path.clone())),
            );
            resolved.push(ReferencedSource {
                path,
                text: nested.text,
            });
        }
        Ok(resolved)
    }

    /// Invoke the unit with a typed input and output
    ///
    /// `I` and `O` must match the definition's shapes. A unit without logic
    /// returns `Ok(None)` without compiling.
    pub async fn invoke<I, O>(&self, input: I, cancel: &CancellationToken) -> Result<Option<O>>
    where
        I: Any + Send,
        O: Any,
    {
        if !self.definition.input().is::<I>() || !self.definition.output().is::<O>() {
            return Err(Error::resolution(format!(
                "Unit {} expects {} -> {}, invoked as {} -> {}",
                self.definition,
                self.definition.input(),
                self.definition.output(),
                std::any::type_name::<I>(),
                std::any::type_name::<O>(),
            )));
        }

        let Some(output) = self.invoke_erased(Box::new(input), cancel).await? else {
            return Ok(None);
        };
        output.downcast::<O>().map(|value| Some(*value)).map_err(|_| {
            Error::resolution(format!(
                "Unit {} returned a value that is not {}",
                self.definition,
                std::any::type_name::<O>()
            ))
        })
    }

    /// Invoke without shape checks
    pub async fn invoke_erased(
        &self,
        input: Box<dyn Any + Send>,
        cancel: &CancellationToken,
    ) -> Result<Option<Box<dyn Any + Send>>> {
        if let UnitState::Error { .. } = &**self.state.load() {
            self.check_state()?;
        }
        if self.is_logic_empty() {
            return Ok(None);
        }

        self.compile(cancel).await?;
        let artifact = match &**self.state.load() {
            UnitState::Compiled(state) => Arc::clone(&state.artifact),
            UnitState::Disposed => {
                return Err(Error::disposed(format!("unit {}", self.definition)));
            }
            _ => {
                return Err(Error::internal(format!(
                    "unit {} is not compiled after compile",
                    self.definition
                )));
            }
        };
        artifact.invoke(input, cancel).await
    }

    /// Release the artifact; later compile or invoke calls fail with `Disposed`
    pub(crate) fn dispose(&self) {
        self.state.store(Arc::new(UnitState::Disposed));
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("definition", &self.definition)
            .field("source_path", &self.source_path)
            .field("state", &**self.state.load())
            .finish_non_exhaustive()
    }
}
