//! Compiled library cache
//!
//! Libraries are units that other units import for shared declarations.
//! They form a DAG keyed by store path: each library is compiled once, its
//! dependencies first, and a path that shows up twice on the current import
//! stack is reported as a cycle instead of being compiled.

use super::locks::{LockTable, TouchedPaths};
use super::options::FactoryOptions;
use dashmap::DashMap;
use exten_domain::error::{Error, Result};
use exten_domain::ports::{
    ArtifactKind, CompileRequest, Preprocessor, ScriptArtifact, ScriptCompiler, SourceStore,
};
use exten_domain::{Shape, UnitDefinition};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Collaborators shared by every compilation of one factory
pub(crate) struct CompileEnvironment {
    pub(crate) store: Arc<dyn SourceStore>,
    pub(crate) preprocessor: Arc<dyn Preprocessor>,
    pub(crate) compiler: Arc<dyn ScriptCompiler>,
    pub(crate) options: FactoryOptions,
}

/// A compiled library and the libraries it was compiled against
pub struct CompiledLibrary {
    owner: UnitDefinition,
    path: String,
    artifact: Arc<dyn ScriptArtifact>,
    dependencies: Vec<Arc<CompiledLibrary>>,
}

impl CompiledLibrary {
    /// Definition whose compilation first pulled this library in
    pub fn owner(&self) -> &UnitDefinition {
        &self.owner
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn artifact(&self) -> &Arc<dyn ScriptArtifact> {
        &self.artifact
    }

    /// Direct dependencies in declaration order
    pub fn dependencies(&self) -> &[Arc<CompiledLibrary>] {
        &self.dependencies
    }

    /// This library and everything it depends on, dependencies first
    ///
    /// Shared sub-graphs are visited once.
    pub fn all_dependencies(self: &Arc<Self>) -> Vec<Arc<CompiledLibrary>> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        Self::collect(self, &mut seen, &mut ordered);
        ordered
    }

    fn collect(
        library: &Arc<CompiledLibrary>,
        seen: &mut HashSet<*const CompiledLibrary>,
        ordered: &mut Vec<Arc<CompiledLibrary>>,
    ) {
        if !seen.insert(Arc::as_ptr(library)) {
            return;
        }
        for dependency in &library.dependencies {
            Self::collect(dependency, seen, ordered);
        }
        ordered.push(Arc::clone(library));
    }

    /// Whether `other` is this library or one of its transitive dependencies
    pub fn depends_on(self: &Arc<Self>, other: &Arc<CompiledLibrary>) -> bool {
        self.all_dependencies()
            .iter()
            .any(|library| Arc::ptr_eq(library, other))
    }
}

impl fmt::Debug for CompiledLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledLibrary")
            .field("owner", &self.owner.key())
            .field("path", &self.path)
            .field(
                "dependencies",
                &self
                    .dependencies
                    .iter()
                    .map(|d| d.path.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Deduplicated union of the given libraries and all their dependencies
pub(crate) fn transitive_closure(libraries: &[Arc<CompiledLibrary>]) -> Vec<Arc<CompiledLibrary>> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for library in libraries {
        CompiledLibrary::collect(library, &mut seen, &mut ordered);
    }
    ordered
}

/// Memoized library compilation keyed by store path
pub struct LibraryCache {
    libraries: DashMap<String, Arc<CompiledLibrary>>,
    locks: Arc<LockTable>,
    environment: Arc<CompileEnvironment>,
}

impl LibraryCache {
    pub(crate) fn new(environment: Arc<CompileEnvironment>, locks: Arc<LockTable>) -> Self {
        Self {
            libraries: DashMap::new(),
            locks,
            environment,
        }
    }

    pub(crate) fn environment(&self) -> &CompileEnvironment {
        &self.environment
    }

    /// Compile the library at `path`, or return the cached one
    ///
    /// Concurrent callers for the same path compile it once: the compiler
    /// runs under the path's lock and the cache is re-checked after it is
    /// taken. `stack` holds the library paths currently being compiled above this
    /// one. Every path this call reads, successful or not, is recorded in
    /// `touched` so the owner can detect changes made while it compiled and
    /// a failed owner can still be evicted when one of them changes.
    pub(crate) fn compile<'a>(
        &'a self,
        owner: &'a UnitDefinition,
        path: &'a str,
        stack: &'a [String],
        touched: &'a mut TouchedPaths,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Arc<CompiledLibrary>>> {
        async move {
            let mut subtree = TouchedPaths::default();
            let result = self
                .compile_subtree(owner, path, stack, &mut subtree, cancel)
                .await;
            touched.extend(subtree);
            result
        }
        .boxed()
    }

    async fn compile_subtree(
        &self,
        owner: &UnitDefinition,
        path: &str,
        stack: &[String],
        subtree: &mut TouchedPaths,
        cancel: &CancellationToken,
    ) -> Result<Arc<CompiledLibrary>> {
        subtree.record(path, self.locks.generation(path));
        if stack.iter().any(|p| p == path) {
            return Err(Error::dependency_cycle(
                stack.iter().map(String::as_str).chain([path]),
            ));
        }
        if let Some(library) = self.get(path) {
            return Ok(library);
        }

        let env = &self.environment;
        let text = env.store.resolve_reference_text(owner, path)?;
        let preprocessed = env.preprocessor.preprocess(&text)?;

        // Dependencies compile before this path's lock is taken, so no
        // task ever waits on a lock while holding another one.
        let mut nested = stack.to_vec();
        nested.push(path.to_string());
        let mut dependencies = Vec::with_capacity(preprocessed.libraries.len());
        for declared in &preprocessed.libraries {
            let resolved = env
                .store
                .resolve_reference_path(owner, declared, Some(path))?;
            let dependency = self
                .compile(owner, &resolved, &nested, subtree, cancel)
                .await?;
            dependencies.push(dependency);
        }

        let lock = self.locks.path_lock(path);
        let _guard = tokio::select! {
            guard = lock.lock() => guard,
            () = cancel.cancelled() => {
                return Err(Error::cancelled(format!("compile library {path}")));
            }
        };
        if let Some(library) = self.get(path) {
            return Ok(library);
        }

        let request = CompileRequest {
            definition: owner.clone(),
            kind: ArtifactKind::Library,
            path: path.to_string(),
            text: preprocessed.text,
            imports: env.options.merged_imports(&preprocessed.imports),
            libraries: transitive_closure(&dependencies)
                .iter()
                .map(|library| Arc::clone(library.artifact()))
                .collect(),
            references: Vec::new(),
            external_references: env.options.references.clone(),
            input: Shape::unit(),
            output: Shape::unit(),
        };
        let artifact = env.compiler.compile(request, cancel).await?;

        let library = Arc::new(CompiledLibrary {
            owner: owner.clone(),
            path: path.to_string(),
            artifact,
            dependencies,
        });
        let cached = {
            let global = self.locks.global();
            let current = subtree.is_current(&global);
            if current {
                self.libraries
                    .insert(path.to_string(), Arc::clone(&library));
            }
            current
        };
        if cached {
            info!(path = %path, owner = %owner, "Compiled library");
        } else {
            debug!(path = %path, owner = %owner, "Library sources changed while compiling; not cached");
        }
        Ok(library)
    }

    pub(crate) fn locks(&self) -> &LockTable {
        &self.locks
    }

    pub fn get(&self, path: &str) -> Option<Arc<CompiledLibrary>> {
        self.libraries.get(path).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.libraries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Cached library paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .libraries
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        paths.sort();
        paths
    }

    /// Remove the library at `path` and every library that depends on it
    ///
    /// Caller holds the global lock.
    pub(crate) fn remove_rooted_at(&self, path: &str) -> Vec<Arc<CompiledLibrary>> {
        let Some((_, root)) = self.libraries.remove(path) else {
            return Vec::new();
        };
        let mut removed = vec![root];
        let mut cursor = 0;
        while cursor < removed.len() {
            let current = Arc::clone(&removed[cursor]);
            cursor += 1;
            let dependents: Vec<String> = self
                .libraries
                .iter()
                .filter(|entry| entry.value().depends_on(&current))
                .map(|entry| entry.key().clone())
                .collect();
            for key in dependents {
                if let Some((_, library)) = self.libraries.remove(&key) {
                    debug!(path = %key, changed = %current.path, "Evicting dependent library");
                    removed.push(library);
                }
            }
        }
        removed
    }

    /// Drop every library that is not in `reachable`
    ///
    /// Caller holds the global lock.
    pub(crate) fn trim(&self, reachable: &HashSet<*const CompiledLibrary>) -> usize {
        let before = self.libraries.len();
        self.libraries.retain(|path, library| {
            let keep = reachable.contains(&Arc::as_ptr(library));
            if !keep {
                debug!(path = %path, "Trimming unreachable library");
            }
            keep
        });
        before - self.libraries.len()
    }

    /// Caller holds the global lock.
    pub(crate) fn clear(&self) {
        self.libraries.clear();
    }
}

impl fmt::Debug for LibraryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryCache")
            .field("paths", &self.paths())
            .finish()
    }
}
