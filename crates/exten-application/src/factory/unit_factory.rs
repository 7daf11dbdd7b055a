//! Unit factory
//!
//! Resolves definitions to [`CompiledUnit`]s, caches them, and evicts them
//! when their sources change.

use super::library::{CompileEnvironment, CompiledLibrary, LibraryCache};
use super::locks::LockTable;
use super::options::FactoryOptions;
use super::unit::CompiledUnit;
use dashmap::DashMap;
use exten_domain::error::{Error, Result};
use exten_domain::events::{ChangeFeed, SourceChanged, Subscription, UnitEvicted};
use exten_domain::ports::{Preprocessor, ScriptCompiler, SourceStore};
use exten_domain::{Shape, UnitDefinition};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cache of compiled units keyed by definition
pub struct UnitFactory {
    units: DashMap<UnitDefinition, Arc<CompiledUnit>>,
    libraries: Arc<LibraryCache>,
    locks: Arc<LockTable>,
    definitions: RwLock<HashSet<UnitDefinition>>,
    restricted: bool,
    evictions: ChangeFeed<UnitEvicted>,
    hot_reload: Mutex<Option<Subscription>>,
    disposed: AtomicBool,
}

impl UnitFactory {
    /// Create a factory; with hot reload enabled it subscribes to the store's change feed
    pub fn new(
        store: Arc<dyn SourceStore>,
        preprocessor: Arc<dyn Preprocessor>,
        compiler: Arc<dyn ScriptCompiler>,
        options: FactoryOptions,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let hot_reload = if options.enable_hot_reload {
                store.change_feed().map(|feed| {
                    let weak = weak.clone();
                    feed.subscribe(move |event: &SourceChanged| {
                        if let Some(factory) = weak.upgrade() {
                            factory.on_source_changed(&event.path);
                        }
                    })
                })
            } else {
                None
            };
            info!(
                store = store.store_name(),
                compiler = compiler.compiler_name(),
                hot_reload = hot_reload.is_some(),
                restricted = options.allow_only_defined_units,
                "Unit factory created"
            );

            let definitions = options.definitions.iter().cloned().collect();
            let restricted = options.allow_only_defined_units;
            let locks = Arc::new(LockTable::default());
            let environment = Arc::new(CompileEnvironment {
                store,
                preprocessor,
                compiler,
                options,
            });

            Self {
                units: DashMap::new(),
                libraries: Arc::new(LibraryCache::new(environment, Arc::clone(&locks))),
                locks,
                definitions: RwLock::new(definitions),
                restricted,
                evictions: ChangeFeed::new(),
                hot_reload: Mutex::new(hot_reload),
                disposed: AtomicBool::new(false),
            }
        })
    }

    fn ensure_active(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::disposed("unit factory"));
        }
        Ok(())
    }

    /// Resolve `definition` to a unit
    ///
    /// Returns `Ok(None)` when the store has no text for an optional
    /// definition. The returned unit is not compiled yet.
    pub fn get_unit(&self, definition: &UnitDefinition) -> Result<Option<Arc<CompiledUnit>>> {
        self.ensure_active()?;
        if self.restricted && !self.is_defined(definition) {
            return Err(Error::definition_not_allowed(definition.key()));
        }

        if definition.is_cacheable()
            && let Some(unit) = self.units.get(definition)
        {
            return Ok(Some(Arc::clone(unit.value())));
        }

        let store = &self.libraries.environment().store;
        let source_path = store.resolve_source_path(definition)?;
        loop {
            let generation = self.locks.generation(&source_path);
            let Some(text) = store.resolve_source_text(definition)? else {
                if definition.is_required() {
                    return Err(Error::not_found(format!(
                        "unit {definition} is required but has no source"
                    )));
                }
                debug!(unit = %definition, "No source for optional unit");
                return Ok(None);
            };

            let unit = Arc::new(self.create_unit(definition.clone(), &text, source_path.clone())?);
            if !definition.is_cacheable() {
                return Ok(Some(unit));
            }

            let global = self.locks.global();
            if global.generation(&source_path) != generation {
                // Changed between the read and now; read it again.
                continue;
            }
            let stored = self
                .units
                .entry(definition.clone())
                .or_insert_with(|| Arc::clone(&unit));
            return Ok(Some(Arc::clone(stored.value())));
        }
    }

    fn create_unit(
        &self,
        definition: UnitDefinition,
        text: &str,
        source_path: String,
    ) -> Result<CompiledUnit> {
        let preprocessed = self.libraries.environment().preprocessor.preprocess(text)?;
        Ok(CompiledUnit::new(
            definition,
            preprocessed,
            source_path,
            Arc::clone(&self.libraries),
        ))
    }

    /// Compile `text` as a throwaway unit, without touching the unit cache
    ///
    /// Libraries it loads are compiled through the shared library cache.
    pub async fn try_compile(
        &self,
        key: &str,
        input: Shape,
        output: Shape,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.ensure_active()?;
        let definition = UnitDefinition::with_flags(key, input, output, true, false);
        let source_path = self
            .libraries
            .environment()
            .store
            .resolve_source_path(&definition)?;
        let unit = self.create_unit(definition, text, source_path)?;
        unit.compile(cancel).await
    }

    /// Store path of the unit behind `definition`
    pub fn source_path(&self, definition: &UnitDefinition) -> Result<String> {
        self.ensure_active()?;
        self.libraries
            .environment()
            .store
            .resolve_source_path(definition)
    }

    /// Register a definition at runtime
    pub fn define(&self, definition: UnitDefinition) -> Result<()> {
        self.ensure_active()?;
        if self.restricted {
            return Err(Error::definition_not_allowed(definition.key()));
        }
        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if definitions.insert(definition.clone()) {
            info!(unit = %definition, "Defined unit");
        }
        Ok(())
    }

    pub fn define_many<I>(&self, definitions: I) -> Result<()>
    where
        I: IntoIterator<Item = UnitDefinition>,
    {
        definitions
            .into_iter()
            .try_for_each(|definition| self.define(definition))
    }

    pub fn is_defined(&self, definition: &UnitDefinition) -> bool {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(definition)
    }

    /// Registered definitions, sorted by key
    pub fn registered(&self) -> Vec<UnitDefinition> {
        let mut definitions: Vec<UnitDefinition> = self
            .definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        definitions.sort_by(|a, b| a.key().cmp(b.key()));
        definitions
    }

    /// Whether only registered definitions may be resolved
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn is_cached(&self, definition: &UnitDefinition) -> bool {
        self.units.contains_key(definition)
    }

    /// Number of cached units
    pub fn cached_units(&self) -> usize {
        self.units.len()
    }

    pub fn library_cache(&self) -> &LibraryCache {
        &self.libraries
    }

    /// Eviction events, one per unit dropped from the cache
    pub fn eviction_feed(&self) -> &ChangeFeed<UnitEvicted> {
        &self.evictions
    }

    fn on_source_changed(&self, path: &str) {
        match self.clear_path(path) {
            Ok(evicted) => info!(path = %path, evicted, "Source changed"),
            Err(e) => warn!(path = %path, error = %e, "Failed to evict changed source"),
        }
    }

    /// Evict every unit and library
    pub fn clear_all(&self) -> Result<usize> {
        self.ensure_active()?;
        let evicted = {
            let mut global = self.locks.global();
            global.bump_all();
            let evicted = self.remove_units(|_| true);
            self.libraries.clear();
            evicted
        };
        Ok(self.finish_eviction(evicted))
    }

    /// Evict the unit cached for `definition`
    pub fn clear_definition(&self, definition: &UnitDefinition) -> Result<usize> {
        self.ensure_active()?;
        let evicted = {
            let _global = self.locks.global();
            self.units
                .remove(definition)
                .map(|(_, unit)| unit)
                .into_iter()
                .collect()
        };
        Ok(self.finish_eviction(evicted))
    }

    /// Evict everything built from `path`
    ///
    /// Removes the library at `path` and its dependents, every unit whose own
    /// source, dependency set or references include `path`, then trims
    /// libraries no remaining unit can reach. Compilations still in flight
    /// that read `path` or a removed library do not cache their result.
    pub fn clear_path(&self, path: &str) -> Result<usize> {
        self.ensure_active()?;
        let evicted = {
            let mut global = self.locks.global();
            global.bump(path);
            let removed_libraries = self.libraries.remove_rooted_at(path);
            for library in &removed_libraries {
                global.bump(library.path());
            }
            let removed: HashSet<*const CompiledLibrary> =
                removed_libraries.iter().map(Arc::as_ptr).collect();
            let evicted = self.remove_units(|unit| unit.is_affected_by(path, &removed));
            if !removed.is_empty() || !evicted.is_empty() {
                let reachable = self.reachable_libraries();
                let trimmed = self.libraries.trim(&reachable);
                debug!(
                    path = %path,
                    libraries = removed.len(),
                    trimmed,
                    "Evicted libraries"
                );
            }
            evicted
        };
        Ok(self.finish_eviction(evicted))
    }

    /// Caller holds the global lock.
    fn remove_units<F>(&self, mut matches: F) -> Vec<Arc<CompiledUnit>>
    where
        F: FnMut(&CompiledUnit) -> bool,
    {
        let keys: Vec<UnitDefinition> = self
            .units
            .iter()
            .filter(|entry| matches(entry.value().as_ref()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.iter()
            .filter_map(|key| self.units.remove(key).map(|(_, unit)| unit))
            .collect()
    }

    fn reachable_libraries(&self) -> HashSet<*const CompiledLibrary> {
        self.units
            .iter()
            .flat_map(|entry| entry.value().dependencies())
            .map(|library| Arc::as_ptr(&library))
            .collect()
    }

    /// Dispose evicted units and publish one event per unit, outside the global lock
    fn finish_eviction(&self, evicted: Vec<Arc<CompiledUnit>>) -> usize {
        for unit in &evicted {
            debug!(unit = %unit.definition(), path = %unit.source_path(), "Evicting unit");
            unit.dispose();
            self.evictions.publish(&UnitEvicted {
                definition: unit.definition().clone(),
                source_path: unit.source_path().to_string(),
            });
        }
        evicted.len()
    }

    /// Dispose every unit and stop listening for source changes
    ///
    /// Idempotent. Every later operation fails with `Disposed`.
    pub fn shutdown(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(subscription) = self
            .hot_reload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            subscription.cancel();
        }
        let _global = self.locks.global();
        for entry in &self.units {
            entry.value().dispose();
        }
        self.units.clear();
        self.libraries.clear();
        info!("Unit factory shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for UnitFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitFactory")
            .field("cached_units", &self.units.len())
            .field("libraries", &self.libraries.len())
            .field("restricted", &self.restricted)
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
