//! Resolution algorithm shared by the singleton and scoped registries

use super::options::ExtensionCatalog;
use crate::blocking::run_blocking;
use crate::extensions::{Extension, ExtensionContext, PointDescriptor};
use crate::factory::{CompiledUnit, UnitFactory};
use dashmap::DashMap;
use exten_domain::UnitDefinition;
use exten_domain::error::{Error, Result};
use exten_domain::ports::ServiceProvider;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::RuntimeFlavor;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type PointLocks = HashMap<UnitDefinition, Arc<AsyncMutex<()>>>;

/// Resolutions restarted because the unit was evicted mid-flight, before giving up
const MAX_RESOLVE_ATTEMPTS: usize = 4;

/// Output of one unit run, with the unit it came from
struct Produced {
    instance: Option<Extension>,
    source_path: Option<String>,
    unit: Option<Arc<CompiledUnit>>,
}

impl Produced {
    fn is_stale(&self) -> bool {
        self.unit.as_ref().is_some_and(|unit| unit.is_disposed())
    }
}

/// A cached resolution; `instance` is `None` for optional points without an implementation
#[derive(Clone)]
pub(crate) struct CacheEntry {
    pub(crate) instance: Option<Extension>,
    /// Store path the instance came from, matched by `clear_path`
    pub(crate) source_path: Option<String>,
}

pub(crate) struct RegistryCore {
    kind: &'static str,
    factory: Arc<UnitFactory>,
    catalog: Arc<ExtensionCatalog>,
    entries: DashMap<UnitDefinition, CacheEntry>,
    locks: Mutex<PointLocks>,
    disposed: AtomicBool,
}

impl RegistryCore {
    pub(crate) fn new(
        kind: &'static str,
        factory: Arc<UnitFactory>,
        catalog: Arc<ExtensionCatalog>,
    ) -> Self {
        Self {
            kind,
            factory,
            catalog,
            entries: DashMap::new(),
            locks: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn factory(&self) -> &Arc<UnitFactory> {
        &self.factory
    }

    pub(crate) fn catalog(&self) -> &Arc<ExtensionCatalog> {
        &self.catalog
    }

    fn ensure_active(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::disposed(format!("{} extension registry", self.kind)));
        }
        Ok(())
    }

    /// Lock guarding every mutation of `entries`
    fn mutation(&self) -> MutexGuard<'_, PointLocks> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn point_lock(&self, definition: &UnitDefinition) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.mutation().entry(definition.clone()).or_default())
    }

    fn cached(&self, definition: &UnitDefinition) -> Option<Option<Extension>> {
        self.entries
            .get(definition)
            .map(|entry| entry.instance.clone())
    }

    pub(crate) fn is_cached(&self, definition: &UnitDefinition) -> bool {
        self.entries.contains_key(definition)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) async fn resolve(
        &self,
        point: &PointDescriptor,
        provider: &Arc<dyn ServiceProvider>,
        cancel: &CancellationToken,
    ) -> Result<Option<Extension>> {
        self.ensure_active()?;
        if !self.catalog.allows(point) {
            return Err(Error::extension_not_allowed(point.key()));
        }

        let definition = point.definition();
        let cacheable = point.lifetime().is_cached();
        if cacheable && let Some(instance) = self.cached(definition) {
            return Ok(instance);
        }

        let lock = self.point_lock(definition);
        let _guard = tokio::select! {
            guard = lock.lock() => guard,
            () = cancel.cancelled() => {
                return Err(Error::cancelled(format!("resolve extension {point}")));
            }
        };
        if cacheable && let Some(instance) = self.cached(definition) {
            return Ok(instance);
        }

        for _ in 0..MAX_RESOLVE_ATTEMPTS {
            let produced = self.produce(point, provider, cancel).await?;
            if cacheable && produced.is_stale() {
                debug!(point = %point, "Unit evicted during resolution");
                continue;
            }
            let instance = self.finish(point, provider, produced.instance).await?;
            if !cacheable {
                return Ok(instance);
            }

            // An eviction disposes the unit before notifying registries, so
            // checking it under the mutation lock orders this insert against
            // the eviction's removal.
            let stale = {
                let _mutation = self.mutation();
                let stale = produced.unit.as_ref().is_some_and(|unit| unit.is_disposed());
                if !stale {
                    self.entries.insert(
                        definition.clone(),
                        CacheEntry {
                            instance: instance.clone(),
                            source_path: produced.source_path,
                        },
                    );
                }
                stale
            };
            if stale {
                debug!(point = %point, "Unit evicted before caching; resolving again");
                self.dispose_detached(vec![CacheEntry {
                    instance,
                    source_path: None,
                }]);
                continue;
            }
            debug!(registry = self.kind, point = %point, "Cached extension");
            return Ok(instance);
        }
        Err(Error::resolution(format!(
            "Extension point {} kept being evicted while resolving",
            point.key()
        )))
    }

    /// Check, initialize and announce a freshly produced instance
    async fn finish(
        &self,
        point: &PointDescriptor,
        provider: &Arc<dyn ServiceProvider>,
        instance: Option<Extension>,
    ) -> Result<Option<Extension>> {
        match instance {
            Some(extension) => {
                if !point.accepts(&extension) {
                    return Err(Error::resolution(format!(
                        "Extension point {} resolved to {}, expected {}",
                        point.key(),
                        extension.type_name(),
                        point.extension_type()
                    )));
                }
                if let Some(lifecycle) = extension.lifecycle() {
                    lifecycle.on_init(provider).await?;
                }
                point.notify_resolved(&extension);
                Ok(Some(extension))
            }
            None if point.is_required() => Err(Error::resolution(format!(
                "Extension point {} is required but no implementation was provided",
                point.key()
            ))),
            None => Ok(None),
        }
    }

    /// Run the point's unit, falling back to its default
    async fn produce(
        &self,
        point: &PointDescriptor,
        provider: &Arc<dyn ServiceProvider>,
        cancel: &CancellationToken,
    ) -> Result<Produced> {
        let definition = point.definition();
        let mut attempts = 0;
        loop {
            let unit = match self.factory.get_unit(definition) {
                Ok(unit) => unit,
                Err(Error::NotFound { resource }) => {
                    return Err(Error::resolution(format!(
                        "Extension point {} has no implementation: {resource}",
                        point.key()
                    )));
                }
                Err(e) => return Err(e),
            };
            let Some(unit) = unit else {
                return Ok(Produced {
                    instance: point.default_instance(provider),
                    source_path: self.factory.source_path(definition).ok(),
                    unit: None,
                });
            };

            let context = Arc::new(ExtensionContext::new(Arc::clone(provider)));
            match unit
                .invoke::<Arc<ExtensionContext>, ()>(Arc::clone(&context), cancel)
                .await
            {
                Ok(_) => {}
                // Evicted between lookup and invocation; fetch the new unit.
                Err(Error::Disposed { .. }) if attempts < MAX_RESOLVE_ATTEMPTS => {
                    attempts += 1;
                    debug!(point = %point, "Unit evicted during resolution");
                    continue;
                }
                Err(e) => return Err(e),
            }

            return Ok(Produced {
                instance: context
                    .take_result()
                    .or_else(|| point.default_instance(provider)),
                source_path: Some(unit.source_path().to_string()),
                unit: Some(unit),
            });
        }
    }

    pub(crate) fn remove_definition(&self, definition: &UnitDefinition) -> Vec<CacheEntry> {
        let _mutation = self.mutation();
        self.entries
            .remove(definition)
            .map(|(_, entry)| entry)
            .into_iter()
            .collect()
    }

    pub(crate) fn remove_path(&self, path: &str) -> Vec<CacheEntry> {
        let _mutation = self.mutation();
        let keys: Vec<UnitDefinition> = self
            .entries
            .iter()
            .filter(|entry| entry.value().source_path.as_deref() == Some(path))
            .map(|entry| entry.key().clone())
            .collect();
        keys.iter()
            .filter_map(|key| self.entries.remove(key).map(|(_, entry)| entry))
            .collect()
    }

    pub(crate) fn remove_all(&self) -> Vec<CacheEntry> {
        let _mutation = self.mutation();
        let keys: Vec<UnitDefinition> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.iter()
            .filter_map(|key| self.entries.remove(key).map(|(_, entry)| entry))
            .collect()
    }

    pub(crate) fn clear_definition(&self, definition: &UnitDefinition) -> Result<usize> {
        self.ensure_active()?;
        let removed = self.remove_definition(definition);
        Ok(self.dispose_detached(removed))
    }

    pub(crate) fn clear_path(&self, path: &str) -> Result<usize> {
        self.ensure_active()?;
        let removed = self.remove_path(path);
        Ok(self.dispose_detached(removed))
    }

    pub(crate) fn clear_all(&self) -> Result<usize> {
        self.ensure_active()?;
        info!(registry = self.kind, "Clearing extension cache");
        let removed = self.remove_all();
        Ok(self.dispose_detached(removed))
    }

    /// Register a point at runtime and define its unit with the factory
    pub(crate) fn register(&self, point: &Arc<PointDescriptor>) -> Result<bool> {
        self.ensure_active()?;
        if self.catalog.is_restricted() {
            return Err(Error::extension_not_allowed(point.key()));
        }
        if self.catalog.contains(point) {
            warn!(point = %point, "Extension point is already registered");
            return Ok(false);
        }
        if !self.factory.is_defined(point.definition()) {
            self.factory.define(point.definition().clone())?;
        }
        self.catalog.insert(Arc::clone(point));
        info!(point = %point, "Registered extension point");
        Ok(true)
    }

    /// Dispose `entries`; returns how many were removed
    ///
    /// On a multi-thread runtime disposal is spawned and not awaited. A
    /// current-thread runtime may be a short-lived worker that would drop the
    /// task, so there, and outside any runtime, disposal runs to completion
    /// on a blocking worker before this returns.
    fn dispose_detached(&self, entries: Vec<CacheEntry>) -> usize {
        let count = entries.len();
        if entries.iter().all(|entry| lifecycle_of(entry).is_none()) {
            return count;
        }
        let kind = self.kind;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                handle.spawn(dispose_entries(kind, entries));
            }
            _ => {
                if let Err(e) = run_blocking(async move {
                    dispose_entries(kind, entries).await;
                    Ok(())
                }) {
                    warn!(registry = kind, error = %e, "Failed to run extension disposal");
                }
            }
        }
        count
    }

    /// Dispose every cached instance and reject further use
    pub(crate) async fn shutdown(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let entries = self.remove_all();
        self.mutation().clear();
        dispose_entries(self.kind, entries).await;
        info!(registry = self.kind, "Extension registry shut down");
    }

    pub(crate) fn shutdown_blocking(&self) -> Result<()> {
        run_blocking(async {
            self.shutdown().await;
            Ok(())
        })
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

fn lifecycle_of(entry: &CacheEntry) -> Option<&Arc<dyn crate::extensions::ExtensionLifecycle>> {
    entry.instance.as_ref().and_then(Extension::lifecycle)
}

/// Dispose instances one by one; failures are logged and skipped
pub(crate) async fn dispose_entries(kind: &'static str, entries: Vec<CacheEntry>) {
    for entry in entries {
        let Some(lifecycle) = lifecycle_of(&entry) else {
            continue;
        };
        if let Err(e) = lifecycle.dispose().await {
            warn!(registry = kind, error = %e, "Extension disposal failed");
        }
    }
}

/// Typed view of a resolved instance
pub(crate) fn downcast_instance<T>(
    point: &PointDescriptor,
    instance: Option<Extension>,
) -> Result<Option<Arc<T>>>
where
    T: ?Sized + Send + Sync + 'static,
{
    instance
        .map(|extension| {
            extension.downcast::<T>().ok_or_else(|| {
                Error::resolution(format!(
                    "Extension point {} resolved to {}, requested as {}",
                    point.key(),
                    extension.type_name(),
                    std::any::type_name::<T>()
                ))
            })
        })
        .transpose()
}
