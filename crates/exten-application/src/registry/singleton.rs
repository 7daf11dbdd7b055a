//! Process-wide extension registry

use super::resolution::{RegistryCore, downcast_instance};
use super::options::ExtensionCatalog;
use crate::extensions::{Extension, ExtensionPoint, PointDescriptor};
use crate::factory::UnitFactory;
use exten_domain::Lifetime;
use exten_domain::error::{Error, Result};
use exten_domain::events::{Subscription, UnitEvicted};
use exten_domain::ports::ServiceProvider;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Registry owning singleton instances and transients resolved from the root provider
///
/// Listens to the factory's eviction feed: when a unit is evicted, the
/// instance cached for that definition is dropped and disposed, so the next
/// resolution runs the new source.
pub struct SingletonExtensionRegistry {
    core: RegistryCore,
    eviction: Mutex<Option<Subscription>>,
}

impl SingletonExtensionRegistry {
    pub fn new(factory: Arc<UnitFactory>, catalog: Arc<ExtensionCatalog>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let listener = weak.clone();
            let subscription =
                factory
                    .eviction_feed()
                    .subscribe(move |event: &UnitEvicted| {
                        if let Some(registry) = listener.upgrade() {
                            registry.on_unit_evicted(event);
                        }
                    });
            Self {
                core: RegistryCore::new("singleton", factory, catalog),
                eviction: Mutex::new(Some(subscription)),
            }
        })
    }

    fn on_unit_evicted(&self, event: &UnitEvicted) {
        if self.core.is_shut_down() {
            return;
        }
        if let Ok(removed) = self.core.clear_definition(&event.definition)
            && removed > 0
        {
            debug!(point = %event.definition, path = %event.source_path, "Dropped evicted extension");
        }
    }

    pub async fn resolve<T>(
        &self,
        point: &ExtensionPoint<T>,
        provider: &Arc<dyn ServiceProvider>,
    ) -> Result<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_with_cancel(point, provider, &CancellationToken::new())
            .await
    }

    pub async fn resolve_with_cancel<T>(
        &self,
        point: &ExtensionPoint<T>,
        provider: &Arc<dyn ServiceProvider>,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let descriptor = point.descriptor();
        let instance = self.resolve_descriptor(descriptor, provider, cancel).await?;
        downcast_instance::<T>(descriptor, instance)
    }

    /// Type-erased resolution; scoped points are rejected
    pub async fn resolve_descriptor(
        &self,
        point: &PointDescriptor,
        provider: &Arc<dyn ServiceProvider>,
        cancel: &CancellationToken,
    ) -> Result<Option<Extension>> {
        if point.lifetime() == Lifetime::Scoped {
            return Err(Error::invalid_lifetime(format!(
                "cannot resolve scoped extension {point} from the singleton registry"
            )));
        }
        self.core.resolve(point, provider, cancel).await
    }

    /// Register a point at runtime; `Ok(false)` if it was already registered
    pub fn register<P: AsRef<PointDescriptor>>(&self, point: &P) -> Result<bool> {
        self.core.register(&Arc::new(point.as_ref().clone()))
    }

    pub fn registered(&self) -> Vec<Arc<PointDescriptor>> {
        self.core.catalog().points()
    }

    pub fn factory(&self) -> &Arc<UnitFactory> {
        self.core.factory()
    }

    pub(crate) fn catalog(&self) -> &Arc<ExtensionCatalog> {
        self.core.catalog()
    }

    pub fn is_cached<P: AsRef<PointDescriptor>>(&self, point: &P) -> bool {
        self.core.is_cached(point.as_ref().definition())
    }

    /// Number of cached instances
    pub fn cached_len(&self) -> usize {
        self.core.len()
    }

    pub fn clear_all(&self) -> Result<usize> {
        self.core.clear_all()
    }

    pub fn clear_point<P: AsRef<PointDescriptor>>(&self, point: &P) -> Result<usize> {
        self.core.clear_definition(point.as_ref().definition())
    }

    /// Drop every instance that was resolved from `path`
    pub fn clear_path(&self, path: &str) -> Result<usize> {
        self.core.clear_path(path)
    }

    /// Stop listening for evictions and dispose every cached instance
    pub async fn shutdown(&self) {
        self.unsubscribe();
        self.core.shutdown().await;
    }

    pub fn shutdown_blocking(&self) -> Result<()> {
        self.unsubscribe();
        self.core.shutdown_blocking()
    }

    fn unsubscribe(&self) {
        if let Some(subscription) = self
            .eviction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            subscription.cancel();
        }
    }
}

impl fmt::Debug for SingletonExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonExtensionRegistry")
            .field("cached", &self.core.len())
            .finish_non_exhaustive()
    }
}
