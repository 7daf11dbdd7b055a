//! Per-scope extension registry

use super::resolution::{RegistryCore, downcast_instance};
use super::singleton::SingletonExtensionRegistry;
use crate::extensions::{Extension, ExtensionPoint, PointDescriptor};
use exten_domain::Lifetime;
use exten_domain::error::Result;
use exten_domain::ports::ServiceProvider;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Registry owning the scoped and transient instances of one DI scope
///
/// Singleton points are always delegated to the process-wide registry so
/// there is exactly one instance per point across all scopes.
pub struct ScopedExtensionRegistry {
    core: RegistryCore,
    singleton: Arc<SingletonExtensionRegistry>,
}

impl ScopedExtensionRegistry {
    pub fn new(singleton: Arc<SingletonExtensionRegistry>) -> Self {
        Self {
            core: RegistryCore::new(
                "scoped",
                Arc::clone(singleton.factory()),
                Arc::clone(singleton.catalog()),
            ),
            singleton,
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

    pub async fn resolve_descriptor(
        &self,
        point: &PointDescriptor,
        provider: &Arc<dyn ServiceProvider>,
        cancel: &CancellationToken,
    ) -> Result<Option<Extension>> {
        match point.lifetime() {
            Lifetime::Singleton => {
                self.singleton
                    .resolve_descriptor(point, provider, cancel)
                    .await
            }
            Lifetime::Scoped | Lifetime::Transient => {
                self.core.resolve(point, provider, cancel).await
            }
        }
    }

    pub fn singleton(&self) -> &Arc<SingletonExtensionRegistry> {
        &self.singleton
    }

    pub fn is_cached<P: AsRef<PointDescriptor>>(&self, point: &P) -> bool {
        self.core.is_cached(point.as_ref().definition())
    }

    /// Number of instances cached in this scope
    pub fn cached_len(&self) -> usize {
        self.core.len()
    }

    /// Dispose the instances of this scope; the singleton registry is untouched
    pub async fn shutdown(&self) {
        self.core.shutdown().await;
    }

    pub fn shutdown_blocking(&self) -> Result<()> {
        self.core.shutdown_blocking()
    }
}

impl fmt::Debug for ScopedExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedExtensionRegistry")
            .field("cached", &self.core.len())
            .finish_non_exhaustive()
    }
}
