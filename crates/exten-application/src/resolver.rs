//! Resolution facade
//!
//! Application code resolves extension points through [`ExtensionResolver`],
//! which picks the registry that owns a point's lifetime:
//!
//! | Lifetime | Root provider | Scope provider |
//! |----------|---------------|----------------|
//! | Singleton | singleton registry | singleton registry |
//! | Scoped | error | the scope's registry |
//! | Transient | singleton registry | the scope's registry |

use crate::blocking::run_blocking;
use crate::extensions::{Extension, ExtensionPoint, PointDescriptor};
use crate::registry::{ScopedExtensionRegistry, SingletonExtensionRegistry};
use exten_domain::Lifetime;
use exten_domain::error::{Error, Result};
use exten_domain::ports::{ServiceProvider, ServiceProviderExt};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

enum Target {
    Singleton(Arc<SingletonExtensionRegistry>),
    Scoped(Arc<ScopedExtensionRegistry>),
}

/// Entry point for resolving extensions under the right lifetime
#[derive(Clone)]
pub struct ExtensionResolver {
    singleton: Arc<SingletonExtensionRegistry>,
}

impl ExtensionResolver {
    pub fn new(singleton: Arc<SingletonExtensionRegistry>) -> Self {
        Self { singleton }
    }

    pub fn singleton(&self) -> &Arc<SingletonExtensionRegistry> {
        &self.singleton
    }

    fn target(&self, point: &PointDescriptor, provider: &Arc<dyn ServiceProvider>) -> Result<Target> {
        let scoped = || {
            provider
                .get::<ScopedExtensionRegistry>()
                .map(Target::Scoped)
                .ok_or_else(|| {
                    Error::invalid_lifetime(format!(
                        "extension {point} needs a scoped registry, but the provider has none"
                    ))
                })
        };
        match point.lifetime() {
            Lifetime::Singleton => Ok(Target::Singleton(Arc::clone(&self.singleton))),
            Lifetime::Scoped => scoped(),
            Lifetime::Transient if provider.is_root() => {
                Ok(Target::Singleton(Arc::clone(&self.singleton)))
            }
            Lifetime::Transient => scoped(),
        }
    }

    /// Type-erased resolution through the registry owning the point's lifetime
    pub async fn resolve_descriptor(
        &self,
        point: &PointDescriptor,
        provider: &Arc<dyn ServiceProvider>,
        cancel: &CancellationToken,
    ) -> Result<Option<Extension>> {
        match self.target(point, provider)? {
            Target::Singleton(registry) => {
                registry.resolve_descriptor(point, provider, cancel).await
            }
            Target::Scoped(registry) => registry.resolve_descriptor(point, provider, cancel).await,
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
        match self.target(point.descriptor(), provider)? {
            Target::Singleton(registry) => {
                registry.resolve_with_cancel(point, provider, cancel).await
            }
            Target::Scoped(registry) => registry.resolve_with_cancel(point, provider, cancel).await,
        }
    }

    /// Resolve a point that must produce an instance
    ///
    /// Rejects points that are optional and have no default.
    pub async fn resolve_required<T>(
        &self,
        point: &ExtensionPoint<T>,
        provider: &Arc<dyn ServiceProvider>,
    ) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if !point.is_required() && !point.has_default() {
            return Err(Error::resolution(format!(
                "extension point {} is optional; use resolve_optional",
                point.key()
            )));
        }
        self.resolve(point, provider).await?.ok_or_else(|| {
            Error::resolution(format!(
                "extension point {} produced no instance",
                point.key()
            ))
        })
    }

    /// Resolve a point that may legitimately produce nothing
    pub async fn resolve_optional<T>(
        &self,
        point: &ExtensionPoint<T>,
        provider: &Arc<dyn ServiceProvider>,
    ) -> Result<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if point.is_required() {
            return Err(Error::resolution(format!(
                "extension point {} is required; use resolve_required",
                point.key()
            )));
        }
        self.resolve(point, provider).await
    }

    /// Blocking resolution on a dedicated worker thread
    pub fn resolve_blocking<T>(
        &self,
        point: &ExtensionPoint<T>,
        provider: &Arc<dyn ServiceProvider>,
    ) -> Result<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        run_blocking(self.resolve(point, provider))
    }

    /// Blocking type-erased resolution, keeping the lifecycle hooks visible
    pub fn resolve_descriptor_blocking(
        &self,
        point: &PointDescriptor,
        provider: &Arc<dyn ServiceProvider>,
    ) -> Result<Option<Extension>> {
        run_blocking(self.resolve_descriptor(point, provider, &CancellationToken::new()))
    }

    /// Lazily resolving handle bound to `point` and `provider`
    pub fn handle<T>(
        &self,
        point: &ExtensionPoint<T>,
        provider: &Arc<dyn ServiceProvider>,
    ) -> ExtensionHandle<T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        ExtensionHandle {
            resolver: self.clone(),
            point: point.clone(),
            provider: Arc::clone(provider),
        }
    }

    pub fn register<P: AsRef<PointDescriptor>>(&self, point: &P) -> Result<bool> {
        self.singleton.register(point)
    }

    pub fn registered(&self) -> Vec<Arc<PointDescriptor>> {
        self.singleton.registered()
    }

    pub fn clear_all(&self) -> Result<usize> {
        self.singleton.clear_all()
    }

    pub fn clear_point<P: AsRef<PointDescriptor>>(&self, point: &P) -> Result<usize> {
        self.singleton.clear_point(point)
    }

    pub fn clear_path(&self, path: &str) -> Result<usize> {
        self.singleton.clear_path(path)
    }
}

impl fmt::Debug for ExtensionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionResolver")
            .field("singleton", &self.singleton)
            .finish()
    }
}

/// A point bound to a provider, resolved on every access
///
/// The handle itself caches nothing, so a reloaded extension is picked up
/// as soon as its registry drops the old instance.
pub struct ExtensionHandle<T: ?Sized> {
    resolver: ExtensionResolver,
    point: ExtensionPoint<T>,
    provider: Arc<dyn ServiceProvider>,
}

impl<T> ExtensionHandle<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    pub fn point(&self) -> &ExtensionPoint<T> {
        &self.point
    }

    pub async fn get(&self) -> Result<Option<Arc<T>>> {
        self.resolver.resolve(&self.point, &self.provider).await
    }

    pub async fn get_required(&self) -> Result<Arc<T>> {
        self.resolver
            .resolve_required(&self.point, &self.provider)
            .await
    }

    pub fn get_blocking(&self) -> Result<Option<Arc<T>>> {
        self.resolver.resolve_blocking(&self.point, &self.provider)
    }
}

impl<T: ?Sized> Clone for ExtensionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            point: self.point.clone(),
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ExtensionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionHandle")
            .field("point", &self.point)
            .finish_non_exhaustive()
    }
}
