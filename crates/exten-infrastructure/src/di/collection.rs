//! Service registrations and the root provider

use super::scope::ServiceScope;
use exten_application::{ExtensionPoint, ExtensionResolver};
use exten_domain::Lifetime;
use exten_domain::error::{Error, Result};
use exten_domain::ports::{ServiceProvider, ServiceProviderExt, SharedService};
use futures::future::{self, BoxFuture, FutureExt};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

pub(crate) type ScopedFactory =
    Arc<dyn Fn(&Arc<dyn ServiceProvider>) -> SharedService + Send + Sync>;
pub(crate) type Disposer = Arc<dyn Fn(SharedService) -> BoxFuture<'static, ()> + Send + Sync>;
pub(crate) type ExtensionFactory =
    Arc<dyn Fn(&Arc<dyn ServiceProvider>) -> Option<SharedService> + Send + Sync>;

pub(crate) struct ScopedRegistration {
    pub(crate) name: &'static str,
    pub(crate) factory: ScopedFactory,
    pub(crate) disposer: Option<Disposer>,
}

/// An extension point exposed as a service; every lookup goes through the
/// extension registries, which own caching and reload
pub(crate) struct ExtensionRegistration {
    pub(crate) key: String,
    pub(crate) lifetime: Lifetime,
    pub(crate) factory: ExtensionFactory,
}

impl ExtensionRegistration {
    /// Resolve against `provider`; scoped points never resolve from the root
    pub(crate) fn resolve(&self, provider: &Arc<dyn ServiceProvider>) -> Option<SharedService> {
        if self.lifetime == Lifetime::Scoped && provider.is_root() {
            debug!(point = %self.key, "Scoped extension service looked up from the root");
            return None;
        }
        (self.factory)(provider)
    }
}

#[derive(Default)]
pub(crate) struct Registrations {
    pub(crate) singletons: HashMap<TypeId, SharedService>,
    pub(crate) scoped: HashMap<TypeId, ScopedRegistration>,
    pub(crate) extensions: HashMap<TypeId, ExtensionRegistration>,
}

impl Registrations {
    fn remove(&mut self, id: &TypeId) {
        self.singletons.remove(id);
        self.scoped.remove(id);
        self.extensions.remove(id);
    }
}

/// Builder of a [`ServiceContainer`]
///
/// Registering the same type twice replaces the earlier registration.
#[derive(Default)]
pub struct ServiceCollection {
    registrations: Registrations,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// One instance shared by the root and every scope
    pub fn add_singleton<T: Any + Send + Sync>(mut self, instance: Arc<T>) -> Self {
        let id = TypeId::of::<T>();
        self.registrations.remove(&id);
        self.registrations.singletons.insert(id, instance);
        self
    }

    /// One instance per scope, built on first lookup
    pub fn add_scoped<T, F>(self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Arc<dyn ServiceProvider>) -> Arc<T> + Send + Sync + 'static,
    {
        self.insert_scoped::<T, F>(factory, None)
    }

    /// Scoped service whose instance is handed to `disposer` when the scope is disposed
    pub fn add_scoped_with_disposer<T, F, D>(self, factory: F, disposer: D) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Arc<dyn ServiceProvider>) -> Arc<T> + Send + Sync + 'static,
        D: Fn(Arc<T>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let disposer: Disposer = Arc::new(move |service: SharedService| {
            match service.downcast::<T>() {
                Ok(instance) => disposer(instance),
                Err(_) => future::ready(()).boxed(),
            }
        });
        self.insert_scoped::<T, F>(factory, Some(disposer))
    }

    fn insert_scoped<T, F>(mut self, factory: F, disposer: Option<Disposer>) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Arc<dyn ServiceProvider>) -> Arc<T> + Send + Sync + 'static,
    {
        let id = TypeId::of::<T>();
        self.registrations.remove(&id);
        self.registrations.scoped.insert(
            id,
            ScopedRegistration {
                name: std::any::type_name::<T>(),
                factory: Arc::new(move |provider: &Arc<dyn ServiceProvider>| {
                    factory(provider) as SharedService
                }),
                disposer,
            },
        );
        self
    }

    /// Expose `point` as a service of type `Arc<T>` under the point's lifetime
    ///
    /// Each lookup resolves through the [`ExtensionResolver`] registered in
    /// the container, so the service follows reloads. Instances with lifecycle
    /// hooks are torn down by their registry, not by the container, so points
    /// whose default attaches hooks are rejected and a resolved instance
    /// carrying hooks yields `None`. Use
    /// [`ServiceCollection::add_disposable_extension_as_service`] to accept them.
    pub fn add_extension_as_service<T>(self, point: &ExtensionPoint<T>) -> Result<Self>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if point.descriptor().default_has_lifecycle() {
            return Err(Error::configuration(format!(
                "extension point {} has a default with lifecycle hooks; \
                 use add_disposable_extension_as_service",
                point.key()
            )));
        }
        Ok(self.insert_extension(point, false))
    }

    /// Like [`ServiceCollection::add_extension_as_service`], accepting
    /// instances with lifecycle hooks
    pub fn add_disposable_extension_as_service<T>(self, point: &ExtensionPoint<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert_extension(point, true)
    }

    fn insert_extension<T>(mut self, point: &ExtensionPoint<T>, allow_lifecycle: bool) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let id = TypeId::of::<Arc<T>>();
        let resolved = point.clone();
        let factory: ExtensionFactory = Arc::new(move |provider: &Arc<dyn ServiceProvider>| {
            match resolve_extension_service(&resolved, provider, allow_lifecycle) {
                Ok(service) => service,
                Err(e) => {
                    warn!(point = %resolved.key(), error = %e, "Extension service lookup failed");
                    None
                }
            }
        });
        self.registrations.remove(&id);
        self.registrations.extensions.insert(
            id,
            ExtensionRegistration {
                key: point.key().to_string(),
                lifetime: point.lifetime(),
                factory,
            },
        );
        self
    }

    pub fn contains<T: Any>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.registrations.singletons.contains_key(&id)
            || self.registrations.scoped.contains_key(&id)
            || self.registrations.extensions.contains_key(&id)
    }

    pub fn build(self) -> Arc<ServiceContainer> {
        debug!(
            singletons = self.registrations.singletons.len(),
            scoped = self.registrations.scoped.len(),
            extensions = self.registrations.extensions.len(),
            "Built service container"
        );
        let registrations = Arc::new(self.registrations);
        Arc::new_cyclic(|this| ServiceContainer {
            registrations,
            this: this.clone(),
        })
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("singletons", &self.registrations.singletons.len())
            .field("scoped", &self.registrations.scoped.len())
            .field("extensions", &self.registrations.extensions.len())
            .finish()
    }
}

fn resolve_extension_service<T>(
    point: &ExtensionPoint<T>,
    provider: &Arc<dyn ServiceProvider>,
    allow_lifecycle: bool,
) -> Result<Option<SharedService>>
where
    T: ?Sized + Send + Sync + 'static,
{
    let resolver = provider.get::<ExtensionResolver>().ok_or_else(|| {
        Error::configuration(format!(
            "extension point {} is exposed as a service, but no resolver is registered",
            point.key()
        ))
    })?;
    let Some(extension) = resolver.resolve_descriptor_blocking(point.descriptor(), provider)? else {
        return Ok(None);
    };
    if !allow_lifecycle && extension.lifecycle().is_some() {
        return Err(Error::resolution(format!(
            "extension {} has lifecycle hooks and is not registered as disposable",
            point.key()
        )));
    }
    let instance = extension.downcast::<T>().ok_or_else(|| {
        Error::resolution(format!(
            "extension {} is a {}, not a {}",
            point.key(),
            extension.type_name(),
            std::any::type_name::<T>()
        ))
    })?;
    Ok(Some(Arc::new(instance) as SharedService))
}

/// Root provider
pub struct ServiceContainer {
    registrations: Arc<Registrations>,
    this: Weak<ServiceContainer>,
}

impl ServiceContainer {
    /// Open a scope with its own scoped instances
    pub fn create_service_scope(&self) -> Arc<ServiceScope> {
        ServiceScope::new(Arc::clone(&self.registrations))
    }
}

impl ServiceProvider for ServiceContainer {
    fn get_service(&self, service: TypeId) -> Option<SharedService> {
        if let Some(singleton) = self.registrations.singletons.get(&service) {
            return Some(Arc::clone(singleton));
        }
        let registration = self.registrations.extensions.get(&service)?;
        let provider: Arc<dyn ServiceProvider> = self.this.upgrade()?;
        registration.resolve(&provider)
    }

    fn create_scope(&self) -> Arc<dyn ServiceProvider> {
        self.create_service_scope()
    }

    fn is_root(&self) -> bool {
        true
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("singletons", &self.registrations.singletons.len())
            .field("scoped", &self.registrations.scoped.len())
            .field("extensions", &self.registrations.extensions.len())
            .finish()
    }
}
