//! Service Provider Port
//!
//! The part of a dependency-injection container the engine relies on.

use crate::error::{Error, Result};
use std::any::{Any, TypeId};
use std::sync::Arc;

/// A service instance as stored by the container
pub type SharedService = Arc<dyn Any + Send + Sync>;

/// DI provider interface
pub trait ServiceProvider: Send + Sync {
    /// Look up a service by type; the returned value downcasts to that type
    fn get_service(&self, service: TypeId) -> Option<SharedService>;

    /// Open a child scope
    fn create_scope(&self) -> Arc<dyn ServiceProvider>;

    /// Whether this provider is the root (process-wide) provider
    fn is_root(&self) -> bool;
}

/// Typed helpers over [`ServiceProvider`]
pub trait ServiceProviderExt {
    /// Look up a service of type `T`
    fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>>;

    /// Look up a service of type `T`, failing if it is not registered
    fn get_required<T: Any + Send + Sync>(&self) -> Result<Arc<T>>;
}

impl<P: ServiceProvider + ?Sized> ServiceProviderExt for P {
    fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.get_service(TypeId::of::<T>())
            .and_then(|service| service.downcast::<T>().ok())
    }

    fn get_required<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.get::<T>().ok_or_else(|| {
            Error::not_found(format!(
                "service {} is not registered",
                std::any::type_name::<T>()
            ))
        })
    }
}
