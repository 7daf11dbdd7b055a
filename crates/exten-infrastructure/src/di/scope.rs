//! Child scopes

use super::collection::Registrations;
use exten_domain::ports::{ServiceProvider, SharedService};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::debug;

/// A child provider caching one instance of every scoped service
///
/// Call [`ServiceScope::dispose`] when the scope ends; afterwards scoped
/// lookups return `None` while singletons stay reachable.
pub struct ServiceScope {
    registrations: Arc<Registrations>,
    instances: Mutex<Vec<(TypeId, SharedService)>>,
    disposed: AtomicBool,
    this: Weak<ServiceScope>,
}

impl ServiceScope {
    pub(crate) fn new(registrations: Arc<Registrations>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            registrations,
            instances: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    /// This scope as a provider handle
    pub fn provider(self: &Arc<Self>) -> Arc<dyn ServiceProvider> {
        Arc::clone(self) as Arc<dyn ServiceProvider>
    }

    fn cached(&self, service: TypeId) -> Option<SharedService> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(id, _)| *id == service)
            .map(|(_, instance)| Arc::clone(instance))
    }

    /// Number of scoped instances created so far
    pub fn instance_count(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Run the disposers of every scoped instance, newest first
    ///
    /// Idempotent.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let instances =
            std::mem::take(&mut *self.instances.lock().unwrap_or_else(PoisonError::into_inner));
        debug!(instances = instances.len(), "Disposing service scope");
        for (id, instance) in instances.into_iter().rev() {
            if let Some(disposer) = self
                .registrations
                .scoped
                .get(&id)
                .and_then(|registration| registration.disposer.as_ref())
            {
                disposer(instance).await;
            }
        }
    }
}

impl ServiceProvider for ServiceScope {
    fn get_service(&self, service: TypeId) -> Option<SharedService> {
        if let Some(singleton) = self.registrations.singletons.get(&service) {
            return Some(Arc::clone(singleton));
        }
        if let Some(registration) = self.registrations.extensions.get(&service) {
            if self.is_disposed() {
                return None;
            }
            let provider: Arc<dyn ServiceProvider> = self.this.upgrade()?;
            return registration.resolve(&provider);
        }
        let registration = self.registrations.scoped.get(&service)?;
        if self.is_disposed() {
            debug!(service = registration.name, "Scoped lookup on a disposed scope");
            return None;
        }
        if let Some(instance) = self.cached(service) {
            return Some(instance);
        }

        // The factory may look up other services, so it runs without the lock.
        let provider: Arc<dyn ServiceProvider> = self.this.upgrade()?;
        let created = (registration.factory)(&provider);

        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, existing)) = instances.iter().find(|(id, _)| *id == service) {
            return Some(Arc::clone(existing));
        }
        instances.push((service, Arc::clone(&created)));
        Some(created)
    }

    fn create_scope(&self) -> Arc<dyn ServiceProvider> {
        ServiceScope::new(Arc::clone(&self.registrations))
    }

    fn is_root(&self) -> bool {
        false
    }
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceScope")
            .field("instances", &self.instance_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
