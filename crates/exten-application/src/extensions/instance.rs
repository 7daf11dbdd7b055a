//! Resolved extension instances

use async_trait::async_trait;
use exten_domain::error::Result;
use exten_domain::ports::ServiceProvider;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Optional initialization and disposal hooks of an extension instance
///
/// `on_init` runs once per resolution before the instance is handed out or
/// cached. `dispose` runs when a registry drops a cached instance.
#[async_trait]
pub trait ExtensionLifecycle: Send + Sync {
    async fn on_init(&self, _provider: &Arc<dyn ServiceProvider>) -> Result<()> {
        Ok(())
    }

    async fn dispose(&self) -> Result<()> {
        Ok(())
    }
}

/// A type-erased extension instance
///
/// Holds an `Arc<T>` for the capability `T` the extension implements, so
/// trait objects such as `Arc<dyn Greeter>` round-trip unchanged.
#[derive(Clone)]
pub struct Extension {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    lifecycle: Option<Arc<dyn ExtensionLifecycle>>,
}

impl Extension {
    pub fn new<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
            lifecycle: None,
        }
    }

    /// Instance with lifecycle hooks, usually the same object seen through another trait
    pub fn with_lifecycle<T>(value: Arc<T>, lifecycle: Arc<dyn ExtensionLifecycle>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            lifecycle: Some(lifecycle),
            ..Self::new(value)
        }
    }

    /// The instance as `Arc<T>`, if that is what it holds
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + 'static,
    {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    pub fn is<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.value.is::<Arc<T>>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn lifecycle(&self) -> Option<&Arc<dyn ExtensionLifecycle>> {
        self.lifecycle.as_ref()
    }

    /// Whether both handles refer to the same resolved instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("type", &self.type_name)
            .field("lifecycle", &self.lifecycle.is_some())
            .finish()
    }
}
