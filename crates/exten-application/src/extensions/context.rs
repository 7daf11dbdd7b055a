//! Execution context handed to extension units

use super::instance::{Extension, ExtensionLifecycle};
use exten_domain::ports::ServiceProvider;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Input of every extension unit: the caller's provider and one result slot
///
/// Units receive it as `Arc<ExtensionContext>` and publish their
/// implementation with [`set_result`](Self::set_result).
pub struct ExtensionContext {
    provider: Arc<dyn ServiceProvider>,
    result: Mutex<Option<Extension>>,
}

impl ExtensionContext {
    pub fn new(provider: Arc<dyn ServiceProvider>) -> Self {
        Self {
            provider,
            result: Mutex::new(None),
        }
    }

    /// Provider of the scope the extension is resolved in
    pub fn provider(&self) -> &Arc<dyn ServiceProvider> {
        &self.provider
    }

    pub fn set_result<T>(&self, value: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.set_extension(Extension::new(value));
    }

    pub fn set_result_with_lifecycle<T>(&self, value: Arc<T>, lifecycle: Arc<dyn ExtensionLifecycle>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.set_extension(Extension::with_lifecycle(value, lifecycle));
    }

    /// Replace the result slot; the last write wins
    pub fn set_extension(&self, extension: Extension) {
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(extension);
    }

    pub fn has_result(&self) -> bool {
        self.result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn take_result(&self) -> Option<Extension> {
        self.result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl fmt::Debug for ExtensionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("root", &self.provider.is_root())
            .field("has_result", &self.has_result())
            .finish()
    }
}
