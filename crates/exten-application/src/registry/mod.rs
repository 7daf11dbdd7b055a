//! # Extension Registries
//!
//! | Type | Caches |
//! |------|--------|
//! | [`SingletonExtensionRegistry`] | Singleton points, and transients resolved from the root provider |
//! | [`ScopedExtensionRegistry`] | Scoped points of one DI scope; delegates singletons |
//! | [`ExtensionCatalog`] | Registered points shared by every registry |
//!
//! Both registries run the same algorithm: cached fast path, per-point
//! lock, unit execution with a fresh [`ExtensionContext`](crate::extensions::ExtensionContext),
//! default fallback, `on_init`, resolution hook, then caching unless the
//! point is transient.

mod resolution;
mod options;
mod scoped;
mod singleton;

pub use options::{ExtensionCatalog, RegistryOptions};
pub use scoped::ScopedExtensionRegistry;
pub use singleton::SingletonExtensionRegistry;
