//! Dependency Injection
//!
//! A small type-keyed container implementing the [`ServiceProvider`] port.
//!
//! ```text
//! ServiceCollection ──build──► ServiceContainer (root)
//!   add_singleton                 │ singletons
//!   add_scoped                    └─create_scope──► ServiceScope
//!                                                     singletons (shared)
//!                                                     scoped (one per scope, lazy)
//! ```
//!
//! Scoped services never resolve from the root; asking the root for one
//! returns `None`. Extension points added with
//! `add_extension_as_service` resolve through the extension registries on
//! every lookup, following the point's lifetime.
//!
//! [`ServiceProvider`]: exten_domain::ports::ServiceProvider

mod collection;
mod scope;

pub use collection::{ServiceCollection, ServiceContainer};
pub use scope::ServiceScope;
