//! Application Layer - Exten
//!
//! Script-unit caching and extension resolution on top of the ports
//! declared in `exten-domain`.
//!
//! ## Architecture
//!
//! - [`factory`]: library DAG, compiled units, the unit cache and its
//!   eviction rules (source changes, explicit clears)
//! - [`extensions`]: extension points and resolved instances
//! - [`registry`]: singleton and scoped registries sharing one resolution
//!   algorithm
//! - [`resolver`]: the facade routing a point to the registry that owns its
//!   lifetime
//! - [`blocking`]: synchronous entry points backed by a dedicated worker
//!
//! ## Dependencies
//!
//! This crate depends only on:
//! - `exten-domain`: definitions, errors, events and collaborator ports
//! - async and concurrency libraries (`tokio`, `dashmap`, `arc-swap`)

pub mod blocking;
pub mod extensions;
pub mod factory;
pub mod registry;
pub mod resolver;

pub use blocking::run_blocking;
pub use extensions::{
    Extension, ExtensionContext, ExtensionLifecycle, ExtensionPoint, PointDescriptor,
};
pub use factory::{CompiledLibrary, CompiledUnit, FactoryOptions, LibraryCache, UnitFactory};
pub use registry::{
    ExtensionCatalog, RegistryOptions, ScopedExtensionRegistry, SingletonExtensionRegistry,
};
pub use resolver::{ExtensionHandle, ExtensionResolver};
