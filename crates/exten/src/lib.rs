//! # Exten
//!
//! Runtime extensibility for host applications: script units are compiled
//! on demand, cached, and evicted when their sources (or any library they
//! load) change; extension points resolve to instances produced by those
//! units under singleton, scoped or transient lifetimes.
//!
//! ## Example
//!
//! ```ignore
//! use exten::{EngineBuilder, ExtensionPoint};
//! use exten::infrastructure::config::ConfigLoader;
//!
//! let engine = EngineBuilder::new(ConfigLoader::new().load()?)
//!     .with_compiler(compiler)
//!     .build()?;
//! let pricing = ExtensionPoint::<dyn PricingRule>::singleton("pricing/discount");
//! let rule = engine.resolve(&pricing).await?;
//! ```
//!
//! ## Architecture
//!
//! - `domain` - definitions, errors, events and collaborator ports
//! - `application` - unit factory, library DAG, registries and resolver
//! - `infrastructure` - configuration, logging, source stores, preprocessor, bootstrap
//! - [`inspect`] - static dependency analysis used by the CLI

pub mod inspect;

/// Domain layer
pub mod domain {
    pub use exten_domain::*;
}

/// Application layer
pub mod application {
    pub use exten_application::*;
}

/// Infrastructure layer
pub mod infrastructure {
    pub use exten_infrastructure::*;
}

pub use domain::{Error, Lifetime, Result, Shape, UnitDefinition};
pub use application::{
    Extension, ExtensionContext, ExtensionHandle, ExtensionLifecycle, ExtensionPoint,
    ExtensionResolver, UnitFactory,
};
pub use infrastructure::{Engine, EngineBuilder};
