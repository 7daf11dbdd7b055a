//! # Infrastructure Layer
//!
//! Technical concerns around the engine: configuration, logging, the
//! reference collaborators and the composition root.
//!
//! ### Configuration & Wiring
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Figment-layered engine configuration |
//! | [`constants`] | Centralized defaults |
//! | [`di`] | Minimal type-keyed service container with scopes |
//! | [`bootstrap`] | `EngineBuilder` composition root |
//!
//! ### Collaborators
//! | Module | Description |
//! |--------|-------------|
//! | [`source`] | In-memory and directory-backed source stores |
//! | [`preprocessor`] | `#load` / `#region` / `using` directive preprocessor |
//!
//! ### Observability
//! | Module | Description |
//! |--------|-------------|
//! | [`logging`] | Structured logging with tracing |

pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod di;
pub mod error_ext;
pub mod logging;
pub mod preprocessor;
pub mod source;

pub use bootstrap::{Engine, EngineBuilder};
pub use error_ext::ErrorContext;
