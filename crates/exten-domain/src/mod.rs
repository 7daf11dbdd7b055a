//! # Domain Layer
//!
//! Types and contracts shared by every Exten crate.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`value_objects`] | Unit definitions, shapes, lifetimes, preprocessor output |
//! | [`events`] | Callback change feeds, source-change and eviction events |
//! | [`ports`] | Source store, preprocessor, compiler and DI provider traits |
//! | [`error`] | Error taxonomy and `Result` alias |

pub mod constants;
pub mod error;
pub mod events;
pub mod ports;
pub mod value_objects;

pub use error::{Error, Result};
pub use value_objects::{Lifetime, PreprocessResult, Shape, UnitDefinition};
