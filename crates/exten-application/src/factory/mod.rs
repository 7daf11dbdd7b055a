//! # Unit Factory
//!
//! | Type | Role |
//! |------|------|
//! | [`UnitFactory`] | Definition to unit cache, hot reload, eviction feed |
//! | [`CompiledUnit`] | Lazily compiled, single-flight unit |
//! | [`LibraryCache`] / [`CompiledLibrary`] | Library DAG keyed by store path |
//! | [`FactoryOptions`] | Restricted mode, hot reload, imports and references |

mod library;
mod locks;
mod options;
mod unit;
mod unit_factory;

pub use library::{CompiledLibrary, LibraryCache};
pub use options::FactoryOptions;
pub use unit::{CompiledState, CompiledUnit, UnitState};
pub use unit_factory::UnitFactory;
