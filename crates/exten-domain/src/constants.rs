//! Domain layer constants
//!
//! Values that are part of the engine's observable behavior.
//! Infrastructure defaults live in `exten_infrastructure::constants`.

/// Separator used when printing a library dependency cycle
pub const CYCLE_CHAIN_SEPARATOR: &str = " -> ";
