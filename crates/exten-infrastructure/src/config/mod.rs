//! Engine configuration
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Configuration sections with their defaults |
//! | [`loader`] | Figment loader and programmatic builder |

pub mod loader;
pub mod types;

pub use loader::{ConfigBuilder, ConfigLoader};
pub use types::{
    EngineConfig, FactoryConfig, LoggingConfig, PreprocessorConfig, RegistryConfig, SourceConfig,
};
