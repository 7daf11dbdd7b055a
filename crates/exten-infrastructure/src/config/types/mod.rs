//! Configuration types module

pub mod engine;
pub mod factory;
pub mod logging;
pub mod preprocessor;
pub mod source;

pub use engine::EngineConfig;
pub use factory::{FactoryConfig, RegistryConfig};
pub use logging::LoggingConfig;
pub use preprocessor::PreprocessorConfig;
pub use source::SourceConfig;
