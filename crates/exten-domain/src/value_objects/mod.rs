//! Value objects shared by every layer

mod definition;
mod lifetime;
mod preprocess;

pub use definition::{Shape, UnitDefinition};
pub use lifetime::Lifetime;
pub use preprocess::PreprocessResult;
