//! Source stores
//!
//! | Store | Description |
//! |-------|-------------|
//! | [`InMemorySourceStore`] | Map of path to text, change notifications on every write |
//! | [`FileSystemSourceStore`] | Directory of unit files, optionally watched with `notify` |
//!
//! Both stores use root-relative paths with `/` separators as store paths;
//! the unit for key `k` lives at `k.<unit extension>`.

mod filesystem;
mod memory;
mod paths;

pub use filesystem::FileSystemSourceStore;
pub use memory::InMemorySourceStore;
pub use paths::resolve_relative;
