//! Extension lifetimes

use serde::{Deserialize, Serialize};
use std::fmt;

/// How long a resolved extension instance lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    /// One instance for the whole process
    #[default]
    Singleton,
    /// One instance per DI scope (request, unit of work)
    Scoped,
    /// A new instance on every resolution
    Transient,
}

impl Lifetime {
    /// Whether instances with this lifetime are memoized by a registry
    pub fn is_cached(self) -> bool {
        !matches!(self, Self::Transient)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Singleton => "singleton",
            Self::Scoped => "scoped",
            Self::Transient => "transient",
        };
        f.write_str(name)
    }
}
