//! Change notification plumbing
//!
//! Collaborators and the unit factory announce changes through
//! [`ChangeFeed`]s; consumers register callbacks when they are built.

mod domain_events;
mod feed;

pub use domain_events::{SourceChanged, UnitEvicted};
pub use feed::{ChangeFeed, Subscription};
