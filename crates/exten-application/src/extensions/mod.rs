//! # Extensions
//!
//! | Type | Role |
//! |------|------|
//! | [`ExtensionPoint`] | Typed point: key, lifetime, default, resolution hook |
//! | [`PointDescriptor`] | Type-erased point shared by the registries |
//! | [`Extension`] | Resolved instance plus optional lifecycle hooks |
//! | [`ExtensionContext`] | Provider and result slot handed to extension units |

mod context;
mod instance;
mod point;

pub use context::ExtensionContext;
pub use instance::{Extension, ExtensionLifecycle};
pub use point::{DefaultFactory, ExtensionPoint, PointDescriptor, ResolvedHook, extension_input};
