//! Collaborator ports
//!
//! | Port | Collaborator |
//! |------|--------------|
//! | [`SourceStore`] | Where unit text lives and change notifications |
//! | [`Preprocessor`] | Directive extraction and text normalization |
//! | [`ScriptCompiler`] / [`ScriptArtifact`] | Compilation and execution |
//! | [`ServiceProvider`] | Dependency-injection scopes and services |

pub mod compiler;
pub mod preprocessor;
pub mod services;
pub mod source_store;

pub use compiler::{
    ArtifactKind, CompileRequest, ReferencedSource, ScriptArtifact, ScriptCompiler, ScriptValue,
};
pub use preprocessor::Preprocessor;
pub use services::{ServiceProvider, ServiceProviderExt, SharedService};
pub use source_store::SourceStore;
