//! Test utilities for exten-application
//!
//! Provides a fixture compiler for a tiny line language and in-memory
//! stand-ins for the source store, preprocessor and DI provider.
