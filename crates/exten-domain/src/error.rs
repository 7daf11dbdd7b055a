//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Exten engine
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (simple form)
    #[error("I/O error: {source}")]
    IoSimple {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// I/O operation error (with context)
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A required unit or its source text is missing
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// The compiler rejected a unit or library, or a dependency cycle was found
    #[error("Compilation error: {message}")]
    Compilation {
        /// Summary of the failure
        message: String,
        /// Compiler diagnostics, one entry per reported problem
        diagnostics: Vec<String>,
    },

    /// Restricted mode rejected a definition that was not pre-registered
    #[error("Definition not allowed: {key}")]
    DefinitionNotAllowed {
        /// Key of the rejected definition
        key: String,
    },

    /// Restricted mode rejected an extension point that was not pre-registered
    #[error("Extension not allowed: {key}")]
    ExtensionNotAllowed {
        /// Key of the rejected extension point
        key: String,
    },

    /// A required extension produced no instance, or the instance has the wrong type
    #[error("Resolution error: {message}")]
    Resolution {
        /// Description of the resolution failure
        message: String,
    },

    /// Illegal cross-scope resolution
    #[error("Invalid lifetime: {message}")]
    InvalidLifetime {
        /// Description of the illegal request
        message: String,
    },

    /// The caller's cancellation signal fired
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// The operation that was cancelled
        operation: String,
    },

    /// The component was already shut down
    #[error("Component disposed: {component}")]
    Disposed {
        /// Name of the disposed component
        component: String,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

// Basic error creation methods
impl Error {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a disposed-component error
    pub fn disposed<S: Into<String>>(component: S) -> Self {
        Self::Disposed {
            component: component.into(),
        }
    }
}

// Compilation error creation methods
impl Error {
    /// Create a compilation error without diagnostics
    pub fn compilation<S: Into<String>>(message: S) -> Self {
        Self::Compilation {
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    /// Create a compilation error carrying compiler diagnostics
    pub fn compilation_with_diagnostics<S: Into<String>>(
        message: S,
        diagnostics: Vec<String>,
    ) -> Self {
        Self::Compilation {
            message: message.into(),
            diagnostics,
        }
    }

    /// Create a cycle error from the chain of library paths that closes the loop
    pub fn dependency_cycle<I, S>(chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let chain: Vec<String> = chain.into_iter().map(|s| s.as_ref().to_string()).collect();
        Self::Compilation {
            message: format!(
                "Circular reference detected: {}",
                chain.join(crate::constants::CYCLE_CHAIN_SEPARATOR)
            ),
            diagnostics: chain,
        }
    }
}

// Restricted-mode and resolution error creation methods
impl Error {
    /// Create a definition-not-allowed error
    pub fn definition_not_allowed<S: Into<String>>(key: S) -> Self {
        Self::DefinitionNotAllowed { key: key.into() }
    }

    /// Create an extension-not-allowed error
    pub fn extension_not_allowed<S: Into<String>>(key: S) -> Self {
        Self::ExtensionNotAllowed { key: key.into() }
    }

    /// Create a resolution error
    pub fn resolution<S: Into<String>>(message: S) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }

    /// Create an invalid lifetime error
    pub fn invalid_lifetime<S: Into<String>>(message: S) -> Self {
        Self::InvalidLifetime {
            message: message.into(),
        }
    }
}

// I/O and configuration error creation methods
impl Error {
    /// Create an I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with source
    pub fn io_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn configuration_with_source<
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    >(
        message: S,
        source: E,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl Error {
    /// Whether this error came from the compiler or from cycle detection
    pub fn is_compilation(&self) -> bool {
        matches!(self, Self::Compilation { .. })
    }

    /// Compiler diagnostics carried by the error, empty for other kinds
    pub fn diagnostics(&self) -> &[String] {
        match self {
            Self::Compilation { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}
