//! Infrastructure layer constants
//!
//! Defaults of the configuration and of the reference collaborators.
//! Engine-level constants are defined in `exten_domain::constants`.

// ============================================================================
// CONFIGURATION CONSTANTS
// ============================================================================

/// Default configuration file name
pub const DEFAULT_CONFIG_FILENAME: &str = "exten.toml";

/// Default configuration directory name
pub const DEFAULT_CONFIG_DIR: &str = "exten";

/// Environment variable prefix for configuration
pub const CONFIG_ENV_PREFIX: &str = "EXTEN";

/// Separator between nested keys in environment variables
pub const CONFIG_ENV_SEPARATOR: &str = "__";

// ============================================================================
// LOGGING CONSTANTS
// ============================================================================

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable overriding the log filter
pub const LOG_FILTER_ENV: &str = "EXTEN_LOG";

/// File stem of rolling log files when the configured path has none
pub const LOG_FILE_STEM: &str = "exten";

// ============================================================================
// SOURCE STORE CONSTANTS
// ============================================================================

/// Default directory holding unit sources
pub const DEFAULT_SOURCE_ROOT: &str = "scripts";

/// Default file extension of unit sources, without the dot
pub const DEFAULT_UNIT_EXTENSION: &str = "script";

// ============================================================================
// PREPROCESSOR CONSTANTS
// ============================================================================

/// Directive loading a library or a plain reference
pub const LOAD_DIRECTIVE: &str = "#load";

/// Directive opening a named region
pub const REGION_DIRECTIVE: &str = "#region";

/// Directive closing the innermost region
pub const ENDREGION_DIRECTIVE: &str = "#endregion";

/// Keyword of import lines (`using name;`)
pub const IMPORT_KEYWORD: &str = "using";

/// Line comment marker; stripped directives are kept behind it
pub const LINE_COMMENT: &str = "//";

/// Block comment opener; directive parsing stops at it
pub const BLOCK_COMMENT: &str = "/*";

/// Default suffix marking a loaded path as a library unit
pub const DEFAULT_LIBRARY_SUFFIX: &str = ".lib.script";

/// Regions removed by default
pub const DEFAULT_REMOVED_REGIONS: &[&str] = &["preamble"];
