//! Configuration Tests

use exten_domain::error::Error;
use exten_infrastructure::config::{
    ConfigBuilder, ConfigLoader, EngineConfig, PreprocessorConfig, SourceConfig,
};
use exten_infrastructure::constants::{
    DEFAULT_LIBRARY_SUFFIX, DEFAULT_LOG_LEVEL, DEFAULT_SOURCE_ROOT, DEFAULT_UNIT_EXTENSION,
};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_engine_config_defaults() {
    let config = EngineConfig::default();

    assert!(config.factory.enable_hot_reload);
    assert!(!config.factory.allow_only_defined_units);
    assert!(!config.registry.allow_only_preregistered_extensions);
    assert!(config.preprocessor.exclude_underscore_loads);
    assert!(config.preprocessor.enable_library_units);
    assert_eq!(config.preprocessor.removed_regions, vec!["preamble"]);
    assert_eq!(config.preprocessor.library_suffix, DEFAULT_LIBRARY_SUFFIX);
    assert_eq!(config.source.root_dir, PathBuf::from(DEFAULT_SOURCE_ROOT));
    assert_eq!(config.source.unit_extension, DEFAULT_UNIT_EXTENSION);
    assert_eq!(config.logging.level, DEFAULT_LOG_LEVEL);
}

#[test]
fn test_factory_config_to_options() {
    let mut config = EngineConfig::default();
    config.factory.enable_hot_reload = false;
    config.factory.imports = vec!["System".to_string()];

    let options = config.factory.to_options();

    assert!(!options.enable_hot_reload);
    assert_eq!(options.imports, vec!["System"]);
    assert!(options.definitions.is_empty());
}

#[test]
fn test_load_from_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exten.toml");
    std::fs::write(
        &path,
        r#"
[factory]
enable_hot_reload = false
imports = ["System.Linq"]

[registry]
allow_only_preregistered_extensions = true

[source]
root_dir = "plugins"
unit_extension = "csx"

[preprocessor]
removed_regions = ["preamble", "generated"]
"#,
    )
    .unwrap();

    let config = ConfigLoader::new().with_config_path(&path).load().unwrap();

    assert!(!config.factory.enable_hot_reload);
    assert_eq!(config.factory.imports, vec!["System.Linq"]);
    assert!(config.registry.allow_only_preregistered_extensions);
    assert_eq!(config.source.root_dir, PathBuf::from("plugins"));
    assert_eq!(config.source.unit_extension, "csx");
    assert_eq!(config.preprocessor.removed_regions, vec!["preamble", "generated"]);
    // untouched sections keep their defaults
    assert!(config.source.watch);
    assert_eq!(config.logging.level, DEFAULT_LOG_LEVEL);
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();

    let config = ConfigLoader::new()
        .with_config_path(dir.path().join("absent.toml"))
        .load()
        .unwrap();

    assert_eq!(config.factory, EngineConfig::default().factory);
}

#[test]
fn test_malformed_value_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exten.toml");
    std::fs::write(&path, "[factory]\nenable_hot_reload = \"sometimes\"\n").unwrap();

    let result = ConfigLoader::new().with_config_path(&path).load();

    assert!(matches!(result, Err(Error::Configuration { .. })));
}

#[test]
fn test_invalid_file_values_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exten.toml");
    std::fs::write(&path, "[logging]\nlevel = \"loud\"\n").unwrap();

    let error = ConfigLoader::new()
        .with_config_path(&path)
        .load()
        .unwrap_err();

    assert!(error.to_string().contains("Invalid log level"));
}

#[test]
fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("saved.toml");
    let config = ConfigBuilder::new()
        .with_root_dir("units")
        .with_hot_reload(false)
        .build()
        .unwrap();

    let loader = ConfigLoader::new().with_config_path(&path);
    loader.save_to_file(&config, &path).unwrap();
    let loaded = loader.load().unwrap();

    assert_eq!(loaded.source, config.source);
    assert_eq!(loaded.factory, config.factory);
    assert_eq!(loader.config_path(), Some(path.as_path()));
}

#[test]
fn test_builder_hot_reload_switches_watching_too() {
    let config = ConfigBuilder::new().with_hot_reload(false).build().unwrap();

    assert!(!config.factory.enable_hot_reload);
    assert!(!config.source.watch);
}

#[test]
fn test_builder_rejects_dotted_extension() {
    let result = ConfigBuilder::new()
        .with_source(SourceConfig {
            unit_extension: ".script".to_string(),
            ..SourceConfig::default()
        })
        .build();

    assert!(matches!(result, Err(Error::Configuration { .. })));
}

#[test]
fn test_builder_rejects_empty_library_suffix() {
    let empty_suffix = PreprocessorConfig {
        library_suffix: String::new(),
        ..PreprocessorConfig::default()
    };
    assert!(
        ConfigBuilder::new()
            .with_preprocessor(empty_suffix.clone())
            .build()
            .is_err()
    );

    // without library units the suffix is irrelevant
    let without_libraries = PreprocessorConfig {
        enable_library_units: false,
        ..empty_suffix
    };
    assert!(
        ConfigBuilder::new()
            .with_preprocessor(without_libraries)
            .build()
            .is_ok()
    );
}

#[test]
fn test_builder_rejects_blank_region_name() {
    let config = PreprocessorConfig {
        removed_regions: vec![" ".to_string()],
        ..PreprocessorConfig::default()
    };

    assert!(ConfigBuilder::new().with_preprocessor(config).build().is_err());
}
