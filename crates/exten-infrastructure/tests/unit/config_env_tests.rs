//! Environment override tests
//!
//! These tests modify environment variables and must run sequentially:
//!
//! ```bash
//! cargo test -p exten-infrastructure --test unit config_env -- --test-threads=1 --ignored
//! ```
//!
//! Tests use `unsafe` blocks for `env::set_var`/`env::remove_var` because
//! Rust 2024 edition requires this for environment variable mutations.

use exten_infrastructure::config::ConfigLoader;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn set_env(key: &str, value: &str) {
    // SAFETY: Tests must run with --test-threads=1
    unsafe {
        env::set_var(key, value);
    }
}

fn remove_env(key: &str) {
    // SAFETY: Tests must run with --test-threads=1
    unsafe {
        env::remove_var(key);
    }
}

fn absent_file(dir: &TempDir) -> PathBuf {
    dir.path().join("absent.toml")
}

#[test]
#[ignore = "requires --test-threads=1 due to env var mutations"]
fn test_nested_env_override() {
    let dir = TempDir::new().unwrap();
    set_env("EXTEN_FACTORY__ENABLE_HOT_RELOAD", "false");
    set_env("EXTEN_SOURCE__UNIT_EXTENSION", "csx");

    let config = ConfigLoader::new()
        .with_config_path(absent_file(&dir))
        .load()
        .expect("Should load config");

    assert!(!config.factory.enable_hot_reload);
    assert_eq!(config.source.unit_extension, "csx");

    remove_env("EXTEN_FACTORY__ENABLE_HOT_RELOAD");
    remove_env("EXTEN_SOURCE__UNIT_EXTENSION");
}

#[test]
#[ignore = "requires --test-threads=1 due to env var mutations"]
fn test_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exten.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
    set_env("EXTEN_LOGGING__LEVEL", "warn");

    let config = ConfigLoader::new().with_config_path(&path).load().unwrap();

    assert_eq!(config.logging.level, "warn");
    remove_env("EXTEN_LOGGING__LEVEL");
}

#[test]
#[ignore = "requires --test-threads=1 due to env var mutations"]
fn test_custom_env_prefix() {
    let dir = TempDir::new().unwrap();
    set_env("PLUGINS_REGISTRY__ALLOW_ONLY_PREREGISTERED_EXTENSIONS", "true");

    let config = ConfigLoader::new()
        .with_config_path(absent_file(&dir))
        .with_env_prefix("PLUGINS")
        .load()
        .unwrap();

    assert!(config.registry.allow_only_preregistered_extensions);
    remove_env("PLUGINS_REGISTRY__ALLOW_ONLY_PREREGISTERED_EXTENSIONS");
}
