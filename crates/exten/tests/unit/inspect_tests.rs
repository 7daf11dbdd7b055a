//! Dependency Inspection Tests

use exten::infrastructure::config::PreprocessorConfig;
use exten::infrastructure::preprocessor::DirectivePreprocessor;
use exten::infrastructure::source::FileSystemSourceStore;
use exten::inspect::inspect_units;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, path: &str, text: &str) {
    let file = root.join(path);
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(file, text).unwrap();
}

fn inspect(root: &Path) -> Vec<exten::inspect::UnitReport> {
    let store = FileSystemSourceStore::new(root, "script".to_string()).unwrap();
    let preprocessor = DirectivePreprocessor::new(PreprocessorConfig::default());
    inspect_units(&store, &preprocessor).unwrap()
}

#[test]
fn test_library_chain_dependencies_first() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "lib/base.lib.script", "token base");
    write(dir.path(), "lib/mid.lib.script", "#load \"base.lib.script\"");
    write(
        dir.path(),
        "pricing.script",
        "#load \"lib/mid.lib.script\"\n#load \"lib/base.lib.script\"\n#load \"rates.txt\"",
    );
    write(dir.path(), "rates.txt", "1.5");

    let reports = inspect(dir.path());

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.key, "pricing");
    assert_eq!(report.libraries, vec!["lib/base.lib.script", "lib/mid.lib.script"]);
    assert_eq!(report.references, vec!["rates.txt"]);
    assert!(report.is_ok());
}

#[test]
fn test_cycle_is_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.lib.script", "#load \"b.lib.script\"");
    write(dir.path(), "b.lib.script", "#load \"a.lib.script\"");
    write(dir.path(), "unit.script", "#load \"a.lib.script\"");

    let reports = inspect(dir.path());

    let problem = reports[0].problem.as_deref().unwrap();
    assert!(problem.contains("a.lib.script -> b.lib.script -> a.lib.script"));
}

#[test]
fn test_missing_library_is_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "unit.script", "#load \"gone.lib.script\"");
    write(dir.path(), "other.script", "return 1");

    let reports = inspect(dir.path());

    assert_eq!(reports.len(), 2);
    assert!(reports[0].is_ok());
    assert_eq!(reports[0].key, "other");
    assert!(reports[1].problem.as_deref().unwrap().contains("gone.lib.script"));
}
