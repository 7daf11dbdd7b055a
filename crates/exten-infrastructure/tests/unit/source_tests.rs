//! Source Store Tests

use exten_domain::error::Error;
use exten_domain::events::{SourceChanged, Subscription};
use exten_domain::ports::SourceStore;
use exten_domain::{Shape, UnitDefinition};
use exten_infrastructure::config::SourceConfig;
use exten_infrastructure::source::{FileSystemSourceStore, InMemorySourceStore, resolve_relative};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn definition(key: &str) -> UnitDefinition {
    UnitDefinition::new(key, Shape::unit(), Shape::of::<i64>())
}

fn record_changes(store: &dyn SourceStore) -> (Arc<Mutex<Vec<String>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = store
        .change_feed()
        .expect("store publishes changes")
        .subscribe(move |event: &SourceChanged| sink.lock().unwrap().push(event.path.clone()));
    (seen, subscription)
}

// ============================================================================
// Path resolution
// ============================================================================

#[test]
fn test_resolve_relative_to_base_directory() {
    assert_eq!(
        resolve_relative(Some("pricing/rules.script"), "shared.lib.script").unwrap(),
        "pricing/shared.lib.script"
    );
    assert_eq!(
        resolve_relative(Some("pricing/rules.script"), "../common/base.lib.script").unwrap(),
        "common/base.lib.script"
    );
    assert_eq!(
        resolve_relative(Some("a/b/c.script"), "./d/../e.txt").unwrap(),
        "a/b/e.txt"
    );
}

#[test]
fn test_resolve_root_relative_and_backslashes() {
    assert_eq!(
        resolve_relative(Some("deep/nested/unit.script"), "/top.lib.script").unwrap(),
        "top.lib.script"
    );
    assert_eq!(
        resolve_relative(None, "libs\\base.lib.script").unwrap(),
        "libs/base.lib.script"
    );
}

#[test]
fn test_resolve_rejects_escaping_root() {
    let result = resolve_relative(Some("unit.script"), "../outside.txt");

    assert!(matches!(result, Err(Error::NotFound { .. })));
}

// ============================================================================
// In-memory store
// ============================================================================

#[test]
fn test_memory_store_unit_text_and_path() {
    let store = InMemorySourceStore::new();
    store.insert_unit("pricing/discount", "return 5");

    let text = store
        .resolve_source_text(&definition("pricing/discount"))
        .unwrap();
    assert_eq!(text.as_deref(), Some("return 5"));
    assert_eq!(
        store.resolve_source_path(&definition("pricing/discount")).unwrap(),
        "pricing/discount.script"
    );
    assert_eq!(store.resolve_source_text(&definition("absent")).unwrap(), None);
}

#[test]
fn test_memory_store_missing_reference_is_not_found() {
    let store = InMemorySourceStore::new();

    let result = store.resolve_reference_text(&definition("unit"), "missing.txt");

    assert!(matches!(result, Err(Error::NotFound { .. })));
}

#[test]
fn test_memory_store_publishes_changes() {
    let store = InMemorySourceStore::with_unit_extension("csx");
    let (seen, _subscription) = record_changes(&store);

    store.insert_unit("a", "return 1");
    store.insert("shared.lib.csx", "token x");
    store.insert_silently("quiet.csx", "return 2");
    assert_eq!(store.remove("shared.lib.csx").as_deref(), Some("token x"));
    assert_eq!(store.remove("never-there.csx"), None);

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["a.csx", "shared.lib.csx", "shared.lib.csx"]
    );
    assert_eq!(store.paths(), vec!["a.csx", "quiet.csx"]);
    assert!(store.contains("quiet.csx"));
}

// ============================================================================
// File system store
// ============================================================================

fn source_root() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("pricing")).unwrap();
    std::fs::write(dir.path().join("pricing/discount.script"), "return 5").unwrap();
    std::fs::write(dir.path().join("pricing/shared.lib.script"), "token a").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    dir
}

#[test]
fn test_file_store_reads_units() {
    let dir = source_root();
    let store = FileSystemSourceStore::new(dir.path(), "script".to_string()).unwrap();

    let text = store
        .resolve_source_text(&definition("pricing/discount"))
        .unwrap();

    assert_eq!(text.as_deref(), Some("return 5"));
    assert_eq!(store.resolve_source_text(&definition("nope")).unwrap(), None);
    assert_eq!(
        store.resolve_source_path(&definition("pricing/discount")).unwrap(),
        "pricing/discount.script"
    );
}

#[test]
fn test_file_store_unit_keys_are_folded_and_confined() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("root/pricing")).unwrap();
    std::fs::write(dir.path().join("root/pricing/discount.script"), "return 5").unwrap();
    std::fs::write(dir.path().join("secret.script"), "return 1").unwrap();
    let store = FileSystemSourceStore::new(dir.path().join("root"), "script".to_string()).unwrap();

    let folded = definition("pricing/./discount");
    assert_eq!(store.resolve_source_path(&folded).unwrap(), "pricing/discount.script");
    assert_eq!(store.resolve_source_text(&folded).unwrap().as_deref(), Some("return 5"));

    let escaping = definition("../secret");
    assert!(matches!(store.resolve_source_text(&escaping), Err(Error::NotFound { .. })));
    assert!(matches!(store.resolve_source_path(&escaping), Err(Error::NotFound { .. })));
}

#[test]
fn test_file_store_references() {
    let dir = source_root();
    let store = FileSystemSourceStore::new(dir.path(), "script".to_string()).unwrap();
    let unit = definition("pricing/discount");

    let path = store
        .resolve_reference_path(&unit, "shared.lib.script", Some("pricing/discount.script"))
        .unwrap();
    assert_eq!(path, "pricing/shared.lib.script");
    assert_eq!(store.resolve_reference_text(&unit, &path).unwrap(), "token a");

    let missing = store.resolve_reference_text(&unit, "pricing/gone.txt");
    assert!(matches!(missing, Err(Error::NotFound { .. })));
}

#[test]
fn test_file_store_lists_unit_keys() {
    let dir = source_root();
    let store = FileSystemSourceStore::new(dir.path(), "script".to_string()).unwrap();

    let keys = store.unit_keys().unwrap();

    assert_eq!(keys, vec!["pricing/discount", "pricing/shared.lib"]);
}

#[test]
fn test_file_store_missing_root_fails() {
    let dir = TempDir::new().unwrap();

    let result = FileSystemSourceStore::new(dir.path().join("missing"), "script".to_string());

    assert!(matches!(result, Err(Error::Io { .. })));
}

#[test]
fn test_file_store_store_path_mapping() {
    let dir = source_root();
    let store = FileSystemSourceStore::new(dir.path(), "script".to_string()).unwrap();

    let file = store.file_path("pricing/discount.script");

    assert_eq!(store.store_path(&file).as_deref(), Some("pricing/discount.script"));
    assert_eq!(store.store_path(std::path::Path::new("/elsewhere/x.script")), None);
}

#[tokio::test]
async fn test_file_store_watch_reports_changes() {
    let dir = source_root();
    let config = SourceConfig {
        root_dir: dir.path().to_path_buf(),
        unit_extension: "script".to_string(),
        watch: true,
    };
    let store = FileSystemSourceStore::open(&config).unwrap();
    assert!(store.is_watching());
    let (seen, _subscription) = record_changes(&store);

    std::fs::write(dir.path().join("pricing/discount.script"), "return 6").unwrap();

    let mut reported = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if seen
            .lock()
            .unwrap()
            .iter()
            .any(|path| path == "pricing/discount.script")
        {
            reported = true;
            break;
        }
    }
    assert!(reported, "watcher never reported the change");

    store.unwatch();
    assert!(!store.is_watching());
}
