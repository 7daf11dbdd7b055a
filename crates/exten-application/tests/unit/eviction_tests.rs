//! Eviction tests: hot reload, transitive library removal, explicit clears

use crate::test_utils::fixture_compiler::FixtureCompiler;
use crate::test_utils::mock_collaborators::Harness;
use exten_application::FactoryOptions;
use exten_domain::UnitDefinition;
use exten_domain::events::UnitEvicted;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn unit(key: &str) -> UnitDefinition {
    UnitDefinition::typed::<(), String, _>(key)
}

fn number(key: &str) -> UnitDefinition {
    UnitDefinition::typed::<(), i64, _>(key)
}

async fn tokens(harness: &Harness, key: &str) -> String {
    harness
        .factory
        .get_unit(&unit(key))
        .unwrap()
        .unwrap()
        .invoke::<(), String>((), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap()
}

async fn value(harness: &Harness, key: &str) -> i64 {
    harness
        .factory
        .get_unit(&number(key))
        .unwrap()
        .unwrap()
        .invoke::<(), i64>((), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap()
}

/// Library graph `base <- mid <- top`, units on top and mid, and one unrelated unit
async fn layered(harness: &Harness) {
    harness.store.set_silently("base.lib", "token base");
    harness
        .store
        .set_silently("mid.lib", "#load \"base.lib\"\ntoken mid");
    harness
        .store
        .set_silently("other.lib", "token other");
    harness
        .store
        .set_silently("top.script", "#load \"mid.lib\"\nreturn tokens");
    harness
        .store
        .set_silently("side.script", "#load \"other.lib\"\nreturn tokens");
    harness.store.set_silently("plain.script", "return 5");

    tokens(harness, "top").await;
    tokens(harness, "side").await;
    value(harness, "plain").await;
}

fn record_evictions(harness: &Harness) -> (Arc<Mutex<Vec<String>>>, exten_domain::events::Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = harness
        .factory
        .eviction_feed()
        .subscribe(move |event: &UnitEvicted| {
            sink.lock().unwrap().push(event.definition.key().to_string());
        });
    (seen, subscription)
}

#[tokio::test]
async fn test_library_change_evicts_dependents_transitively() {
    let harness = Harness::new();
    layered(&harness).await;
    let (seen, _subscription) = record_evictions(&harness);

    harness.store.set("base.lib", "token rebased");

    assert!(!harness.factory.is_cached(&unit("top")));
    assert!(harness.factory.is_cached(&unit("side")));
    assert!(harness.factory.is_cached(&number("plain")));
    assert_eq!(harness.factory.library_cache().paths(), vec!["other.lib"]);
    assert_eq!(*seen.lock().unwrap(), vec!["top"]);

    assert_eq!(tokens(&harness, "top").await, "rebased,mid");
}

#[tokio::test]
async fn test_own_source_change_reloads_unit() {
    let harness = Harness::new();
    harness.store.set_silently("plain.script", "return 5");
    let before = harness.factory.get_unit(&number("plain")).unwrap().unwrap();
    assert_eq!(value(&harness, "plain").await, 5);

    harness.store.set("plain.script", "return 6");

    assert!(before.is_disposed());
    assert_eq!(value(&harness, "plain").await, 6);
    assert_eq!(harness.compiler.scripts(), 2);
}

#[tokio::test]
async fn test_hot_reload_disabled_keeps_stale_units() {
    let harness = Harness::with_options(FactoryOptions::default().with_hot_reload(false));
    harness.store.set_silently("plain.script", "return 5");
    assert_eq!(value(&harness, "plain").await, 5);

    harness.store.set("plain.script", "return 6");
    assert_eq!(value(&harness, "plain").await, 5);

    harness.factory.clear_path("plain.script").unwrap();
    assert_eq!(value(&harness, "plain").await, 6);
}

#[tokio::test]
async fn test_reference_change_evicts_referencing_unit() {
    let harness = Harness::new();
    harness.store.set_silently("notes.txt", "first");
    harness
        .store
        .set_silently("notes.script", "#load \"notes.txt\"\nreturn refs");
    assert_eq!(tokens(&harness, "notes").await, "first");

    harness.store.set("notes.txt", "second");

    assert_eq!(tokens(&harness, "notes").await, "second");
}

#[tokio::test]
async fn test_errored_unit_is_evicted_when_its_library_changes() {
    let harness = Harness::new();
    harness.store.set_silently("broken.lib", "fail");
    harness
        .store
        .set_silently("user.script", "#load \"broken.lib\"\nreturn tokens");

    let stale = harness.factory.get_unit(&unit("user")).unwrap().unwrap();
    assert!(
        stale
            .invoke::<(), String>((), &CancellationToken::new())
            .await
            .is_err()
    );
    assert!(stale.is_error());

    harness.store.set("broken.lib", "token repaired");

    assert!(!harness.factory.is_cached(&unit("user")));
    assert_eq!(tokens(&harness, "user").await, "repaired");
}

#[tokio::test]
async fn test_clear_definition_evicts_one_unit() {
    let harness = Harness::new();
    layered(&harness).await;
    let (seen, _subscription) = record_evictions(&harness);

    assert_eq!(harness.factory.clear_definition(&number("plain")).unwrap(), 1);
    assert_eq!(harness.factory.clear_definition(&number("plain")).unwrap(), 0);

    assert!(harness.factory.is_cached(&unit("top")));
    assert_eq!(*seen.lock().unwrap(), vec!["plain"]);
}

#[tokio::test]
async fn test_clear_all_empties_both_caches() {
    let harness = Harness::new();
    layered(&harness).await;
    let (seen, _subscription) = record_evictions(&harness);

    assert_eq!(harness.factory.clear_all().unwrap(), 3);

    assert_eq!(harness.factory.cached_units(), 0);
    assert!(harness.factory.library_cache().is_empty());
    let mut evicted = seen.lock().unwrap().clone();
    evicted.sort();
    assert_eq!(evicted, vec!["plain", "side", "top"]);
}

#[tokio::test]
async fn test_unrelated_path_evicts_nothing() {
    let harness = Harness::new();
    layered(&harness).await;

    assert_eq!(harness.factory.clear_path("unknown.lib").unwrap(), 0);
    assert_eq!(harness.factory.cached_units(), 3);
    assert_eq!(harness.factory.library_cache().len(), 3);
}

#[tokio::test]
async fn test_dropped_subscription_stops_events() {
    let harness = Harness::new();
    harness.store.set_silently("plain.script", "return 5");
    value(&harness, "plain").await;
    let (seen, subscription) = record_evictions(&harness);
    drop(subscription);

    harness.factory.clear_all().unwrap();

    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_library_change_during_compile_is_not_cached_stale() {
    let harness = Harness::with(
        FactoryOptions::default(),
        FixtureCompiler::with_delay(Duration::from_millis(200)),
    );
    harness.store.set_silently("words.lib", "token old");
    harness
        .store
        .set_silently("app.script", "#load \"words.lib\"\nreturn tokens");

    let compiling = {
        let factory = Arc::clone(&harness.factory);
        tokio::spawn(async move {
            factory
                .get_unit(&unit("app"))
                .unwrap()
                .unwrap()
                .invoke::<(), String>((), &CancellationToken::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(80)).await;
    harness.store.set("words.lib", "token new");

    let first = compiling.await.unwrap().unwrap();

    assert_eq!(first.as_deref(), Some("new"));
    assert_eq!(tokens(&harness, "app").await, "new");
    assert_eq!(harness.factory.library_cache().paths(), vec!["words.lib"]);
    assert_eq!(harness.compiler.compiles_of("words.lib"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dependent_library_compiled_during_change_is_not_cached() {
    let harness = Harness::with(
        FactoryOptions::default(),
        FixtureCompiler::with_delay(Duration::from_millis(200)),
    );
    harness.store.set_silently("base.lib", "token base");
    harness
        .store
        .set_silently("mid.lib", "#load \"base.lib\"\ntoken mid");
    harness
        .store
        .set_silently("top.script", "#load \"mid.lib\"\nreturn tokens");

    let compiling = {
        let factory = Arc::clone(&harness.factory);
        tokio::spawn(async move {
            factory
                .get_unit(&unit("top"))
                .unwrap()
                .unwrap()
                .invoke::<(), String>((), &CancellationToken::new())
                .await
        })
    };
    // base.lib is cached by now and mid.lib is still compiling against it.
    tokio::time::sleep(Duration::from_millis(300)).await;
    harness.store.set("base.lib", "token changed");

    let first = compiling.await.unwrap().unwrap();

    assert_eq!(first.as_deref(), Some("changed,mid"));
    assert_eq!(tokens(&harness, "top").await, "changed,mid");
}
