//! Resolution facade tests: lifetime routing, required/optional guards, handles

use crate::test_utils::fixture_compiler::{FixedGreeter, Greeter};
use crate::test_utils::mock_collaborators::{Harness, TestProvider};
use exten_application::{ExtensionPoint, ExtensionResolver, RegistryOptions, ScopedExtensionRegistry};
use exten_domain::error::Error;
use exten_domain::ports::ServiceProviderExt;
use std::sync::Arc;

fn setup() -> (Harness, ExtensionResolver) {
    let harness = Harness::new();
    harness.store.set_silently("greeter.script", "greet hello");
    harness.store.set_silently("session.script", "greet session");
    let resolver = ExtensionResolver::new(harness.singleton(RegistryOptions::default()));
    (harness, resolver)
}

#[tokio::test]
async fn test_scoped_point_needs_a_scope() {
    let (_harness, resolver) = setup();
    let point = ExtensionPoint::<dyn Greeter>::scoped("session");

    let err = resolver
        .resolve(&point, &TestProvider::root())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidLifetime { .. }));

    let scope = TestProvider::scope(resolver.singleton());
    let resolved = resolver.resolve(&point, &scope).await.unwrap().unwrap();
    assert_eq!(resolved.greet(), "session");
    assert!(
        scope
            .get::<ScopedExtensionRegistry>()
            .unwrap()
            .is_cached(&point)
    );
}

#[tokio::test]
async fn test_transient_routing_follows_provider() {
    let (harness, resolver) = setup();
    let point = ExtensionPoint::<dyn Greeter>::transient("greeter");
    let root = TestProvider::root_for(resolver.singleton());
    let scope = root.create_scope();

    resolver.resolve(&point, &root).await.unwrap();
    resolver.resolve(&point, &scope).await.unwrap();

    let orphan_scope = TestProvider::root().create_scope();
    let err = resolver.resolve(&point, &orphan_scope).await.unwrap_err();
    assert!(matches!(err, Error::InvalidLifetime { .. }));
    assert_eq!(harness.compiler.invocations(), 2);
}

#[tokio::test]
async fn test_singleton_same_from_root_and_scope() {
    let (_harness, resolver) = setup();
    let point = ExtensionPoint::<dyn Greeter>::singleton("greeter");
    let root = TestProvider::root_for(resolver.singleton());
    let scope = root.create_scope();

    let from_root = resolver.resolve(&point, &root).await.unwrap().unwrap();
    let from_scope = resolver.resolve(&point, &scope).await.unwrap().unwrap();

    assert!(Arc::ptr_eq(&from_root, &from_scope));
}

#[tokio::test]
async fn test_resolve_required_and_optional_guards() {
    let (_harness, resolver) = setup();
    let root = TestProvider::root();
    let required = ExtensionPoint::<dyn Greeter>::singleton("greeter");
    let optional = ExtensionPoint::<dyn Greeter>::singleton("absent").optional();

    assert_eq!(
        resolver.resolve_required(&required, &root).await.unwrap().greet(),
        "hello"
    );
    assert!(resolver.resolve_optional(&optional, &root).await.unwrap().is_none());

    let err = resolver.resolve_required(&optional, &root).await.unwrap_err();
    assert!(matches!(err, Error::Resolution { .. }));
    let err = resolver.resolve_optional(&required, &root).await.unwrap_err();
    assert!(matches!(err, Error::Resolution { .. }));

    let defaulted = ExtensionPoint::<dyn Greeter>::singleton("defaulted")
        .with_default(|_| Arc::new(FixedGreeter("default".to_string())) as Arc<dyn Greeter>);
    assert_eq!(
        resolver.resolve_required(&defaulted, &root).await.unwrap().greet(),
        "default"
    );
}

#[test]
fn test_resolve_blocking_outside_runtime() {
    let (harness, resolver) = setup();
    let point = ExtensionPoint::<dyn Greeter>::singleton("greeter");
    let root = TestProvider::root();

    let first = resolver.resolve_blocking(&point, &root).unwrap().unwrap();
    let second = resolver.resolve_blocking(&point, &root).unwrap().unwrap();

    assert_eq!(first.greet(), "hello");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(harness.compiler.invocations(), 1);
}

#[tokio::test]
async fn test_handle_observes_reloaded_source() {
    let (harness, resolver) = setup();
    let point = ExtensionPoint::<dyn Greeter>::singleton("greeter");
    let handle = resolver.handle(&point, &TestProvider::root());

    assert_eq!(handle.get_required().await.unwrap().greet(), "hello");
    harness.store.set("greeter.script", "greet reloaded");

    assert_eq!(handle.get().await.unwrap().unwrap().greet(), "reloaded");
    assert_eq!(handle.point().key(), "greeter");
}

#[tokio::test]
async fn test_clear_forwarding() {
    let (_harness, resolver) = setup();
    let point = ExtensionPoint::<dyn Greeter>::singleton("greeter");
    let root = TestProvider::root();
    assert!(resolver.register(&point).unwrap());
    assert_eq!(resolver.registered().len(), 1);

    resolver.resolve(&point, &root).await.unwrap();
    assert_eq!(resolver.clear_point(&point).unwrap(), 1);

    resolver.resolve(&point, &root).await.unwrap();
    assert_eq!(resolver.clear_path("greeter.script").unwrap(), 1);

    resolver.resolve(&point, &root).await.unwrap();
    assert_eq!(resolver.clear_all().unwrap(), 1);
}
