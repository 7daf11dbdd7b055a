//! Service Container Tests

use crate::test_utils::{FixedGreeter, Greeter, LineCompiler};
use exten_application::{Extension, ExtensionPoint};
use exten_domain::error::Error;
use exten_domain::ports::{ServiceProvider, ServiceProviderExt, SourceStore};
use exten_infrastructure::config::EngineConfig;
use exten_infrastructure::di::ServiceCollection;
use exten_infrastructure::source::InMemorySourceStore;
use exten_infrastructure::{Engine, EngineBuilder};
use futures::future::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Clock(u64);

struct RequestId(usize);

struct Session {
    clock: Arc<Clock>,
}

#[test]
fn test_singleton_shared_by_root_and_scopes() {
    let container = ServiceCollection::new()
        .add_singleton(Arc::new(Clock(42)))
        .build();
    let scope = container.create_service_scope();

    let from_root = container.get::<Clock>().unwrap();
    let from_scope = scope.get::<Clock>().unwrap();

    assert!(Arc::ptr_eq(&from_root, &from_scope));
    assert_eq!(from_root.0, 42);
    assert!(container.is_root());
    assert!(!scope.is_root());
}

#[test]
fn test_scoped_service_is_per_scope() {
    let counter = Arc::new(AtomicUsize::new(0));
    let factory_counter = Arc::clone(&counter);
    let container = ServiceCollection::new()
        .add_scoped(move |_: &Arc<dyn ServiceProvider>| {
            Arc::new(RequestId(factory_counter.fetch_add(1, Ordering::SeqCst)))
        })
        .build();

    assert!(container.get::<RequestId>().is_none());

    let first = container.create_service_scope();
    let second = container.create_service_scope();
    let a = first.get::<RequestId>().unwrap();
    let b = first.get::<RequestId>().unwrap();
    let c = second.get::<RequestId>().unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_ne!(a.0, c.0);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(first.instance_count(), 1);
}

#[test]
fn test_scoped_factory_sees_the_scope() {
    let container = ServiceCollection::new()
        .add_singleton(Arc::new(Clock(7)))
        .add_scoped(|provider: &Arc<dyn ServiceProvider>| {
            Arc::new(Session {
                clock: provider.get::<Clock>().expect("clock is registered"),
            })
        })
        .build();
    let scope = container.create_service_scope();

    let session = scope.get_required::<Session>().unwrap();

    assert_eq!(session.clock.0, 7);
}

#[test]
fn test_missing_service() {
    let container = ServiceCollection::new().build();

    assert!(container.get::<Clock>().is_none());
    assert!(container.get_required::<Clock>().is_err());
}

#[test]
fn test_later_registration_replaces_earlier() {
    let collection = ServiceCollection::new()
        .add_singleton(Arc::new(RequestId(0)))
        .add_scoped(|_: &Arc<dyn ServiceProvider>| Arc::new(RequestId(1)));
    assert!(collection.contains::<RequestId>());

    let container = collection.build();

    assert!(container.get::<RequestId>().is_none());
    assert_eq!(container.create_service_scope().get::<RequestId>().unwrap().0, 1);
}

#[tokio::test]
async fn test_dispose_runs_disposers_newest_first() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let clock_order = Arc::clone(&order);
    let request_order = Arc::clone(&order);
    let container = ServiceCollection::new()
        .add_scoped_with_disposer(
            |_: &Arc<dyn ServiceProvider>| Arc::new(Clock(1)),
            move |_clock: Arc<Clock>| {
                let order = Arc::clone(&clock_order);
                async move { order.lock().unwrap().push("clock") }.boxed()
            },
        )
        .add_scoped_with_disposer(
            |_: &Arc<dyn ServiceProvider>| Arc::new(RequestId(1)),
            move |_request: Arc<RequestId>| {
                let order = Arc::clone(&request_order);
                async move { order.lock().unwrap().push("request") }.boxed()
            },
        )
        .build();
    let scope = container.create_service_scope();
    scope.get::<Clock>().unwrap();
    scope.get::<RequestId>().unwrap();

    scope.dispose().await;
    scope.dispose().await;

    assert_eq!(*order.lock().unwrap(), vec!["request", "clock"]);
    assert!(scope.is_disposed());
    assert!(scope.get::<Clock>().is_none());
}

#[tokio::test]
async fn test_unresolved_services_are_not_disposed() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disposed);
    let container = ServiceCollection::new()
        .add_scoped_with_disposer(
            |_: &Arc<dyn ServiceProvider>| Arc::new(Clock(1)),
            move |_clock: Arc<Clock>| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}.boxed()
            },
        )
        .build();

    container.create_service_scope().dispose().await;

    assert_eq!(disposed.load(Ordering::SeqCst), 0);
}

#[test]
fn test_nested_scope_is_independent() {
    let container = ServiceCollection::new()
        .add_scoped(|_: &Arc<dyn ServiceProvider>| Arc::new(RequestId(3)))
        .build();
    let outer = container.create_service_scope();

    let inner = outer.create_scope();
    let a = outer.get::<RequestId>().unwrap();
    let b = inner.get::<RequestId>().unwrap();

    assert!(!inner.is_root());
    assert!(!Arc::ptr_eq(&a, &b));
}

fn greeter_engine(point: &ExtensionPoint<dyn Greeter>, store: &Arc<InMemorySourceStore>) -> Engine {
    EngineBuilder::new(EngineConfig::default())
        .with_store(Arc::clone(store) as Arc<dyn SourceStore>)
        .with_compiler(LineCompiler::new())
        .with_point_as_service(point)
        .unwrap()
        .build()
        .unwrap()
}

#[test]
fn test_extension_point_as_service_follows_reload() {
    let point = ExtensionPoint::<dyn Greeter>::singleton("greeter");
    let store = Arc::new(InMemorySourceStore::new());
    store.insert_unit("greeter", "greet hello");
    let engine = greeter_engine(&point, &store);
    let root = engine.root();

    let first = root.get::<Arc<dyn Greeter>>().unwrap();
    let again = engine.create_scope().get::<Arc<dyn Greeter>>().unwrap();
    assert_eq!(first.greet(), "hello");
    assert!(Arc::ptr_eq(&*first, &*again));

    store.insert_unit("greeter", "greet again");

    assert_eq!(root.get::<Arc<dyn Greeter>>().unwrap().greet(), "again");
}

#[test]
fn test_scoped_extension_service_needs_a_scope() {
    let point = ExtensionPoint::<dyn Greeter>::scoped("visitor");
    let store = Arc::new(InMemorySourceStore::new());
    store.insert_unit("visitor", "greet guest");
    let engine = greeter_engine(&point, &store);

    let scope = engine.create_scope();
    let a = scope.get::<Arc<dyn Greeter>>().unwrap();
    let b = scope.get::<Arc<dyn Greeter>>().unwrap();
    let other = engine.create_scope().get::<Arc<dyn Greeter>>().unwrap();

    assert!(engine.root().get::<Arc<dyn Greeter>>().is_none());
    assert_eq!(a.greet(), "guest");
    assert!(Arc::ptr_eq(&*a, &*b));
    assert!(!Arc::ptr_eq(&*a, &*other));
}

#[test]
fn test_lifecycle_default_is_rejected_unless_disposable() {
    let point = ExtensionPoint::<dyn Greeter>::singleton("greeter").with_default_extension(|_| {
        Extension::new(Arc::new(FixedGreeter("fallback".into())) as Arc<dyn Greeter>)
    });

    let rejected = ServiceCollection::new().add_extension_as_service(&point);
    let accepted = ServiceCollection::new().add_disposable_extension_as_service(&point);

    assert!(matches!(rejected, Err(Error::Configuration { .. })));
    assert!(accepted.contains::<Arc<dyn Greeter>>());
}

#[test]
fn test_plain_default_is_served() {
    let point = ExtensionPoint::<dyn Greeter>::singleton("greeter")
        .with_default_instance(Arc::new(FixedGreeter("fallback".into())));
    let store = Arc::new(InMemorySourceStore::new());
    let engine = greeter_engine(&point, &store);

    let greeter = engine.root().get::<Arc<dyn Greeter>>().unwrap();

    assert_eq!(greeter.greet(), "fallback");
}

#[test]
fn test_extension_service_without_resolver_is_missing() {
    let point = ExtensionPoint::<dyn Greeter>::singleton("greeter");
    let container = ServiceCollection::new()
        .add_extension_as_service(&point)
        .unwrap()
        .build();

    assert!(container.get::<Arc<dyn Greeter>>().is_none());
}
