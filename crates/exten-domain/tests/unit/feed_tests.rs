//! Change feed tests

use exten_domain::events::{ChangeFeed, SourceChanged};
use std::sync::Arc;
use std::sync::Mutex;

#[test]
fn test_publish_reaches_every_listener() {
    let feed = ChangeFeed::<SourceChanged>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let first = {
        let seen = Arc::clone(&seen);
        feed.subscribe(move |e: &SourceChanged| seen.lock().unwrap().push(format!("1:{}", e.path)))
    };
    let second = {
        let seen = Arc::clone(&seen);
        feed.subscribe(move |e: &SourceChanged| seen.lock().unwrap().push(format!("2:{}", e.path)))
    };

    let delivered = feed.publish(&SourceChanged::new("a.script"));

    assert_eq!(delivered, 2);
    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["1:a.script", "2:a.script"]);
    drop((first, second));
}

#[test]
fn test_dropping_subscription_unsubscribes() {
    let feed = ChangeFeed::<SourceChanged>::new();
    let sub = feed.subscribe(|_| {});
    assert_eq!(feed.subscriber_count(), 1);

    drop(sub);
    assert!(!feed.has_subscribers());
    assert_eq!(feed.publish(&SourceChanged::new("a")), 0);
}

#[test]
fn test_cancel_and_clone_share_listeners() {
    let feed = ChangeFeed::<SourceChanged>::new();
    let clone = feed.clone();
    let sub = clone.subscribe(|_| {});

    assert_eq!(feed.subscriber_count(), 1);
    sub.cancel();
    assert_eq!(feed.subscriber_count(), 0);
}

#[test]
fn test_subscription_outliving_feed_is_harmless() {
    let feed = ChangeFeed::<SourceChanged>::new();
    let sub = feed.subscribe(|_| {});
    drop(feed);
    drop(sub);
}
