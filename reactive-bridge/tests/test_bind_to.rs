mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::settle;
use reactive_bridge::mock::MockObject;
use reactive_bridge::{bind_to, Host, HostExt, Observable, StreamError, Subject};
use tracing_test::traced_test;

fn bound(source: Observable<i32>) -> Arc<MockObject> {
    MockObject::builder()
        .property("source", source)
        .computed("value", bind_to::<i32>("source"))
        .build()
}

#[tokio::test]
async fn test_follows_latest_emission() {
    let subject = Subject::<i32>::new();
    let object = bound(subject.to_observable());
    assert_eq!(object.get_as::<i32>("value"), None);

    subject.next(1);
    settle().await;
    assert_eq!(object.get_as::<i32>("value"), Some(1));

    subject.next(2);
    subject.next(3);
    settle().await;
    assert_eq!(object.get_as::<i32>("value"), Some(3));
}

#[tokio::test]
async fn test_subscribes_once_per_source() {
    let subscriptions = Arc::new(AtomicUsize::new(0));
    let subject = Subject::<i32>::new();
    let counted = {
        let subscriptions = Arc::clone(&subscriptions);
        let inner = subject.to_observable();
        Observable::new(move || {
            subscriptions.fetch_add(1, Ordering::SeqCst);
            inner.to_stream()
        })
    };
    let object = bound(counted.clone());

    for _ in 0..3 {
        object.get("value");
    }
    object.notify_property_change("source");
    object.get("value");
    object.set_to("source", counted.clone());
    object.get("value");
    assert_eq!(subscriptions.load(Ordering::SeqCst), 1);

    subject.next(7);
    settle().await;
    assert_eq!(object.get_as::<i32>("value"), Some(7));
    assert_eq!(subscriptions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[traced_test]
async fn test_source_error_is_logged_and_clears_value() {
    let subject = Subject::<i32>::new();
    let object = bound(subject.to_observable());
    object.get("value");

    subject.next(4);
    settle().await;
    assert_eq!(object.get_as::<i32>("value"), Some(4));

    subject.error(StreamError::error("boom"));
    settle().await;
    assert!(object.get("value").is_none());
    assert!(logs_contain("Error binding property"));
    assert!(logs_contain("boom"));
}

#[tokio::test]
async fn test_destroy_disposes_subscription() {
    let subject = Subject::<i32>::new();
    let object = bound(subject.to_observable());
    object.get("value");
    assert_eq!(subject.observer_count(), 1);

    subject.next(1);
    settle().await;
    object.destroy();
    settle().await;

    subject.next(2);
    settle().await;
    assert_eq!(object.get_as::<i32>("value"), Some(1));
    assert_eq!(subject.observer_count(), 0);
}

#[tokio::test]
async fn test_switches_to_replaced_source() {
    let first = Subject::<i32>::new();
    let second = Subject::<i32>::new();
    let object = bound(first.to_observable());
    object.get("value");

    first.next(1);
    settle().await;
    assert_eq!(object.get_as::<i32>("value"), Some(1));

    object.set_to("source", second.to_observable());
    assert_eq!(object.get_as::<i32>("value"), Some(1));
    settle().await;
    assert_eq!(first.observer_count(), 0);
    assert_eq!(second.observer_count(), 1);

    first.next(10);
    second.next(20);
    settle().await;
    assert_eq!(object.get_as::<i32>("value"), Some(20));
}

#[tokio::test]
async fn test_local_write_holds_until_next_emission() {
    let subject = Subject::<i32>::new();
    let object = bound(subject.to_observable());
    object.get("value");

    object.set_to("value", 5);
    assert_eq!(object.get_as::<i32>("value"), Some(5));

    subject.next(6);
    settle().await;
    assert_eq!(object.get_as::<i32>("value"), Some(6));
}

#[tokio::test]
async fn test_absent_source_binds_once_it_appears() {
    let object = MockObject::builder()
        .computed("value", bind_to::<i32>("source"))
        .build();
    assert!(object.get("value").is_none());

    let subject = Subject::<i32>::new();
    object.set_to("source", subject.to_observable());
    object.get("value");
    assert_eq!(subject.observer_count(), 1);

    subject.next(9);
    settle().await;
    assert_eq!(object.get_as::<i32>("value"), Some(9));
}

#[tokio::test]
async fn test_completed_source_keeps_last_value() {
    let object = bound(Observable::from_values(vec![1, 2, 3]));
    object.get("value");
    settle().await;
    assert_eq!(object.get_as::<i32>("value"), Some(3));
}
