mod common;

use common::{settle, stays_silent};
use futures::StreamExt;
use reactive_bridge::mock::MockObject;
use reactive_bridge::{rx_input, Host, HostExt, Observable, Subject};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Subscribes to `input` and returns a receiver of everything it forwards.
fn record(object: &MockObject) -> mpsc::UnboundedReceiver<i32> {
    let (tx, rx) = mpsc::unbounded_channel();
    let output = object.get_observable::<i32>("input").unwrap();
    // Dropping the handle leaves the subscription running until the output ends.
    let _subscription = output.subscribe(
        move |value| {
            let _ = tx.send(value);
        },
        |_| {},
    );
    rx
}

fn received(rx: &mut mpsc::UnboundedReceiver<i32>) -> Vec<i32> {
    let mut values = Vec::new();
    while let Ok(value) = rx.try_recv() {
        values.push(value);
    }
    values
}

#[tokio::test]
async fn test_input_is_an_observable_before_any_write() {
    let object = MockObject::builder()
        .computed("input", rx_input::<i32>())
        .build();

    let input = object.get_observable::<i32>("input");
    assert!(input.is_some());

    let mut stream = input.unwrap().to_stream();
    assert!(stays_silent(&mut stream).await);

    drop(object);
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn test_input_follows_latest_observable() {
    let object = MockObject::builder()
        .computed("input", rx_input::<Value>())
        .property("input", Observable::from_values(vec![json!(23), json!(42)]))
        .build();

    let mut output = object.get_observable::<Value>("input").unwrap().to_stream();
    assert_eq!(output.next().await, Some(Ok(json!(23))));
    assert_eq!(output.next().await, Some(Ok(json!(42))));

    object.set_to(
        "input",
        Observable::from_values(vec![json!("banana"), json!("stand")]),
    );
    assert_eq!(output.next().await, Some(Ok(json!("banana"))));
    assert_eq!(output.next().await, Some(Ok(json!("stand"))));
}

#[tokio::test]
async fn test_input_drops_superseded_observable() {
    let object = MockObject::builder()
        .computed("input", rx_input::<i32>())
        .build();
    let first = Subject::<i32>::new();
    let second = Subject::<i32>::new();

    object.set_to("input", first.to_observable());
    let mut output = object.get_observable::<i32>("input").unwrap().to_stream();
    assert!(stays_silent(&mut output).await);

    first.next(1);
    assert_eq!(output.next().await, Some(Ok(1)));

    object.set_to("input", second.to_observable());
    assert!(stays_silent(&mut output).await);
    first.next(2);
    second.next(3);
    assert_eq!(output.next().await, Some(Ok(3)));
    assert_eq!(first.observer_count(), 0);
}

#[tokio::test]
async fn test_non_observable_write_resets_to_empty() {
    let object = MockObject::builder()
        .computed("input", rx_input::<i32>())
        .build();
    let live = Subject::<i32>::new();

    object.set_to("input", live.to_observable());
    let mut output = object.get_observable::<i32>("input").unwrap().to_stream();
    assert!(stays_silent(&mut output).await);
    assert_eq!(live.observer_count(), 1);

    object.set_to("input", "not an observable");
    assert!(stays_silent(&mut output).await);
    live.next(1);
    assert!(stays_silent(&mut output).await);

    object.set("input", None);
    assert!(object.get_observable::<i32>("input").is_some());
}

#[tokio::test]
async fn test_input_keeps_one_container_per_object() {
    let object = MockObject::builder()
        .computed("input", rx_input::<i32>())
        .computed("other", rx_input::<i32>())
        .build();

    let first_read = object.get_observable::<i32>("input").unwrap();
    object.set_to("input", Observable::from_values(vec![1]));
    object.set_to("input", Observable::from_values(vec![2]));
    let last_read = object.get_observable::<i32>("input").unwrap();
    assert!(first_read.ptr_eq(&last_read));

    let other = object.get_observable::<i32>("other").unwrap();
    assert!(!other.ptr_eq(&first_read));
    assert_eq!(object.backing_fields().len(), 2);

    let mut stream = first_read.to_stream();
    assert_eq!(stream.next().await, Some(Ok(2)));
}

#[tokio::test]
async fn test_inputs_are_not_shared_between_objects() {
    let build = || {
        MockObject::builder()
            .computed("input", rx_input::<i32>())
            .build()
    };
    let first = build();
    let second = build();

    first.set_to("input", Observable::from_values(vec![1]));
    let mut untouched = second.get_observable::<i32>("input").unwrap().to_stream();
    assert!(stays_silent(&mut untouched).await);

    let mut written = first.get_observable::<i32>("input").unwrap().to_stream();
    assert_eq!(written.next().await, Some(Ok(1)));
}

#[tokio::test]
async fn test_emission_right_after_assignment_is_forwarded() {
    let object = MockObject::builder()
        .computed("input", rx_input::<i32>())
        .build();
    let mut rx = record(&object);
    let first = Subject::<i32>::new();
    let second = Subject::<i32>::new();

    object.set_to("input", first.to_observable());
    first.next(1);
    object.set_to("input", second.to_observable());
    first.next(10);
    second.next(2);

    settle().await;
    assert_eq!(received(&mut rx), vec![1, 2]);
}

#[tokio::test]
async fn test_back_to_back_assignments_are_all_forwarded() {
    let object = MockObject::builder()
        .computed("input", rx_input::<i32>())
        .build();
    let mut rx = record(&object);

    object.set_to("input", Observable::from_values(vec![1, 2]));
    object.set_to("input", Observable::from_values(vec![3, 4]));

    settle().await;
    assert_eq!(received(&mut rx), vec![1, 2, 3, 4]);
}
