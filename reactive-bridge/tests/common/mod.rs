#![allow(dead_code)]

use std::time::Duration;

use futures::StreamExt;
use reactive_bridge::{Notification, Observable, ObservableStream};
use tokio::time::{sleep, timeout};

/// Gives spawned subscriptions time to deliver what is already queued.
pub async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

/// Returns true if the stream yields nothing within a short window.
pub async fn stays_silent<T>(stream: &mut ObservableStream<T>) -> bool {
    timeout(Duration::from_millis(20), stream.next()).await.is_err()
}

/// Subscribes once and collects every item until the observable ends.
pub async fn collect<T: Send + 'static>(observable: &Observable<T>) -> Vec<Notification<T>> {
    observable.to_stream().collect().await
}
