use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use futures_core::stream::Stream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{Element, NotificationStreamExt, StreamError, Subscription};

/// One item of a subscription: a value, or the terminal error.
pub type Notification<T> = Result<T, StreamError>;

/// The stream produced by one subscription to an [`Observable`].
pub type ObservableStream<T> = BoxStream<'static, Notification<T>>;

/// Cleanup registered by [`Observable::create`], run once per subscription.
pub type Teardown = Box<dyn FnOnce() + Send>;

type SubscribeFn<T> = dyn Fn() -> ObservableStream<T> + Send + Sync;

/// A cold, push-style sequence of values.
///
/// Every call to [`to_stream`](Observable::to_stream) is an independent
/// subscription: the subscribe function runs again and the caller gets its own
/// stream. An `Err` item ends the stream.
///
/// Clones share identity, see [`ptr_eq`](Observable::ptr_eq).
pub struct Observable<T> {
    subscribe: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe: Arc::clone(&self.subscribe),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &Arc::as_ptr(&self.subscribe).cast::<()>())
            .finish()
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Creates an observable whose subscriptions are produced by `subscribe`.
    pub fn new<F, S>(subscribe: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Notification<T>> + Send + 'static,
    {
        Self {
            subscribe: Arc::new(move || subscribe().end_on_error().boxed()),
        }
    }

    /// An observable that completes immediately without emitting.
    pub fn empty() -> Self {
        Self::new(|| stream::empty())
    }

    /// An observable that fails immediately with `error`.
    pub fn throw(error: StreamError) -> Self {
        Self::new(move || stream::once(future::ready(Err(error.clone()))))
    }

    /// Creates an observable from a subscribe function that pushes into an
    /// [`Observer`].
    ///
    /// `subscribe` runs once for every subscription. The returned [`Teardown`]
    /// runs when that subscription ends, either because it terminated or
    /// because its stream was dropped.
    pub fn create<F>(subscribe: F) -> Self
    where
        F: Fn(Observer<T>) -> Teardown + Send + Sync + 'static,
    {
        Self::new(move || {
            let (tx, rx) = mpsc::unbounded_channel();
            let teardown = subscribe(Observer { tx });
            EventStream::new(rx, Some(teardown))
        })
    }

    /// Starts a new subscription.
    pub fn to_stream(&self) -> ObservableStream<T> {
        (self.subscribe)()
    }

    /// Returns true if both handles refer to the same observable.
    pub fn ptr_eq(&self, other: &Observable<T>) -> bool {
        Arc::ptr_eq(&self.subscribe, &other.subscribe)
    }

    pub fn map<U, F>(&self, transform: F) -> Observable<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.try_map(move |value| Ok(transform(value)))
    }

    /// Like [`map`](Observable::map), but an `Err` from `transform` ends the
    /// derived stream with that error.
    pub fn try_map<U, F>(&self, transform: F) -> Observable<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U, StreamError> + Send + Sync + 'static,
    {
        let source = self.clone();
        let transform = Arc::new(transform);
        Observable::new(move || {
            let transform = Arc::clone(&transform);
            source
                .to_stream()
                .map(move |item| item.and_then(|value| transform(value)))
        })
    }

    pub fn filter<F>(&self, predicate: F) -> Observable<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.try_filter(move |value| Ok(predicate(value)))
    }

    pub fn try_filter<F>(&self, predicate: F) -> Observable<T>
    where
        F: Fn(&T) -> Result<bool, StreamError> + Send + Sync + 'static,
    {
        let source = self.clone();
        let predicate = Arc::new(predicate);
        Observable::new(move || {
            let predicate = Arc::clone(&predicate);
            source.to_stream().filter_map(move |item| {
                let kept = match item {
                    Ok(value) => match predicate(&value) {
                        Ok(true) => Some(Ok(value)),
                        Ok(false) => None,
                        Err(error) => Some(Err(error)),
                    },
                    Err(error) => Some(Err(error)),
                };
                future::ready(kept)
            })
        })
    }

    /// Left fold that emits every intermediate accumulation.
    ///
    /// The seed itself is not emitted: the first emission is
    /// `accumulate(seed, first)`.
    pub fn scan<A, F>(&self, seed: A, accumulate: F) -> Observable<A>
    where
        A: Element,
        F: Fn(A, T) -> A + Send + Sync + 'static,
    {
        self.try_scan(seed, move |acc, value| Ok(accumulate(acc, value)))
    }

    pub fn try_scan<A, F>(&self, seed: A, accumulate: F) -> Observable<A>
    where
        A: Element,
        F: Fn(A, T) -> Result<A, StreamError> + Send + Sync + 'static,
    {
        let source = self.clone();
        let accumulate = Arc::new(accumulate);
        Observable::new(move || {
            let accumulate = Arc::clone(&accumulate);
            source.to_stream().scan(seed.clone(), move |acc, item| {
                let next = item.and_then(|value| {
                    let folded = accumulate(acc.clone(), value)?;
                    *acc = folded.clone();
                    Ok(folded)
                });
                future::ready(Some(next))
            })
        })
    }

    /// Drives a new subscription on a Tokio task.
    ///
    /// The subscription is registered before this returns, so hot sources
    /// deliver everything emitted after the call. The task carries the
    /// caller's tracing span.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn subscribe<N, E>(&self, on_next: N, on_error: E) -> Subscription
    where
        N: FnMut(T) + Send + 'static,
        E: FnOnce(StreamError) + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let stream = self.to_stream();

        tokio::spawn(
            async move {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => {}
                    _ = drive(stream, on_next, on_error) => {}
                }
            }
            .in_current_span(),
        );

        Subscription::new(token)
    }
}

async fn drive<T, N, E>(mut stream: ObservableStream<T>, mut on_next: N, on_error: E)
where
    N: FnMut(T),
    E: FnOnce(StreamError),
{
    while let Some(item) = stream.next().await {
        match item {
            Ok(value) => on_next(value),
            Err(error) => {
                on_error(error);
                break;
            }
        }
    }
}

impl<T: Element> Observable<T> {
    /// An observable that emits `values` in order and then completes.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        Self::new(move || stream::iter(values.clone()).map(Ok))
    }
}

impl<T: Element> FromIterator<T> for Observable<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Observable::from_values(iter)
    }
}

/// Push handle given to the subscribe function of [`Observable::create`].
pub struct Observer<T> {
    tx: UnboundedSender<Event<T>>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Observer<T> {
    pub fn next(&self, value: T) {
        let _ = self.tx.send(Event::Next(value));
    }

    pub fn error(&self, error: StreamError) {
        let _ = self.tx.send(Event::Error(error));
    }

    pub fn complete(&self) {
        let _ = self.tx.send(Event::Complete);
    }
}

pub(crate) enum Event<T> {
    Next(T),
    Error(StreamError),
    Complete,
}

/// Receiving end of an [`Observer`] channel.
///
/// Ends on `Complete`, after an `Error`, or when every sender is gone. The
/// teardown runs when the stream ends or is dropped, whichever comes first.
pub(crate) struct EventStream<T> {
    rx: UnboundedReceiver<Event<T>>,
    teardown: Option<Teardown>,
    done: bool,
}

impl<T> EventStream<T> {
    pub(crate) fn new(rx: UnboundedReceiver<Event<T>>, teardown: Option<Teardown>) -> Self {
        Self {
            rx,
            teardown,
            done: false,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl<T> Stream for EventStream<T> {
    type Item = Notification<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Event::Next(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(Event::Error(error))) => {
                this.finish();
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(Some(Event::Complete)) | Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}
