use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll, Waker};

use futures::task::noop_waker_ref;
use futures::StreamExt;
use futures_core::stream::Stream;
use futures_signals::signal::Mutable;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::observable::{Event, EventStream};
use crate::{lock, Element, Notification, Observable, ObservableStream, StreamError};

/// A hot, multicast source.
///
/// Subscribers only see values pushed after they subscribed. Once the subject
/// has completed or failed, late subscribers receive that terminal event
/// immediately.
pub struct Subject<T> {
    state: Arc<Mutex<SubjectState<T>>>,
    observable: Observable<T>,
}

struct SubjectState<T> {
    observers: Vec<UnboundedSender<Event<T>>>,
    terminal: Option<Terminal>,
}

#[derive(Clone)]
enum Terminal {
    Complete,
    Error(StreamError),
}

impl Terminal {
    fn event<T>(&self) -> Event<T> {
        match self {
            Terminal::Complete => Event::Complete,
            Terminal::Error(error) => Event::Error(error.clone()),
        }
    }
}

impl<T: Element> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Subject<T> {
    pub fn new() -> Self {
        let state = Arc::new(Mutex::new(SubjectState {
            observers: Vec::new(),
            terminal: None,
        }));

        let shared = Arc::clone(&state);
        let observable = Observable::new(move || {
            let (tx, rx) = mpsc::unbounded_channel();
            let mut state = lock(&shared);
            match &state.terminal {
                Some(terminal) => {
                    let _ = tx.send(terminal.event());
                }
                None => state.observers.push(tx),
            }
            EventStream::new(rx, None)
        });

        Self { state, observable }
    }

    /// Pushes `value` to every current subscriber.
    pub fn next(&self, value: T) {
        let mut state = lock(&self.state);
        if state.terminal.is_some() {
            return;
        }
        state
            .observers
            .retain(|observer| observer.send(Event::Next(value.clone())).is_ok());
    }

    pub fn error(&self, error: StreamError) {
        self.terminate(Terminal::Error(error));
    }

    pub fn complete(&self) {
        self.terminate(Terminal::Complete);
    }

    fn terminate(&self, terminal: Terminal) {
        let mut state = lock(&self.state);
        if state.terminal.is_some() {
            return;
        }
        for observer in state.observers.drain(..) {
            let _ = observer.send(terminal.event());
        }
        state.terminal = Some(terminal);
    }

    /// The subject as an observable. Every call returns the same identity.
    pub fn to_observable(&self) -> Observable<T> {
        self.observable.clone()
    }

    /// Number of subscribers whose stream is still alive.
    pub fn observer_count(&self) -> usize {
        let mut state = lock(&self.state);
        state.observers.retain(|observer| !observer.is_closed());
        state.observers.len()
    }
}

type Listener<T> = Box<dyn FnMut(&T) -> bool + Send>;

/// A subject that holds a current value and replays it to new subscribers.
///
/// `next` pushes synchronously: by the time it returns, every subscriber has
/// been handed the value. Subscriptions end once every `BehaviorSubject`
/// handle has been dropped.
#[derive(Clone)]
pub struct BehaviorSubject<T> {
    value: Mutable<T>,
    listeners: Arc<Mutex<Vec<Listener<T>>>>,
    observable: Observable<T>,
}

impl<T: Element> BehaviorSubject<T> {
    pub fn new(initial: T) -> Self {
        let value = Mutable::new(initial);
        let listeners: Arc<Mutex<Vec<Listener<T>>>> = Arc::new(Mutex::new(Vec::new()));

        let current = value.read_only();
        let registry = Arc::downgrade(&listeners);
        let observable = Observable::new(move || {
            let (tx, rx) = mpsc::unbounded_channel();
            if let Some(listeners) = registry.upgrade() {
                let mut registered = lock(&listeners);
                let _ = tx.send(Event::Next(current.get_cloned()));
                registered.push(Box::new(move |value: &T| {
                    tx.send(Event::Next(value.clone())).is_ok()
                }));
            }
            EventStream::new(rx, None)
        });

        Self {
            value,
            listeners,
            observable,
        }
    }

    pub fn next(&self, value: T) {
        let mut listeners = lock(&self.listeners);
        self.value.set(value.clone());
        listeners.retain_mut(|listener| listener(&value));
    }

    pub fn value(&self) -> T {
        self.value.get_cloned()
    }

    /// The subject as an observable. Every call returns the same identity.
    ///
    /// The observable does not keep the subject alive.
    pub fn to_observable(&self) -> Observable<T> {
        self.observable.clone()
    }
}

impl<T: Send + 'static> BehaviorSubject<Observable<T>> {
    /// Follows whichever observable the subject currently holds.
    ///
    /// Each subscription subscribes to the current observable right away and
    /// switches inside `next`. What the previous observable had already
    /// emitted is kept, then its stream is dropped and the new observable is
    /// subscribed before `next` returns. The result completes once the
    /// subject is gone and the current observable has completed.
    pub fn switch_latest(&self) -> Observable<T> {
        let current = self.value.read_only();
        let registry = Arc::downgrade(&self.listeners);

        Observable::new(move || {
            let sink = Arc::new(Mutex::new(SwitchSink::new()));
            match registry.upgrade() {
                Some(listeners) => {
                    let mut registered = lock(&listeners);
                    lock(&sink).switch_to(&current.get_cloned());
                    let follower = SwitchFollower {
                        sink: Arc::downgrade(&sink),
                    };
                    registered.push(Box::new(move |next: &Observable<T>| {
                        follower.switch_to(next)
                    }));
                }
                None => lock(&sink).outer_done = true,
            }
            SwitchStream { sink }
        })
    }
}

/// Per-subscription state of [`BehaviorSubject::switch_latest`].
struct SwitchSink<T> {
    inner: Option<ObservableStream<T>>,
    pending: VecDeque<Notification<T>>,
    outer_done: bool,
    failed: bool,
    waker: Option<Waker>,
}

impl<T: Send + 'static> SwitchSink<T> {
    fn new() -> Self {
        Self {
            inner: None,
            pending: VecDeque::new(),
            outer_done: false,
            failed: false,
            waker: None,
        }
    }

    fn switch_to(&mut self, next: &Observable<T>) {
        self.drain();
        if !self.failed {
            self.inner = Some(next.to_stream());
            self.drain();
        }
        self.wake();
    }

    /// Moves everything the current stream has ready into `pending`.
    ///
    /// Polls with a no-op waker, so the consumer must be woken afterwards to
    /// register its own waker again.
    fn drain(&mut self) {
        let mut cx = Context::from_waker(noop_waker_ref());
        while let Some(inner) = self.inner.as_mut() {
            match inner.poll_next_unpin(&mut cx) {
                Poll::Ready(Some(item)) => self.push(item),
                Poll::Ready(None) => self.inner = None,
                Poll::Pending => break,
            }
        }
    }

    fn push(&mut self, item: Notification<T>) {
        if item.is_err() {
            self.failed = true;
            self.inner = None;
        }
        self.pending.push_back(item);
    }

    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

/// Listener registered on the subject for one switch subscription.
struct SwitchFollower<T> {
    sink: Weak<Mutex<SwitchSink<T>>>,
}

impl<T: Send + 'static> SwitchFollower<T> {
    /// Returns false once the subscription is gone.
    fn switch_to(&self, next: &Observable<T>) -> bool {
        match self.sink.upgrade() {
            Some(sink) => {
                lock(&sink).switch_to(next);
                true
            }
            None => false,
        }
    }
}

impl<T> Drop for SwitchFollower<T> {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.upgrade() {
            let mut sink = lock(&sink);
            sink.outer_done = true;
            if let Some(waker) = sink.waker.take() {
                waker.wake();
            }
        }
    }
}

struct SwitchStream<T> {
    sink: Arc<Mutex<SwitchSink<T>>>,
}

impl<T: Send + 'static> Stream for SwitchStream<T> {
    type Item = Notification<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut guard = lock(&self.sink);
        let sink = &mut *guard;

        if let Some(item) = sink.pending.pop_front() {
            return Poll::Ready(Some(item));
        }

        if let Some(inner) = sink.inner.as_mut() {
            match inner.poll_next_unpin(cx) {
                Poll::Ready(Some(item)) => {
                    if item.is_err() {
                        sink.failed = true;
                        sink.inner = None;
                    }
                    return Poll::Ready(Some(item));
                }
                Poll::Ready(None) => sink.inner = None,
                Poll::Pending => {}
            }
        }

        if sink.inner.is_none() && (sink.outer_done || sink.failed) {
            return Poll::Ready(None);
        }
        sink.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_subject_is_hot() {
        let subject = Subject::new();
        subject.next(1);

        let mut stream = subject.to_observable().to_stream();
        subject.next(2);
        subject.next(3);
        subject.complete();

        assert_eq!(stream.next().await, Some(Ok(2)));
        assert_eq!(stream.next().await, Some(Ok(3)));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_subject_multicasts() {
        let subject = Subject::new();
        let mut first = subject.to_observable().to_stream();
        let mut second = subject.to_observable().to_stream();
        assert_eq!(subject.observer_count(), 2);

        subject.next("hello");
        assert_eq!(first.next().await, Some(Ok("hello")));
        assert_eq!(second.next().await, Some(Ok("hello")));

        drop(second);
        assert_eq!(subject.observer_count(), 1);
    }

    #[tokio::test]
    async fn test_subject_replays_terminal_error() {
        let subject = Subject::<i32>::new();
        subject.error(StreamError::error("closed"));
        subject.next(1);

        let late: Vec<_> = subject.to_observable().to_stream().collect().await;
        assert_eq!(late, vec![Err(StreamError::error("closed"))]);
    }

    #[tokio::test]
    async fn test_subject_identity_is_stable() {
        let subject = Subject::<i32>::new();
        assert!(subject.to_observable().ptr_eq(&subject.to_observable()));
    }

    #[tokio::test]
    async fn test_behavior_subject_replays_latest() {
        let subject = BehaviorSubject::new(1);
        subject.next(2);
        assert_eq!(subject.value(), 2);

        let mut stream = subject.to_observable().to_stream();
        assert_eq!(stream.next().await, Some(Ok(2)));
        assert!(timeout(Duration::from_millis(10), stream.next()).await.is_err());

        subject.next(3);
        assert_eq!(stream.next().await, Some(Ok(3)));
    }

    #[tokio::test]
    async fn test_switch_latest_keeps_emissions_made_before_switch() {
        let container = BehaviorSubject::new(Observable::<i32>::empty());
        let mut switched = container.switch_latest().to_stream();
        let first = Subject::new();
        let second = Subject::new();

        container.next(first.to_observable());
        first.next(1);
        container.next(second.to_observable());
        first.next(10);
        second.next(2);
        assert_eq!(first.observer_count(), 0);

        assert_eq!(switched.next().await, Some(Ok(1)));
        assert_eq!(switched.next().await, Some(Ok(2)));
        assert!(timeout(Duration::from_millis(10), switched.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_switch_latest_forwards_back_to_back_sources() {
        let container = BehaviorSubject::new(Observable::empty());
        let mut switched = container.switch_latest().to_stream();

        container.next(Observable::from_values(vec![1, 2]));
        container.next(Observable::from_values(vec![3, 4]));

        let mut items = Vec::new();
        for _ in 0..4 {
            items.push(switched.next().await);
        }
        assert_eq!(items, vec![Some(Ok(1)), Some(Ok(2)), Some(Ok(3)), Some(Ok(4))]);
    }

    #[tokio::test]
    async fn test_switch_latest_replays_current_to_late_subscribers() {
        let container = BehaviorSubject::new(Observable::from_values(vec!["a", "b"]));
        let late: Vec<_> = {
            let switched = container.switch_latest();
            drop(container);
            switched.to_stream().collect().await
        };
        assert!(late.is_empty());

        let container = BehaviorSubject::new(Observable::from_values(vec!["a", "b"]));
        let mut stream = container.switch_latest().to_stream();
        assert_eq!(stream.next().await, Some(Ok("a")));
        assert_eq!(stream.next().await, Some(Ok("b")));
        drop(container);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_switch_latest_ends_on_inner_error() {
        let container = BehaviorSubject::new(Observable::<i32>::empty());
        let mut switched = container.switch_latest().to_stream();

        container.next(Observable::throw(StreamError::error("inner")));
        container.next(Observable::from_values(vec![1]));

        assert_eq!(switched.next().await, Some(Err(StreamError::error("inner"))));
        assert_eq!(switched.next().await, None);
    }

    #[tokio::test]
    async fn test_behavior_subject_ends_when_dropped() {
        let subject = BehaviorSubject::new("only");
        let observable = subject.to_observable();
        let mut stream = observable.to_stream();
        assert_eq!(stream.next().await, Some(Ok("only")));

        drop(subject);
        assert_eq!(stream.next().await, None);
    }
}
