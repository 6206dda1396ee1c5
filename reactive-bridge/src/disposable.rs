use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::lock;

/// Handle to a running subscription started by
/// [`Observable::subscribe`](crate::Observable::subscribe).
///
/// Dropping the handle does not cancel anything; call
/// [`dispose`](Subscription::dispose).
#[derive(Debug, Clone)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Stops the subscription. Calling it again does nothing.
    pub fn dispose(&self) {
        self.token.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A slot holding at most one live [`Subscription`].
///
/// Installing a new subscription disposes the previous one. Once the slot
/// itself is disposed, anything installed afterwards is disposed on arrival.
#[derive(Debug, Default)]
pub struct SerialDisposable {
    state: Mutex<SerialState>,
}

#[derive(Debug, Default)]
struct SerialState {
    current: Option<Subscription>,
    disposed: bool,
}

impl SerialDisposable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `next`, disposing whatever was installed before.
    pub fn set(&self, next: Subscription) {
        let previous = {
            let mut state = lock(&self.state);
            if state.disposed {
                None
            } else {
                Some(state.current.replace(next.clone()))
            }
        };

        match previous {
            Some(Some(previous)) => previous.dispose(),
            Some(None) => {}
            None => next.dispose(),
        }
    }

    /// Disposes the current subscription first, then installs whatever
    /// `subscribe` returns.
    ///
    /// `subscribe` runs after the old subscription has been cancelled, so
    /// the two never overlap at the call level.
    pub fn replace<F>(&self, subscribe: F)
    where
        F: FnOnce() -> Option<Subscription>,
    {
        let previous = lock(&self.state).current.take();
        if let Some(previous) = previous {
            previous.dispose();
        }

        if let Some(next) = subscribe() {
            self.set(next);
        }
    }

    /// Disposes the current subscription and every later one.
    pub fn dispose(&self) {
        let current = {
            let mut state = lock(&self.state);
            state.disposed = true;
            state.current.take()
        };
        if let Some(current) = current {
            current.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.state).disposed
    }

    /// Returns true if a live subscription is installed.
    pub fn is_active(&self) -> bool {
        lock(&self.state)
            .current
            .as_ref()
            .is_some_and(|current| !current.is_disposed())
    }
}
