mod action;
mod binding;
mod changes;
mod derived;
mod disposable;
mod error;
mod host;
mod input;
mod observable;
mod stream_ext;
mod subject;
pub mod mock;

pub use action::*;
pub use binding::*;
pub use changes::*;
pub use derived::*;
pub use disposable::*;
pub use error::*;
pub use host::*;
pub use input::*;
pub use observable::*;
pub use stream_ext::*;
pub use subject::*;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Values that can flow through subjects and be stored as property values.
pub trait Element: Clone + Send + Sync + 'static {}

impl<T> Element for T where T: Clone + Send + Sync + 'static {}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
