use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::stream::{FusedStream, Stream};
use pin_project::pin_project;

/// Stream adapters for streams of `Result` items.
pub trait NotificationStreamExt<T, E>: Stream<Item = Result<T, E>> {
    /// Ends the stream right after its first `Err` item. The error itself is
    /// still yielded, and the inner stream is dropped along with it.
    ///
    /// ## Examples
    ///
    /// ```
    /// use futures::StreamExt;
    /// use reactive_bridge::NotificationStreamExt;
    ///
    /// # futures::executor::block_on(async {
    /// let items: Vec<Result<i32, ()>> = futures::stream::iter(vec![Ok(1), Err(()), Ok(2)])
    ///     .end_on_error()
    ///     .collect()
    ///     .await;
    ///
    /// assert_eq!(items, vec![Ok(1), Err(())]);
    /// # });
    /// ```
    fn end_on_error(self) -> EndOnError<Self>
    where
        Self: Sized,
    {
        EndOnError { inner: Some(self) }
    }
}

impl<S, T, E> NotificationStreamExt<T, E> for S where S: Stream<Item = Result<T, E>> {}

/// Stream returned by [`NotificationStreamExt::end_on_error`].
#[pin_project]
#[derive(Debug)]
#[must_use = "Streams do nothing unless polled"]
pub struct EndOnError<S> {
    #[pin]
    inner: Option<S>,
}

impl<S, T, E> Stream for EndOnError<S>
where
    S: Stream<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        let Some(inner) = this.inner.as_mut().as_pin_mut() else {
            return Poll::Ready(None);
        };

        let polled = inner.poll_next(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            this.inner.set(None);
        }
        polled
    }
}

impl<S, T, E> FusedStream for EndOnError<S>
where
    S: Stream<Item = Result<T, E>>,
{
    fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}
