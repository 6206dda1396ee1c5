use thiserror::Error;

/// Errors delivered through an observable's error channel.
///
/// An `Err` item is always the last item of a subscription: nothing is
/// emitted after it.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum StreamError {
    /// A general upstream error with a message describing what went wrong.
    #[error("{0}")]
    Error(String),

    /// The source property of a derived stream was absent or not an observable.
    #[error("property `{property}` does not hold an observable")]
    SourceUnavailable { property: String },

    /// The owning object was dropped while the stream was still running.
    #[error("owning object is gone")]
    Detached,
}

impl StreamError {
    pub fn error(message: impl Into<String>) -> Self {
        StreamError::Error(message.into())
    }

    /// Returns true if this error is a general error with a message.
    pub fn is_error(&self) -> bool {
        matches!(self, StreamError::Error(_))
    }

    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, StreamError::SourceUnavailable { .. })
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, StreamError::Detached)
    }
}

/// Errors raised by a host object itself, outside of any stream.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum HostError {
    #[error("no action named `{0}`")]
    UnknownAction(String),

    #[error("object was destroyed")]
    Destroyed,
}
