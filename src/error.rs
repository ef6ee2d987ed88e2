//! The error channel shared by every publisher.
//!
//! A stream has a single error type. The cause of a `Source` or
//! `Transformation` error is kept behind an `Arc`, so the error stays `Clone`
//! (hot publishers hand one error to many subscribers) while recovery operators
//! can still match on the concrete cause with [`Error::downcast_ref`].

use std::{any::Any, error::Error as StdError, fmt, sync::Arc, time::Duration};

/// A cause carried by [`Error`].
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
  /// Raised directly by a publisher.
  #[error("source error: {0}")]
  Source(SharedError),
  /// Returned by a fallible user-supplied closure.
  #[error("transformation failed: {0}")]
  Transformation(SharedError),
  /// A user-supplied closure panicked.
  #[error("callback panicked: {0}")]
  Panicked(String),
  /// `request(0)` was called on a subscription.
  #[error("request amount must be positive")]
  InvalidRequest,
  /// A timed source had no outstanding demand when it was due to emit.
  #[error("could not emit {0}: no outstanding demand")]
  Overflow(&'static str),
  /// A blocking wait gave up.
  #[error("no signal within {0:?}")]
  Timeout(Duration),
}

/// The category of an [`Error`], used by assertions that don't care about the
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Source,
  Transformation,
  Panicked,
  InvalidRequest,
  Overflow,
  Timeout,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

impl Error {
  /// Wraps an error raised by a publisher.
  pub fn from_source<E>(err: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    Error::Source(Arc::new(err))
  }

  /// Wraps an error returned by a user transformation.
  pub fn transformation<E>(err: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    Error::Transformation(Arc::new(err))
  }

  /// A source error that only carries a message.
  pub fn message(msg: impl Into<String>) -> Self { Error::from_source(Message(msg.into())) }

  pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let msg = match payload.downcast::<String>() {
      Ok(msg) => *msg,
      Err(payload) => match payload.downcast::<&'static str>() {
        Ok(msg) => (*msg).to_owned(),
        Err(_) => "non-string panic payload".to_owned(),
      },
    };
    Error::Panicked(msg)
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::Source(_) => ErrorKind::Source,
      Error::Transformation(_) => ErrorKind::Transformation,
      Error::Panicked(_) => ErrorKind::Panicked,
      Error::InvalidRequest => ErrorKind::InvalidRequest,
      Error::Overflow(_) => ErrorKind::Overflow,
      Error::Timeout(_) => ErrorKind::Timeout,
    }
  }

  /// The wrapped cause, if this error carries one.
  pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
    match self {
      Error::Source(cause) | Error::Transformation(cause) => Some(cause.as_ref()),
      _ => None,
    }
  }

  /// Returns the cause as `E` if it has that type.
  pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
    self.cause().and_then(|cause| cause.downcast_ref::<E>())
  }

  /// Whether the cause has type `E`.
  pub fn is<E: StdError + 'static>(&self) -> bool { self.downcast_ref::<E>().is_some() }
}

/// Runs a user callback, turning a panic into [`Error::Panicked`].
#[inline]
pub(crate) fn catch<R>(f: impl FnOnce() -> R) -> Result<R, Error> {
  std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(Error::from_panic)
}

/// Plain message cause behind [`Error::message`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Message(pub String);
