use crate::error::Error;

/// One event travelling from a publisher to a subscriber.
#[derive(Debug, Clone)]
pub enum Signal<T> {
  Next(T),
  Error(Error),
  Complete,
}

/// The tag of a [`Signal`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
  OnNext,
  OnError,
  OnComplete,
}

impl<T> Signal<T> {
  pub fn kind(&self) -> SignalKind {
    match self {
      Signal::Next(_) => SignalKind::OnNext,
      Signal::Error(_) => SignalKind::OnError,
      Signal::Complete => SignalKind::OnComplete,
    }
  }

  /// `Error` and `Complete` end a subscription.
  pub fn is_terminal(&self) -> bool { !matches!(self, Signal::Next(_)) }

  pub fn value(&self) -> Option<&T> {
    match self {
      Signal::Next(v) => Some(v),
      _ => None,
    }
  }

  pub fn into_value(self) -> Option<T> {
    match self {
      Signal::Next(v) => Some(v),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&Error> {
    match self {
      Signal::Error(e) => Some(e),
      _ => None,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Signal<U> {
    match self {
      Signal::Next(v) => Signal::Next(f(v)),
      Signal::Error(e) => Signal::Error(e),
      Signal::Complete => Signal::Complete,
    }
  }
}

impl<T> From<Result<(), Error>> for Signal<T> {
  fn from(result: Result<(), Error>) -> Self {
    match result {
      Ok(()) => Signal::Complete,
      Err(e) => Signal::Error(e),
    }
  }
}
