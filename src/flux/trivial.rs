use std::marker::PhantomData;

use crate::{
  error::{self, Error},
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{
    drain::{Drain, Producer, Step},
    empty_subscription,
  },
};

/// Creates a publisher that completes without emitting.
///
/// ```
/// use rxflux::prelude::*;
///
/// StepVerifier::create(flux::empty::<i32>()).verify_complete().unwrap();
/// ```
pub fn empty<T>() -> Empty<T> { Empty(PhantomData) }

/// Creates a publisher that fails with `err` right after subscription.
pub fn error<T>(err: Error) -> ErrorPublisher<T> { ErrorPublisher { err, _item: PhantomData } }

/// Like [`error`], but the error is built by `factory` for every subscription.
pub fn error_with<T, F>(factory: F) -> ErrorWith<T, F>
where
  F: Fn() -> Error + Send + Sync,
{
  ErrorWith { factory, _item: PhantomData }
}

/// Creates a publisher that never signals anything after `on_subscribe`.
pub fn never<T>() -> Never<T> { Never(PhantomData) }

pub struct Empty<T>(PhantomData<fn() -> T>);

impl<T> Clone for Empty<T> {
  fn clone(&self) -> Self { Empty(PhantomData) }
}

impl<T: Send + 'static> Publisher for Empty<T> {
  type Item = T;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + 'static,
  {
    terminate(subscriber, Ok(()))
  }
}

pub struct ErrorPublisher<T> {
  err: Error,
  _item: PhantomData<fn() -> T>,
}

impl<T> Clone for ErrorPublisher<T> {
  fn clone(&self) -> Self { Self { err: self.err.clone(), _item: PhantomData } }
}

impl<T: Send + 'static> Publisher for ErrorPublisher<T> {
  type Item = T;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + 'static,
  {
    terminate(subscriber, Err(self.err.clone()))
  }
}

pub struct ErrorWith<T, F> {
  factory: F,
  _item: PhantomData<fn() -> T>,
}

impl<T, F> Publisher for ErrorWith<T, F>
where
  T: Send + 'static,
  F: Fn() -> Error + Send + Sync,
{
  type Item = T;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + 'static,
  {
    let err = error::catch(&self.factory).unwrap_or_else(|panicked| panicked);
    terminate(subscriber, Err(err))
  }
}

pub struct Never<T>(PhantomData<fn() -> T>);

impl<T> Clone for Never<T> {
  fn clone(&self) -> Self { Never(PhantomData) }
}

impl<T: Send + 'static> Publisher for Never<T> {
  type Item = T;

  fn subscribe_with<S>(&self, mut subscriber: S)
  where
    S: Subscriber<T> + 'static,
  {
    subscriber.on_subscribe(empty_subscription());
  }
}

/// Producer that emits nothing and ends with the stored result.
struct Terminal(Option<Result<(), Error>>);

impl<T> Producer<T> for Terminal {
  fn step(&mut self, _can_emit: bool) -> Step<T> { Step::Done(self.0.take().unwrap_or(Ok(()))) }
}

/// Subscribes `subscriber` and ends its sequence with `result` at once,
/// unless it cancels from `on_subscribe`.
pub(crate) fn terminate<T, S>(subscriber: S, result: Result<(), Error>)
where
  T: Send + 'static,
  S: Subscriber<T> + 'static,
{
  let drain: std::sync::Arc<Drain<T, Terminal, S>> = Drain::new(Terminal(Some(result)));
  drain.start(subscriber);
}
