//! Factories for publishers of at most one item.
//!
//! A mono is an ordinary [`Publisher`]; these factories only guarantee that
//! it emits zero or one item before its terminal signal.

use std::{error::Error as StdError, marker::PhantomData};

use crate::{
  error::{self, Error},
  flux::{self, FromIter},
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::drain::{Drain, Producer, Step},
};

pub use crate::flux::{Defer, Empty, ErrorPublisher, ErrorWith};

pub type Just<T> = FromIter<Option<T>>;

/// Creates a publisher of the single item `value`.
///
/// ```
/// use rxflux::prelude::*;
///
/// StepVerifier::create(mono::just("value1")).expect_next("value1").verify_complete().unwrap();
/// ```
pub fn just<T>(value: T) -> Just<T> { flux::from_iter(Some(value)) }

/// Emits the item if there is one, otherwise completes empty.
pub fn just_or_empty<T>(value: Option<T>) -> Just<T> { flux::from_iter(value) }

pub fn empty<T>() -> Empty<T> { flux::empty() }

pub fn error<T>(err: Error) -> ErrorPublisher<T> { flux::error(err) }

pub fn error_with<T, F>(factory: F) -> ErrorWith<T, F>
where
  F: Fn() -> Error + Send + Sync,
{
  flux::error_with(factory)
}

/// See [`flux::defer`]; `factory` is expected to return a mono.
pub fn defer<F, P>(factory: F) -> Defer<F>
where
  F: Fn() -> P + Send + Sync,
  P: Publisher,
{
  flux::defer(factory)
}

/// Calls `callable` on every subscription and emits its value.
///
/// `Err` fails the subscription with [`Error::Transformation`]; a panic with
/// [`Error::Panicked`].
///
/// ```
/// use rxflux::prelude::*;
///
/// let parsed = mono::from_callable(|| "42".parse::<i32>());
/// StepVerifier::create(parsed).expect_next(42).verify_complete().unwrap();
/// ```
pub fn from_callable<T, E, F>(callable: F) -> FromCallable<F, T>
where
  F: Fn() -> Result<T, E> + Send + Sync,
  E: StdError + Send + Sync + 'static,
{
  FromCallable { callable, _item: PhantomData }
}

pub struct FromCallable<F, T> {
  callable: F,
  _item: PhantomData<fn() -> T>,
}

impl<F, T, E> Publisher for FromCallable<F, T>
where
  T: Send + 'static,
  E: StdError + Send + Sync + 'static,
  F: Fn() -> Result<T, E> + Send + Sync,
{
  type Item = T;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + 'static,
  {
    let outcome = match error::catch(&self.callable) {
      Ok(Ok(value)) => Ok(value),
      Ok(Err(err)) => Err(Error::transformation(err)),
      Err(panicked) => Err(panicked),
    };
    Drain::new(Outcome(Some(outcome))).start(subscriber);
  }
}

/// A computed single result waiting for demand.
struct Outcome<T>(Option<Result<T, Error>>);

impl<T: Send> Producer<T> for Outcome<T> {
  fn step(&mut self, can_emit: bool) -> Step<T> {
    match self.0.take() {
      Some(Ok(value)) if can_emit => Step::Next(value),
      Some(Ok(value)) => {
        self.0 = Some(Ok(value));
        Step::Pending
      }
      Some(Err(err)) => Step::Done(Err(err)),
      None => Step::Done(Ok(())),
    }
  }
}

#[cfg(test)]
mod test {
  use std::num::ParseIntError;

  use crate::prelude::*;

  #[rxflux_macro::test]
  fn just_emits_one_item() {
    StepVerifier::create(mono::just("value")).expect_next("value").verify_complete().unwrap();
  }

  #[rxflux_macro::test]
  fn just_or_empty_without_value_completes() {
    StepVerifier::create(mono::just_or_empty::<i32>(None)).verify_complete().unwrap();
    StepVerifier::create(mono::just_or_empty(Some(3))).expect_next(3).verify_complete().unwrap();
  }

  #[rxflux_macro::test]
  fn from_callable_waits_for_demand() {
    StepVerifier::create_with_initial_request(mono::from_callable(|| "7".parse::<u8>()), 0)
      .expect_subscription()
      .expect_no_event(std::time::Duration::from_millis(10))
      .then_request(1)
      .expect_next(7)
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn from_callable_error_is_a_transformation_error() {
    StepVerifier::create(mono::from_callable(|| "seven".parse::<u8>()))
      .expect_error_of::<ParseIntError>()
      .verify()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn defer_returns_a_fresh_mono() {
    let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let c_counter = counter.clone();
    let deferred = mono::defer(move || mono::just(c_counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst)));
    StepVerifier::create(&deferred).expect_next(0).verify_complete().unwrap();
    StepVerifier::create(&deferred).expect_next(1).verify_complete().unwrap();
  }
}
