use std::{error::Error as StdError, marker::PhantomData, sync::Arc};

use crate::{
  error::{self, Error},
  publisher::Publisher,
  subscriber::{Forward, Subscriber},
  subscription::SubscriptionRef,
};

/// Created by [`PublisherExt::map`](crate::publisher::PublisherExt::map).
pub struct MapOp<P, F> {
  source: P,
  func: Arc<F>,
}

impl<P, F> MapOp<P, F> {
  pub(crate) fn new(source: P, func: F) -> Self { Self { source, func: Arc::new(func) } }
}

impl<P, F, U> Publisher for MapOp<P, F>
where
  P: Publisher,
  F: Fn(P::Item) -> U + Send + Sync + 'static,
  U: Send + 'static,
{
  type Item = U;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<U> + 'static,
  {
    self.source.subscribe_with(MapSubscriber {
      forward: Forward::new(subscriber),
      func: self.func.clone(),
      _item: PhantomData,
    })
  }
}

struct MapSubscriber<S, F, U> {
  forward: Forward<S, U>,
  func: Arc<F>,
  _item: PhantomData<fn(U)>,
}

impl<T, U, S, F> Subscriber<T> for MapSubscriber<S, F, U>
where
  S: Subscriber<U>,
  F: Fn(T) -> U + Send + Sync,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.forward.subscribe(subscription) }

  fn on_next(&mut self, value: T) {
    if self.forward.done {
      return;
    }
    let func = &self.func;
    match error::catch(|| func(value)) {
      Ok(mapped) => self.forward.next(mapped),
      Err(err) => self.forward.fail(err),
    }
  }

  fn on_error(&mut self, err: Error) { self.forward.error(err) }

  fn on_complete(&mut self) { self.forward.complete(false) }
}

/// Created by [`PublisherExt::try_map`](crate::publisher::PublisherExt::try_map).
pub struct TryMapOp<P, F> {
  source: P,
  func: Arc<F>,
}

impl<P, F> TryMapOp<P, F> {
  pub(crate) fn new(source: P, func: F) -> Self { Self { source, func: Arc::new(func) } }
}

impl<P, F, U, E> Publisher for TryMapOp<P, F>
where
  P: Publisher,
  F: Fn(P::Item) -> Result<U, E> + Send + Sync + 'static,
  E: StdError + Send + Sync + 'static,
  U: Send + 'static,
{
  type Item = U;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<U> + 'static,
  {
    self.source.subscribe_with(TryMapSubscriber {
      forward: Forward::new(subscriber),
      func: self.func.clone(),
      _item: PhantomData,
    })
  }
}

struct TryMapSubscriber<S, F, U> {
  forward: Forward<S, U>,
  func: Arc<F>,
  _item: PhantomData<fn(U)>,
}

impl<T, U, E, S, F> Subscriber<T> for TryMapSubscriber<S, F, U>
where
  S: Subscriber<U>,
  F: Fn(T) -> Result<U, E> + Send + Sync,
  E: StdError + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.forward.subscribe(subscription) }

  fn on_next(&mut self, value: T) {
    if self.forward.done {
      return;
    }
    let func = &self.func;
    match error::catch(|| func(value)) {
      Ok(Ok(mapped)) => self.forward.next(mapped),
      Ok(Err(err)) => self.forward.fail(Error::transformation(err)),
      Err(err) => self.forward.fail(err),
    }
  }

  fn on_error(&mut self, err: Error) { self.forward.error(err) }

  fn on_complete(&mut self) { self.forward.complete(false) }
}

#[cfg(test)]
mod test {
  use std::{
    num::ParseIntError,
    sync::{
      atomic::{AtomicBool, Ordering},
      Arc,
    },
  };

  use crate::{error::ErrorKind, prelude::*};

  #[rxflux_macro::test]
  fn primitive_type() {
    StepVerifier::create(flux::range(100, 2).map(|v| v * 2))
      .expect_next_seq([200, 202])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn map_types_mixed() {
    StepVerifier::create(flux::just(['a', 'b', 'c']).map(|c| c as u32 - 'a' as u32))
      .expect_next_seq([0, 1, 2])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn panic_becomes_error_and_cancels_upstream() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let c_cancelled = cancelled.clone();
    let source = flux::range(1, 5)
      .do_on_cancel(move || c_cancelled.store(true, Ordering::SeqCst))
      .map(|v| if v == 3 { panic!("three") } else { v });
    StepVerifier::create(source)
      .expect_next_seq([1, 2])
      .expect_error_kind(ErrorKind::Panicked)
      .verify()
      .unwrap();
    assert!(cancelled.load(Ordering::SeqCst));
  }

  #[rxflux_macro::test]
  fn try_map_wraps_the_cause() {
    let source = flux::just(["1", "x", "3"]).try_map(|s| s.parse::<i32>());
    StepVerifier::create(source)
      .expect_next(1)
      .expect_error_of::<ParseIntError>()
      .verify()
      .unwrap();
  }
}
