use std::marker::PhantomData;

use crate::{
  error::Error,
  publisher::Publisher,
  subscriber::{Forward, Subscriber},
  subscription::SubscriptionRef,
};

/// Emits only the first `count` items of the source, then completes and
/// cancels the source. A source with fewer items is passed through whole.
pub struct TakeOp<P> {
  source: P,
  count: usize,
}

impl<P> TakeOp<P> {
  pub(crate) fn new(source: P, count: usize) -> Self { Self { source, count } }
}

impl<P: Publisher> Publisher for TakeOp<P> {
  type Item = P::Item;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item> + 'static,
  {
    self.source.subscribe_with(TakeSubscriber {
      forward: Forward::new(subscriber),
      remaining: self.count,
      _item: PhantomData,
    })
  }
}

struct TakeSubscriber<S, T> {
  forward: Forward<S, T>,
  remaining: usize,
  _item: PhantomData<fn(T)>,
}

impl<T, S> Subscriber<T> for TakeSubscriber<S, T>
where
  S: Subscriber<T>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    if self.remaining == 0 {
      subscription.cancel();
      self.forward.subscribe(crate::subscription::empty_subscription());
      self.forward.complete(false);
    } else {
      self.forward.subscribe(subscription);
    }
  }

  fn on_next(&mut self, value: T) {
    if self.forward.done {
      return;
    }
    self.remaining -= 1;
    self.forward.next(value);
    if self.remaining == 0 {
      self.forward.complete(true);
    }
  }

  fn on_error(&mut self, err: Error) { self.forward.error(err) }

  fn on_complete(&mut self) { self.forward.complete(false) }
}

#[cfg(test)]
mod test {
  use std::time::Duration;

  use crate::prelude::*;

  #[rxflux_macro::test]
  fn base_function() {
    StepVerifier::create(flux::range(0, 100).take(5))
      .expect_next_seq([0, 1, 2, 3, 4])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn take_more_than_available() {
    StepVerifier::create(flux::just([1, 2]).take(5)).expect_next_seq([1, 2]).verify_complete().unwrap();
  }

  #[rxflux_macro::test]
  fn take_zero_completes_without_items() {
    StepVerifier::create(flux::never::<i32>().take(0)).verify_complete().unwrap();
  }

  #[rxflux_macro::test]
  fn take_stops_an_infinite_source() {
    StepVerifier::with_virtual_time(|| flux::interval(Duration::from_secs(1)).take(3))
      .then_await(Duration::from_secs(3))
      .expect_next_seq([0, 1, 2])
      .verify_complete()
      .unwrap();
  }
}
