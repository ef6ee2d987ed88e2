use std::{marker::PhantomData, sync::Arc};

use crate::{
  error::{self, Error},
  publisher::Publisher,
  subscriber::{Forward, Subscriber},
  subscription::SubscriptionRef,
};

/// Emits only the items for which the predicate returns `true`.
///
/// Every rejected item is replaced by a request for one more item upstream,
/// so the downstream never receives more than it asked for and never stalls
/// waiting for items that were dropped.
pub struct FilterOp<P, F> {
  source: P,
  predicate: Arc<F>,
}

impl<P, F> FilterOp<P, F> {
  pub(crate) fn new(source: P, predicate: F) -> Self {
    Self { source, predicate: Arc::new(predicate) }
  }
}

impl<P, F> Publisher for FilterOp<P, F>
where
  P: Publisher,
  F: Fn(&P::Item) -> bool + Send + Sync + 'static,
{
  type Item = P::Item;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item> + 'static,
  {
    self.source.subscribe_with(FilterSubscriber {
      forward: Forward::new(subscriber),
      predicate: self.predicate.clone(),
      _item: PhantomData,
    })
  }
}

struct FilterSubscriber<S, F, T> {
  forward: Forward<S, T>,
  predicate: Arc<F>,
  _item: PhantomData<fn(T)>,
}

impl<T, S, F> Subscriber<T> for FilterSubscriber<S, F, T>
where
  S: Subscriber<T>,
  F: Fn(&T) -> bool + Send + Sync,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.forward.subscribe(subscription) }

  fn on_next(&mut self, value: T) {
    if self.forward.done {
      return;
    }
    let predicate = &self.predicate;
    match error::catch(|| predicate(&value)) {
      Ok(true) => self.forward.next(value),
      Ok(false) => self.forward.request_upstream(1),
      Err(err) => self.forward.fail(err),
    }
  }

  fn on_error(&mut self, err: Error) { self.forward.error(err) }

  fn on_complete(&mut self) { self.forward.complete(false) }
}

#[cfg(test)]
mod test {
  use crate::prelude::*;

  #[rxflux_macro::test]
  fn fork_and_shared() {
    let evens = flux::range(0, 10).filter(|v| v % 2 == 0);
    StepVerifier::create(&evens).expect_next_seq([0, 2, 4, 6, 8]).verify_complete().unwrap();
    StepVerifier::create(&evens).expect_next_count(5).verify_complete().unwrap();
  }

  #[rxflux_macro::test]
  fn rejected_items_are_replaced_by_requests() {
    let source = flux::range(1, 20).filter(|v| v % 5 == 0);
    StepVerifier::create_with_initial_request(source, 2)
      .expect_next_seq([5, 10])
      .expect_no_event(std::time::Duration::from_millis(20))
      .then_request(1)
      .expect_next(15)
      .then_cancel()
      .verify()
      .unwrap();
  }
}
