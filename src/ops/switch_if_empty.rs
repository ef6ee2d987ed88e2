use std::sync::Arc;

use crate::{
  error::Error,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{Arbiter, Arbitrated, SubscriptionRef},
};

/// Falls back to `alternative` when the source completes without emitting.
pub struct SwitchIfEmptyOp<P, A> {
  source: P,
  alternative: Arc<A>,
}

impl<P, A> SwitchIfEmptyOp<P, A> {
  pub(crate) fn new(source: P, alternative: A) -> Self {
    Self { source, alternative: Arc::new(alternative) }
  }
}

impl<P, A> Publisher for SwitchIfEmptyOp<P, A>
where
  P: Publisher,
  A: Publisher<Item = P::Item> + 'static,
{
  type Item = P::Item;

  fn subscribe_with<S>(&self, mut subscriber: S)
  where
    S: Subscriber<P::Item> + 'static,
  {
    let arbiter = Arc::new(Arbiter::default());
    subscriber.on_subscribe(arbiter.clone());
    self.source.subscribe_with(SwitchIfEmptySubscriber {
      actual: Some(subscriber),
      arbiter,
      alternative: self.alternative.clone(),
      is_empty: true,
    });
  }
}

struct SwitchIfEmptySubscriber<S, A> {
  actual: Option<S>,
  arbiter: Arc<Arbiter>,
  alternative: Arc<A>,
  is_empty: bool,
}

impl<T, S, A> Subscriber<T> for SwitchIfEmptySubscriber<S, A>
where
  T: Send + 'static,
  S: Subscriber<T> + 'static,
  A: Publisher<Item = T> + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.arbiter.set(subscription) }

  fn on_next(&mut self, value: T) {
    self.is_empty = false;
    self.arbiter.produced(1);
    if let Some(actual) = self.actual.as_mut() {
      actual.on_next(value);
    }
  }

  fn on_error(&mut self, err: Error) {
    if let Some(mut actual) = self.actual.take() {
      actual.on_error(err);
    }
  }

  fn on_complete(&mut self) {
    let Some(mut actual) = self.actual.take() else { return };
    if !self.is_empty {
      actual.on_complete();
    } else if !self.arbiter.is_cancelled() {
      self.alternative.subscribe_with(Arbitrated::new(self.arbiter.clone(), actual));
    }
  }
}
