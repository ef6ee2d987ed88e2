use std::sync::Arc;

use crate::{
  error::{self, Error},
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{
    drain::{Drain, QueueProducer},
    Subscription, SubscriptionRef, UNBOUNDED,
  },
};

/// Upper bound on inner publishers subscribed at the same time, unless
/// `flat_map_with` says otherwise.
pub const DEFAULT_CONCURRENCY: usize = 256;

/// Maps each item to an inner publisher and merges the inner items.
///
/// The source is asked for `concurrency` items up front and for one more each
/// time an inner publisher completes. Inner publishers are subscribed with an
/// unbounded request; their items wait in a shared queue until the downstream
/// asks for them.
pub struct FlatMapOp<P, F> {
  source: P,
  func: Arc<F>,
  concurrency: usize,
}

impl<P, F> FlatMapOp<P, F> {
  pub(crate) fn new(source: P, func: F, concurrency: usize) -> Self {
    Self { source, func: Arc::new(func), concurrency }
  }
}

type Merged<U, S> = Arc<Drain<U, QueueProducer<U>, S>>;

impl<P, F, Q> Publisher for FlatMapOp<P, F>
where
  P: Publisher,
  F: Fn(P::Item) -> Q + Send + Sync + 'static,
  Q: Publisher + 'static,
{
  type Item = Q::Item;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<Q::Item> + 'static,
  {
    // The source counts as one pending stream until it completes.
    let drain: Merged<Q::Item, S> = Drain::new(QueueProducer::new(1));
    drain.start(subscriber);
    self.source.subscribe_with(FlatMapOuter {
      drain,
      func: self.func.clone(),
      concurrency: self.concurrency,
      upstream: None,
    });
  }
}

struct FlatMapOuter<S, F, Q: Publisher> {
  drain: Merged<Q::Item, S>,
  func: Arc<F>,
  concurrency: usize,
  upstream: Option<SubscriptionRef>,
}

impl<T, S, F, Q> Subscriber<T> for FlatMapOuter<S, F, Q>
where
  F: Fn(T) -> Q + Send + Sync,
  Q: Publisher + 'static,
  S: Subscriber<Q::Item> + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.drain.link(subscription.clone());
    self.upstream = Some(subscription.clone());
    subscription.request(self.concurrency as u64);
  }

  fn on_next(&mut self, value: T) {
    if self.drain.is_cancelled() {
      return;
    }
    let func = &self.func;
    match error::catch(|| func(value)) {
      Ok(inner) => {
        self.drain.feed(|queue| queue.add_pending());
        inner.subscribe_with(FlatMapInner {
          drain: self.drain.clone(),
          outer: self.upstream.clone(),
          link: None,
        });
      }
      Err(err) => {
        if let Some(upstream) = self.upstream.take() {
          upstream.cancel();
        }
        self.drain.feed(|queue| queue.fail(err));
      }
    }
  }

  fn on_error(&mut self, err: Error) { self.drain.feed(|queue| queue.fail(err)) }

  fn on_complete(&mut self) { self.drain.feed(|queue| queue.complete_one()) }
}

struct FlatMapInner<U, S> {
  drain: Merged<U, S>,
  outer: Option<SubscriptionRef>,
  link: Option<usize>,
}

impl<U, S> FlatMapInner<U, S>
where
  U: Send + 'static,
  S: Subscriber<U> + 'static,
{
  fn unlink(&mut self) {
    if let Some(id) = self.link.take() {
      self.drain.unlink(id);
    }
  }
}

impl<U, S> Subscriber<U> for FlatMapInner<U, S>
where
  U: Send + 'static,
  S: Subscriber<U> + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.link = Some(self.drain.link(subscription.clone()));
    subscription.request(UNBOUNDED);
  }

  fn on_next(&mut self, value: U) { self.drain.feed(|queue| queue.push(value)) }

  fn on_error(&mut self, err: Error) {
    self.unlink();
    self.drain.feed(|queue| queue.fail(err));
  }

  fn on_complete(&mut self) {
    self.unlink();
    self.drain.feed(|queue| queue.complete_one());
    if let Some(outer) = self.outer.take() {
      outer.request(1);
    }
  }
}
