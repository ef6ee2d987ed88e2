//! Serialized, demand-bounded delivery to one subscriber.
//!
//! A [`Drain`] owns a [`Producer`] and the downstream subscriber. Anything that
//! may make progress (a request, a new upstream item, a timer) calls
//! [`Drain::drain`]; exactly one caller at a time runs the emission loop while
//! the others only bump the work counter, so signals are never delivered
//! concurrently and a re-entrant `request` from inside `on_next` never
//! recurses.

use std::{
  collections::VecDeque,
  marker::PhantomData,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
};

use super::{CompositeSubscription, Demand, Subscription, SubscriptionRef, UNBOUNDED};
use crate::{error::Error, rc::lock, signal::Signal, subscriber::Subscriber};

/// What a producer offers on one turn of the emission loop.
pub(crate) enum Step<T> {
  Next(T),
  /// Nothing to deliver right now.
  Pending,
  /// Terminal signal; the producer is not polled again.
  Done(Result<(), Error>),
}

pub(crate) trait Producer<T>: Send {
  /// `Next` may only be returned when `can_emit` is true; `Done` may be
  /// returned at any time.
  fn step(&mut self, can_emit: bool) -> Step<T>;
}

pub(crate) struct Drain<T, P, S> {
  demand: Demand,
  wip: AtomicUsize,
  producer: Mutex<P>,
  subscriber: Mutex<Option<S>>,
  rejected: Mutex<Option<Error>>,
  upstream: CompositeSubscription,
  _item: PhantomData<fn() -> T>,
}

impl<T, P, S> Drain<T, P, S>
where
  T: 'static,
  P: Producer<T> + 'static,
  S: Subscriber<T> + 'static,
{
  pub(crate) fn new(producer: P) -> Arc<Self> {
    Arc::new(Drain {
      demand: Demand::default(),
      wip: AtomicUsize::new(0),
      producer: Mutex::new(producer),
      subscriber: Mutex::new(None),
      rejected: Mutex::new(None),
      upstream: CompositeSubscription::default(),
      _item: PhantomData,
    })
  }

  /// Hands the drain to `subscriber` as its subscription and starts emitting.
  ///
  /// Must run before anything else can reach the drain.
  pub(crate) fn start(self: &Arc<Self>, subscriber: S) {
    let handle: SubscriptionRef = self.clone();
    self.start_with(subscriber, handle);
  }

  /// Like [`start`](Self::start), but the subscriber receives `handle`, which
  /// is expected to forward to this drain.
  pub(crate) fn start_with(&self, mut subscriber: S, handle: SubscriptionRef) {
    self.wip.fetch_add(1, Ordering::AcqRel);
    subscriber.on_subscribe(handle);
    *lock(&self.subscriber) = Some(subscriber);
    self.run(1);
  }

  /// Updates the producer, then delivers whatever became ready. Ignored once
  /// the subscription is cancelled or terminated.
  pub(crate) fn feed(&self, f: impl FnOnce(&mut P)) {
    if self.demand.is_cancelled() {
      return;
    }
    f(&mut lock(&self.producer));
    self.drain();
  }

  pub(crate) fn drain(&self) {
    if self.wip.fetch_add(1, Ordering::AcqRel) == 0 {
      self.run(1);
    }
  }

  fn run(&self, mut missed: usize) {
    loop {
      self.emit_ready();
      let remaining = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if remaining == 0 {
        break;
      }
      missed = remaining;
    }
  }

  fn emit_ready(&self) {
    let mut slot = lock(&self.subscriber);
    loop {
      if slot.is_none() {
        return;
      }
      if self.demand.is_cancelled() {
        *slot = None;
        return;
      }
      let rejected = lock(&self.rejected).take();
      let step = match rejected {
        Some(err) => Step::Done(Err(err)),
        None => lock(&self.producer).step(self.demand.has_demand()),
      };
      match step {
        Step::Next(value) => {
          self.demand.produced(1);
          if let Some(subscriber) = slot.as_mut() {
            subscriber.on_next(value);
          }
        }
        Step::Pending => return,
        Step::Done(result) => {
          let subscriber = slot.take();
          drop(slot);
          self.demand.cancel();
          self.upstream.cancel_all();
          if let Some(mut subscriber) = subscriber {
            match result {
              Ok(()) => subscriber.on_complete(),
              Err(err) => subscriber.on_error(err),
            }
          }
          return;
        }
      }
    }
  }

  /// Ties an upstream subscription to this drain's lifetime.
  pub(crate) fn link(&self, upstream: SubscriptionRef) -> usize { self.upstream.add(upstream) }

  pub(crate) fn unlink(&self, id: usize) { self.upstream.remove(id); }

  pub(crate) fn requested(&self) -> u64 { self.demand.get() }

  pub(crate) fn is_cancelled(&self) -> bool { self.demand.is_cancelled() }
}

impl<T, P, S> Subscription for Drain<T, P, S>
where
  T: 'static,
  P: Producer<T> + 'static,
  S: Subscriber<T> + 'static,
{
  fn request(&self, n: u64) {
    if n == 0 {
      tracing::warn!("request(0) rejected, terminating the subscription");
      *lock(&self.rejected) = Some(Error::InvalidRequest);
    } else {
      self.demand.add(n);
    }
    self.drain();
  }

  fn cancel(&self) {
    if self.demand.cancel() {
      self.upstream.cancel_all();
    }
    self.drain();
  }
}

// ============================================================================
// Feeding a drain from upstream publishers
// ============================================================================

/// A drain seen from the upstream side.
pub(crate) trait Sink: Send + Sync {
  type Producer;

  fn feed(&self, f: impl FnOnce(&mut Self::Producer));

  fn link(&self, upstream: SubscriptionRef) -> usize;

  fn unlink(&self, id: usize);
}

impl<T, P, S> Sink for Drain<T, P, S>
where
  T: 'static,
  P: Producer<T> + 'static,
  S: Subscriber<T> + 'static,
{
  type Producer = P;

  fn feed(&self, f: impl FnOnce(&mut P)) { Drain::feed(self, f) }

  fn link(&self, upstream: SubscriptionRef) -> usize { Drain::link(self, upstream) }

  fn unlink(&self, id: usize) { Drain::unlink(self, id) }
}

/// Subscribes to one upstream on behalf of a drain, requesting unbounded and
/// routing every signal into the drain's producer.
pub(crate) struct Feed<K, R> {
  sink: Arc<K>,
  route: R,
  link: Option<usize>,
}

impl<K, R> Feed<K, R> {
  pub(crate) fn new(sink: Arc<K>, route: R) -> Self { Self { sink, route, link: None } }
}

impl<K, R> Feed<K, R>
where
  K: Sink,
{
  fn deliver<U>(&self, signal: Signal<U>)
  where
    R: Fn(&mut K::Producer, Signal<U>),
  {
    let route = &self.route;
    self.sink.feed(|producer| route(producer, signal));
  }

  fn unlink(&mut self) {
    if let Some(id) = self.link.take() {
      self.sink.unlink(id);
    }
  }
}

impl<U, K, R> Subscriber<U> for Feed<K, R>
where
  K: Sink,
  R: Fn(&mut K::Producer, Signal<U>) + Send,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.link = Some(self.sink.link(subscription.clone()));
    subscription.request(UNBOUNDED);
  }

  fn on_next(&mut self, value: U) { self.deliver(Signal::Next(value)); }

  fn on_error(&mut self, err: Error) {
    self.unlink();
    self.deliver(Signal::<U>::Error(err));
  }

  fn on_complete(&mut self) {
    self.unlink();
    self.deliver(Signal::<U>::Complete);
  }
}

// ============================================================================
// QueueProducer
// ============================================================================

/// Buffers items pushed by one or more upstreams.
///
/// `pending` counts the upstreams that have not completed yet; the queue
/// completes once all of them have and the buffer is empty. An error is
/// delivered ahead of any buffered items.
pub(crate) struct QueueProducer<T> {
  queue: VecDeque<T>,
  pending: usize,
  error: Option<Error>,
}

impl<T> QueueProducer<T> {
  pub(crate) fn new(pending: usize) -> Self { Self { queue: VecDeque::new(), pending, error: None } }

  pub(crate) fn push(&mut self, value: T) { self.queue.push_back(value); }

  pub(crate) fn fail(&mut self, err: Error) {
    if self.error.is_none() {
      self.queue.clear();
      self.error = Some(err);
    }
  }

  pub(crate) fn complete_one(&mut self) { self.pending = self.pending.saturating_sub(1); }

  /// Registers one more upstream that must complete.
  pub(crate) fn add_pending(&mut self) { self.pending += 1; }

  pub(crate) fn accept(&mut self, signal: Signal<T>) {
    match signal {
      Signal::Next(v) => self.push(v),
      Signal::Error(e) => self.fail(e),
      Signal::Complete => self.complete_one(),
    }
  }

  pub(crate) fn finish(&mut self, result: Result<(), Error>) {
    match result {
      Ok(()) => self.complete_one(),
      Err(e) => self.fail(e),
    }
  }

  pub(crate) fn len(&self) -> usize { self.queue.len() }
}

impl<T: Send> Producer<T> for QueueProducer<T> {
  fn step(&mut self, can_emit: bool) -> Step<T> {
    if let Some(err) = self.error.take() {
      return Step::Done(Err(err));
    }
    if can_emit {
      if let Some(v) = self.queue.pop_front() {
        return Step::Next(v);
      }
    }
    if self.queue.is_empty() && self.pending == 0 {
      Step::Done(Ok(()))
    } else {
      Step::Pending
    }
  }
}

/// A queue-backed drain with the subscriber type erased, for code that holds
/// many downstreams at once or hands the drain to user code.
pub(crate) trait Emitter<T>: Send + Sync {
  fn emit(&self, signal: Signal<T>);

  fn is_cancelled(&self) -> bool;

  fn requested(&self) -> u64;
}

impl<T, S> Emitter<T> for Drain<T, QueueProducer<T>, S>
where
  T: Send + 'static,
  S: Subscriber<T> + 'static,
{
  fn emit(&self, signal: Signal<T>) { self.feed(|queue| queue.accept(signal)) }

  fn is_cancelled(&self) -> bool { Drain::is_cancelled(self) }

  fn requested(&self) -> u64 { Drain::requested(self) }
}
