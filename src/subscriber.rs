//! Subscriber trait and the closure-based subscriber behind `subscribe(..)`.
//!
//! A subscriber receives exactly one `on_subscribe`, then any number of
//! `on_next` (never more than it requested), then at most one of `on_error` /
//! `on_complete`.

use std::marker::PhantomData;

use crate::{
  error::Error,
  hooks,
  rc::{MutArc, RcDeref, RcDerefMut},
  subscription::{SubscriptionRef, UNBOUNDED},
};

pub trait Subscriber<Item>: Send {
  /// Receives the subscription. Called once, before anything else.
  fn on_subscribe(&mut self, subscription: SubscriptionRef);

  fn on_next(&mut self, value: Item);

  /// Terminal: nothing is delivered afterwards.
  fn on_error(&mut self, err: Error);

  /// Terminal: nothing is delivered afterwards.
  fn on_complete(&mut self);
}

impl<Item, S> Subscriber<Item> for Box<S>
where
  S: Subscriber<Item> + ?Sized,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { (**self).on_subscribe(subscription) }

  #[inline]
  fn on_next(&mut self, value: Item) { (**self).on_next(value) }

  #[inline]
  fn on_error(&mut self, err: Error) { (**self).on_error(err) }

  #[inline]
  fn on_complete(&mut self) { (**self).on_complete() }
}

/// Type-erased subscriber, used by boxed publishers.
pub type BoxedSubscriber<Item> = Box<dyn Subscriber<Item>>;

// ============================================================================
// Forward - the common half of every single-upstream operator
// ============================================================================

/// Downstream plus upstream handle of a pass-through operator.
///
/// Keeps the `done` flag so that a failure raised inside the operator (for
/// example a panicking `map` closure) cancels the upstream, errors the
/// downstream once, and drops whatever the upstream still sends.
pub(crate) struct Forward<S, T> {
  pub(crate) actual: S,
  pub(crate) upstream: Option<SubscriptionRef>,
  pub(crate) done: bool,
  _item: PhantomData<fn(T)>,
}

impl<S, T> Forward<S, T>
where
  S: Subscriber<T>,
{
  pub(crate) fn new(actual: S) -> Self {
    Self { actual, upstream: None, done: false, _item: PhantomData }
  }

  pub(crate) fn subscribe(&mut self, subscription: SubscriptionRef) {
    self.upstream = Some(subscription.clone());
    self.actual.on_subscribe(subscription);
  }

  pub(crate) fn request_upstream(&self, n: u64) {
    if let Some(upstream) = &self.upstream {
      upstream.request(n);
    }
  }

  pub(crate) fn next(&mut self, value: T) {
    if !self.done {
      self.actual.on_next(value);
    }
  }

  /// Cancels the upstream and errors the downstream.
  pub(crate) fn fail(&mut self, err: Error) {
    if let Some(upstream) = self.upstream.take() {
      upstream.cancel();
    }
    self.error(err);
  }

  pub(crate) fn error(&mut self, err: Error) {
    if self.done {
      hooks::error_dropped(&err);
      return;
    }
    self.done = true;
    self.upstream = None;
    self.actual.on_error(err);
  }

  /// Completes the downstream; with `cancel_upstream` the upstream is
  /// cancelled first (the operator stops early).
  pub(crate) fn complete(&mut self, cancel_upstream: bool) {
    if self.done {
      return;
    }
    self.done = true;
    if let Some(upstream) = self.upstream.take() {
      if cancel_upstream {
        upstream.cancel();
      }
    }
    self.actual.on_complete();
  }
}

// ============================================================================
// LambdaSubscriber
// ============================================================================

/// Handle returned by the closure-based `subscribe` methods.
///
/// Disposing cancels the subscription; if the publisher has not called
/// `on_subscribe` yet, the subscription is cancelled as soon as it arrives.
#[derive(Clone, Default)]
pub struct Disposable {
  slot: MutArc<DisposableSlot>,
}

#[derive(Default)]
struct DisposableSlot {
  upstream: Option<SubscriptionRef>,
  disposed: bool,
  terminated: bool,
}

impl Disposable {
  pub fn dispose(&self) {
    let upstream = {
      let mut slot = self.slot.rc_deref_mut();
      slot.disposed = true;
      slot.upstream.take()
    };
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
  }

  /// Disposed explicitly, or the sequence reached a terminal signal.
  pub fn is_disposed(&self) -> bool {
    let slot = self.slot.rc_deref();
    slot.disposed || slot.terminated
  }

  /// Accepts the upstream; returns `false` if it was cancelled because the
  /// handle was already disposed.
  fn attach(&self, upstream: &SubscriptionRef) -> bool {
    let mut slot = self.slot.rc_deref_mut();
    if slot.disposed {
      drop(slot);
      upstream.cancel();
      false
    } else {
      slot.upstream = Some(upstream.clone());
      true
    }
  }

  fn terminate(&self) {
    let mut slot = self.slot.rc_deref_mut();
    slot.terminated = true;
    slot.upstream = None;
  }
}

type OnSubscribe = Box<dyn FnMut(&SubscriptionRef) + Send>;

/// Subscriber assembled from closures.
///
/// Without an `on_subscribe` callback it requests [`UNBOUNDED`]; with one, the
/// callback decides what to request. Without an error callback, errors go to
/// [`hooks::error_dropped`] instead of vanishing.
pub struct LambdaSubscriber<N, E, C> {
  next: N,
  error: Option<E>,
  complete: Option<C>,
  subscribe: Option<OnSubscribe>,
  handle: Disposable,
  done: bool,
}

impl<N, E, C> LambdaSubscriber<N, E, C> {
  pub fn new(next: N, error: Option<E>, complete: Option<C>) -> Self {
    Self { next, error, complete, subscribe: None, handle: Disposable::default(), done: false }
  }

  pub fn with_on_subscribe(mut self, f: impl FnMut(&SubscriptionRef) + Send + 'static) -> Self {
    self.subscribe = Some(Box::new(f));
    self
  }

  pub fn disposable(&self) -> Disposable { self.handle.clone() }
}

impl<Item, N, E, C> Subscriber<Item> for LambdaSubscriber<N, E, C>
where
  N: FnMut(Item) + Send,
  E: FnMut(Error) + Send,
  C: FnMut() + Send,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    if !self.handle.attach(&subscription) {
      return;
    }
    match self.subscribe.as_mut() {
      Some(f) => f(&subscription),
      None => subscription.request(UNBOUNDED),
    }
  }

  fn on_next(&mut self, value: Item) {
    if !self.done {
      (self.next)(value);
    }
  }

  fn on_error(&mut self, err: Error) {
    if self.done {
      hooks::error_dropped(&err);
      return;
    }
    self.done = true;
    self.handle.terminate();
    match self.error.as_mut() {
      Some(f) => f(err),
      None => hooks::error_dropped(&err),
    }
  }

  fn on_complete(&mut self) {
    if self.done {
      return;
    }
    self.done = true;
    self.handle.terminate();
    if let Some(f) = self.complete.as_mut() {
      f();
    }
  }
}
