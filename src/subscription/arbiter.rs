use std::{marker::PhantomData, sync::Arc};

use super::{Subscription, SubscriptionRef, UNBOUNDED};
use crate::{
  error::Error,
  rc::{MutArc, RcDeref, RcDerefMut},
  subscriber::Subscriber,
};

/// Hands one downstream demand over to a sequence of upstream subscriptions.
///
/// Operators that switch to another source mid-stream (concat,
/// switch_if_empty, error recovery) give the downstream an `Arbiter` instead of
/// the upstream subscription. The arbiter remembers how much demand is still
/// outstanding, so the next source is asked for exactly what the previous one
/// left unserved.
#[derive(Default, Clone)]
pub(crate) struct Arbiter {
  state: MutArc<ArbiterState>,
}

#[derive(Default)]
struct ArbiterState {
  current: Option<SubscriptionRef>,
  outstanding: u64,
  cancelled: bool,
}

impl Arbiter {
  /// Switches to `upstream` and requests the outstanding demand from it.
  pub(crate) fn set(&self, upstream: SubscriptionRef) {
    let (cancelled, outstanding) = {
      let mut state = self.state.rc_deref_mut();
      if !state.cancelled {
        state.current = Some(upstream.clone());
      }
      (state.cancelled, state.outstanding)
    };
    if cancelled {
      upstream.cancel();
    } else if outstanding > 0 {
      upstream.request(outstanding);
    }
  }

  pub(crate) fn produced(&self, n: u64) {
    let mut state = self.state.rc_deref_mut();
    if state.outstanding != UNBOUNDED {
      state.outstanding = state.outstanding.saturating_sub(n);
    }
  }

  pub(crate) fn is_cancelled(&self) -> bool { self.state.rc_deref().cancelled }
}

impl Subscription for Arbiter {
  fn request(&self, n: u64) {
    let current = {
      let mut state = self.state.rc_deref_mut();
      state.outstanding = state.outstanding.saturating_add(n);
      state.current.clone()
    };
    if let Some(current) = current {
      current.request(n);
    }
  }

  fn cancel(&self) {
    let current = {
      let mut state = self.state.rc_deref_mut();
      state.cancelled = true;
      state.current.take()
    };
    if let Some(current) = current {
      current.cancel();
    }
  }
}

/// Forwards a replacement source to a downstream that already holds the
/// arbiter as its subscription.
pub(crate) struct Arbitrated<S, T> {
  arbiter: Arc<Arbiter>,
  actual: S,
  _item: PhantomData<fn(T)>,
}

impl<S, T> Arbitrated<S, T> {
  pub(crate) fn new(arbiter: Arc<Arbiter>, actual: S) -> Self {
    Self { arbiter, actual, _item: PhantomData }
  }
}

impl<S, T> Subscriber<T> for Arbitrated<S, T>
where
  S: Subscriber<T>,
  T: Send,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.arbiter.set(subscription); }

  fn on_next(&mut self, value: T) {
    self.arbiter.produced(1);
    self.actual.on_next(value);
  }

  fn on_error(&mut self, err: Error) { self.actual.on_error(err); }

  fn on_complete(&mut self) { self.actual.on_complete(); }
}

#[cfg(test)]
mod test {
  use std::sync::Mutex;

  use super::*;

  #[derive(Default)]
  struct RecordingSubscription {
    log: Mutex<Vec<String>>,
  }

  impl Subscription for RecordingSubscription {
    fn request(&self, n: u64) { self.log.lock().unwrap().push(format!("request({n})")); }

    fn cancel(&self) { self.log.lock().unwrap().push("cancel".into()); }
  }

  #[rxflux_macro::test]
  fn next_source_gets_unserved_demand() {
    let arbiter = Arbiter::default();
    arbiter.request(5);

    let first = Arc::new(RecordingSubscription::default());
    arbiter.set(first.clone());
    arbiter.produced(3);

    let second = Arc::new(RecordingSubscription::default());
    arbiter.set(second.clone());

    assert_eq!(*first.log.lock().unwrap(), vec!["request(5)"]);
    assert_eq!(*second.log.lock().unwrap(), vec!["request(2)"]);
  }

  #[rxflux_macro::test]
  fn unbounded_demand_is_never_consumed() {
    let arbiter = Arbiter::default();
    arbiter.request(UNBOUNDED);
    arbiter.produced(100);
    let next = Arc::new(RecordingSubscription::default());
    arbiter.set(next.clone());
    assert_eq!(*next.log.lock().unwrap(), vec![format!("request({UNBOUNDED})")]);
  }

  #[rxflux_macro::test]
  fn sources_set_after_cancel_are_cancelled() {
    let arbiter = Arbiter::default();
    arbiter.request(1);
    arbiter.cancel();
    assert!(arbiter.is_cancelled());
    let late = Arc::new(RecordingSubscription::default());
    arbiter.set(late.clone());
    assert_eq!(*late.log.lock().unwrap(), vec!["cancel"]);
  }
}
