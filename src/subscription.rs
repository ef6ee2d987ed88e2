//! The demand protocol between one publisher and one subscriber.
//!
//! A [`Subscription`] is handed to the subscriber in `on_subscribe`. The
//! subscriber asks for items with [`Subscription::request`]; the producer never
//! emits more than the cumulative amount requested. [`Subscription::cancel`]
//! stops emission and is idempotent. After a terminal signal both calls are
//! no-ops.

use std::sync::{
  atomic::{AtomicBool, AtomicU64, Ordering},
  Arc,
};

mod arbiter;
mod composite;
pub(crate) mod drain;

pub(crate) use arbiter::{Arbitrated, Arbiter};
pub use composite::CompositeSubscription;

/// Demand value meaning "no limit". Demand saturates here and is never
/// decremented once reached.
pub const UNBOUNDED: u64 = u64::MAX;

pub trait Subscription: Send + Sync {
  /// Adds `n` to the outstanding demand. `n` must be positive.
  fn request(&self, n: u64);

  /// Stops emission and releases upstream resources.
  fn cancel(&self);
}

/// The handle a subscriber receives in `on_subscribe`.
pub type SubscriptionRef = Arc<dyn Subscription>;

impl<T: Subscription + ?Sized> Subscription for Arc<T> {
  #[inline]
  fn request(&self, n: u64) { (**self).request(n) }

  #[inline]
  fn cancel(&self) { (**self).cancel() }
}

/// A subscription that ignores requests and cancellation. Given to subscribers
/// of a sequence that is already over before it started.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySubscription;

impl Subscription for EmptySubscription {
  fn request(&self, _n: u64) {}

  fn cancel(&self) {}
}

pub fn empty_subscription() -> SubscriptionRef { Arc::new(EmptySubscription) }

/// Outstanding demand plus the cancelled flag of one subscription.
#[derive(Debug, Default)]
pub struct Demand {
  requested: AtomicU64,
  cancelled: AtomicBool,
}

impl Demand {
  /// Adds `n` to the demand, saturating at [`UNBOUNDED`]. Returns the previous
  /// value.
  pub fn add(&self, n: u64) -> u64 {
    match self.requested.fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| {
      if r == UNBOUNDED { None } else { Some(r.saturating_add(n)) }
    }) {
      Ok(prev) | Err(prev) => prev,
    }
  }

  /// Accounts for `n` emitted items.
  pub fn produced(&self, n: u64) {
    let _ = self.requested.fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| {
      if r == UNBOUNDED { None } else { Some(r.saturating_sub(n)) }
    });
  }

  #[inline]
  pub fn get(&self) -> u64 { self.requested.load(Ordering::Acquire) }

  #[inline]
  pub fn has_demand(&self) -> bool { self.get() > 0 }

  /// Marks the subscription cancelled. Returns `true` only for the first call.
  pub fn cancel(&self) -> bool { !self.cancelled.swap(true, Ordering::AcqRel) }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }
}
