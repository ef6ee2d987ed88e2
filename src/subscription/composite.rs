use std::sync::Mutex;

use smallvec::SmallVec;

use super::{Subscription, SubscriptionRef};
use crate::rc::lock;

/// A set of upstream subscriptions with id-based removal, cancelled together.
///
/// Operators with several upstreams (merge, zip, flat_map, …) link every
/// upstream here so that a single `cancel_all` releases them. Once cancelled,
/// the set stays closed: anything added afterwards is cancelled on the spot.
///
/// ```rust
/// use rxflux::subscription::{CompositeSubscription, EmptySubscription};
/// use std::sync::Arc;
///
/// let set = CompositeSubscription::default();
/// let a = set.add(Arc::new(EmptySubscription));
/// let _b = set.add(Arc::new(EmptySubscription));
/// assert_eq!(set.len(), 2);
/// assert!(set.remove(a));
/// set.cancel_all();
/// assert!(set.is_closed());
/// ```
#[derive(Default)]
pub struct CompositeSubscription {
  inner: Mutex<Slots>,
}

#[derive(Default)]
struct Slots {
  next_id: usize,
  closed: bool,
  items: SmallVec<[(usize, SubscriptionRef); 2]>,
}

impl CompositeSubscription {
  /// Adds `subscription` and returns its id.
  pub fn add(&self, subscription: SubscriptionRef) -> usize {
    let mut slots = lock(&self.inner);
    let id = slots.next_id;
    slots.next_id += 1;
    if slots.closed {
      drop(slots);
      subscription.cancel();
    } else {
      slots.items.push((id, subscription));
    }
    id
  }

  /// Forgets the subscription with `id` without cancelling it.
  pub fn remove(&self, id: usize) -> bool {
    let mut slots = lock(&self.inner);
    match slots.items.iter().position(|(i, _)| *i == id) {
      Some(pos) => {
        slots.items.remove(pos);
        true
      }
      None => false,
    }
  }

  pub fn len(&self) -> usize { lock(&self.inner).items.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  pub fn is_closed(&self) -> bool { lock(&self.inner).closed }

  /// Closes the set and cancels every member. Members are cancelled outside
  /// the lock, so a member may call back into this set.
  pub fn cancel_all(&self) {
    let items = {
      let mut slots = lock(&self.inner);
      if slots.closed {
        return;
      }
      slots.closed = true;
      std::mem::take(&mut slots.items)
    };
    for (_, subscription) in items {
      subscription.cancel();
    }
  }
}

impl Subscription for CompositeSubscription {
  fn request(&self, n: u64) {
    let members: SmallVec<[SubscriptionRef; 2]> =
      lock(&self.inner).items.iter().map(|(_, s)| s.clone()).collect();
    for member in members {
      member.request(n);
    }
  }

  fn cancel(&self) { self.cancel_all() }
}
