//! Shared mutable cells.
//!
//! Every piece of state in the engine can be touched from a timer thread, so
//! there is a single thread-safe flavour. Locks tolerate poisoning: a panic in
//! user code is converted into an error signal, and the state it left behind is
//! still consistent enough to deliver that signal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub trait RcDeref {
  type Target<'a>
  where
    Self: 'a;
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref<'a>(&'a self) -> Self::Target<'a>;
}

pub trait RcDerefMut {
  type Target<'a>
  where
    Self: 'a;
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref_mut<'a>(&'a self) -> Self::Target<'a>;
}

/// `Arc<Mutex<T>>` with poison-tolerant access.
#[derive(Default)]
pub struct MutArc<T>(Arc<Mutex<T>>);

impl<T> MutArc<T> {
  pub fn own(t: T) -> Self { Self(Arc::new(Mutex::new(t))) }

  pub fn ptr_eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl<T> From<T> for MutArc<T> {
  fn from(t: T) -> Self { Self::own(t) }
}

impl<T> RcDeref for MutArc<T> {
  type Target<'a>
    = MutexGuard<'a, T>
  where
    Self: 'a;

  #[inline]
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref<'a>(&'a self) -> Self::Target<'a> { lock(&self.0) }
}

impl<T> RcDerefMut for MutArc<T> {
  type Target<'a>
    = MutexGuard<'a, T>
  where
    Self: 'a;

  #[inline]
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref_mut<'a>(&'a self) -> Self::Target<'a> { lock(&self.0) }
}

impl<T> Clone for MutArc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

/// Locks `mutex`, recovering the guard if a previous holder panicked.
#[inline]
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod test {
  use super::*;

  #[rxflux_macro::test]
  fn clones_share_the_cell() {
    let a = MutArc::own(1);
    let b = a.clone();
    *b.rc_deref_mut() += 1;
    assert_eq!(*a.rc_deref(), 2);
    assert!(a.ptr_eq(&b));
  }

  #[rxflux_macro::test]
  fn lock_survives_poison() {
    let cell = Arc::new(Mutex::new(0));
    let c_cell = cell.clone();
    let _ = std::thread::spawn(move || {
      let _guard = c_cell.lock().unwrap();
      panic!("poison");
    })
    .join();
    assert!(cell.is_poisoned());
    *lock(&cell) = 5;
    assert_eq!(*lock(&cell), 5);
  }
}
