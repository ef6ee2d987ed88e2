use crate::{error, publisher::Publisher, subscriber::Subscriber};

use super::trivial::terminate;

/// Creates a publisher that calls `factory` on every subscription and
/// subscribes to the publisher it returns.
///
/// A panic in `factory` fails that subscription with
/// [`Error::Panicked`](crate::error::Error::Panicked).
///
/// ```rust
/// use rxflux::prelude::*;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// static CALLS: AtomicUsize = AtomicUsize::new(0);
/// let deferred = flux::defer(|| flux::just([CALLS.fetch_add(1, Ordering::SeqCst)]));
/// deferred.subscribe(|v| assert_eq!(v, 0));
/// deferred.subscribe(|v| assert_eq!(v, 1));
/// ```
pub fn defer<F, P>(factory: F) -> Defer<F>
where
  F: Fn() -> P + Send + Sync,
  P: Publisher,
{
  Defer(factory)
}

#[derive(Clone)]
pub struct Defer<F>(F);

impl<F, P> Publisher for Defer<F>
where
  F: Fn() -> P + Send + Sync,
  P: Publisher,
{
  type Item = P::Item;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item> + 'static,
  {
    match error::catch(&self.0) {
      Ok(publisher) => publisher.subscribe_with(subscriber),
      Err(err) => terminate(subscriber, Err(err)),
    }
  }
}

#[cfg(test)]
mod test {
  use std::{
    sync::{
      atomic::{AtomicI64, Ordering},
      Arc,
    },
    time::Instant,
  };

  use crate::prelude::*;

  #[rxflux_macro::test]
  fn factory_runs_per_subscription() {
    let calls = Arc::new(AtomicI64::new(0));
    let c_calls = calls.clone();
    let started = Instant::now();
    let deferred = flux::defer(move || {
      let call = c_calls.fetch_add(1, Ordering::SeqCst);
      flux::just([(call, started.elapsed())])
    });
    for expected in 0..4 {
      StepVerifier::create(&deferred)
        .expect_next_matches(move |(call, _)| *call == expected)
        .verify_complete()
        .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
  }

  #[rxflux_macro::test]
  fn nothing_runs_before_subscription() {
    let calls = Arc::new(AtomicI64::new(0));
    let c_calls = calls.clone();
    let _deferred = flux::defer(move || {
      c_calls.fetch_add(1, Ordering::SeqCst);
      flux::empty::<i32>()
    });
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[rxflux_macro::test]
  fn panicking_factory_fails_the_subscription() {
    let deferred = flux::defer(|| -> flux::Empty<i32> { panic!("no publisher") });
    StepVerifier::create(deferred).expect_error_kind(ErrorKind::Panicked).verify().unwrap();
  }
}
