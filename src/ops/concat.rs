use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Mutex,
};

use crate::{
  error::Error,
  publisher::Publisher,
  rc::lock,
  subscriber::Subscriber,
  subscription::{Arbiter, SubscriptionRef},
};

/// Subscribes to the sources one after another, each once the previous one
/// has completed.
///
/// The downstream sees a single subscription; demand left unserved by one
/// source is requested from the next. An error ends the whole sequence.
pub struct ConcatOp<P> {
  sources: Arc<[P]>,
}

impl<P> ConcatOp<P> {
  pub(crate) fn new(sources: Vec<P>) -> Self { Self { sources: sources.into() } }
}

impl<P> Publisher for ConcatOp<P>
where
  P: Publisher + 'static,
{
  type Item = P::Item;

  fn subscribe_with<S>(&self, mut subscriber: S)
  where
    S: Subscriber<P::Item> + 'static,
  {
    let arbiter = Arbiter::default();
    subscriber.on_subscribe(Arc::new(arbiter.clone()));
    let shared = Arc::new(ConcatShared {
      sources: self.sources.clone(),
      arbiter,
      wip: AtomicUsize::new(0),
      next: Mutex::new(None),
    });
    shared.advance(0, subscriber);
  }
}

/// State shared by the subscribers of one concat subscription.
///
/// A source completing synchronously hands the downstream back through
/// `next` instead of subscribing the following source on its own stack;
/// whichever call owns the work counter does the subscribing.
struct ConcatShared<P, S> {
  sources: Arc<[P]>,
  arbiter: Arbiter,
  wip: AtomicUsize,
  next: Mutex<Option<(usize, S)>>,
}

impl<P, S> ConcatShared<P, S>
where
  P: Publisher + 'static,
  S: Subscriber<P::Item> + 'static,
{
  fn advance(self: &Arc<Self>, index: usize, actual: S) {
    *lock(&self.next) = Some((index, actual));
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      let next = lock(&self.next).take();
      if let Some((index, actual)) = next {
        self.subscribe_at(index, actual);
      }
      let remaining = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if remaining == 0 {
        break;
      }
      missed = remaining;
    }
  }

  fn subscribe_at(self: &Arc<Self>, index: usize, mut actual: S) {
    if self.arbiter.is_cancelled() {
      return;
    }
    match self.sources.get(index) {
      Some(source) => {
        source.subscribe_with(ConcatSubscriber { shared: self.clone(), index, actual: Some(actual) })
      }
      None => actual.on_complete(),
    }
  }
}

struct ConcatSubscriber<P, S> {
  shared: Arc<ConcatShared<P, S>>,
  index: usize,
  actual: Option<S>,
}

impl<P, S> Subscriber<P::Item> for ConcatSubscriber<P, S>
where
  P: Publisher + 'static,
  S: Subscriber<P::Item> + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.shared.arbiter.set(subscription) }

  fn on_next(&mut self, value: P::Item) {
    self.shared.arbiter.produced(1);
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
    if let Some(actual) = self.actual.take() {
      self.shared.advance(self.index + 1, actual);
    }
  }
}

#[cfg(test)]
mod test {
  use std::time::Duration;

  use crate::prelude::*;

  #[rxflux_macro::test]
  fn sources_run_back_to_back() {
    let abc = flux::just(["a", "b", "c"]);
    let def = flux::just(["d", "e", "f"]);
    StepVerifier::create(flux::concat([abc, def]))
      .expect_next_seq(["a", "b", "c"])
      .expect_next_seq(["d", "e", "f"])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn unserved_demand_carries_over() {
    let source = flux::range(1, 2).concat_with(flux::range(3, 3));
    StepVerifier::create_with_initial_request(source, 3)
      .expect_next_seq([1, 2, 3])
      .expect_no_event(Duration::from_millis(20))
      .then_request(2)
      .expect_next_seq([4, 5])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn later_sources_wait_for_earlier_ones() {
    let source = || {
      flux::just([1, 2])
        .delay_elements(Duration::from_secs(1))
        .concat_with(flux::just([3]))
    };
    StepVerifier::with_virtual_time(source)
      .expect_subscription()
      .expect_no_event(Duration::from_secs(1))
      .expect_next(1)
      .expect_no_event(Duration::from_secs(1))
      .expect_next_seq([2, 3])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn many_synchronous_sources_do_not_nest() {
    let count = 10_000;
    let values = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
    let completed = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let c_values = values.clone();
    let c_completed = completed.clone();
    flux::concat((0..count).map(|i| flux::just([i]))).subscribe_all(
      move |v| c_values.lock().unwrap().push(v),
      |_| {},
      move || c_completed.store(true, std::sync::atomic::Ordering::SeqCst),
    );
    assert!(completed.load(std::sync::atomic::Ordering::SeqCst));
    assert_eq!(*values.lock().unwrap(), (0..count).collect::<Vec<_>>());
  }

  #[rxflux_macro::test]
  fn cancel_stops_before_the_next_source() {
    let values = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
    let c_values = values.clone();
    let disposable = flux::just([1])
      .concat_with(flux::never())
      .concat_with(flux::just([2]))
      .subscribe(move |v| c_values.lock().unwrap().push(v));
    disposable.dispose();
    assert_eq!(*values.lock().unwrap(), vec![1]);
  }

  #[rxflux_macro::test]
  fn error_stops_the_chain() {
    let source = flux::just([1])
      .concat_with(flux::error(Error::message("stop")))
      .concat_with(flux::just([2]));
    StepVerifier::create(source).expect_next(1).verify_error().unwrap();
  }
}
