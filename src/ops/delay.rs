use std::{
  sync::{Arc, Mutex},
  time::Duration,
};

use crate::{
  error::Error,
  publisher::Publisher,
  rc::lock,
  scheduler::{default_scheduler, SchedulerRef, TaskHandle},
  subscriber::Subscriber,
  subscription::{
    drain::{Drain, QueueProducer},
    Subscription, SubscriptionRef,
  },
};

/// Shifts every item forward in time by `delay`.
///
/// One item is in flight at a time: the next one is requested from upstream
/// only after the previous one has been delivered and the downstream still
/// has demand. Terminal signals wait for the item in flight.
pub struct DelayElementsOp<P> {
  source: P,
  delay: Duration,
  scheduler: Option<SchedulerRef>,
}

impl<P> DelayElementsOp<P> {
  pub(crate) fn new(source: P, delay: Duration, scheduler: Option<SchedulerRef>) -> Self {
    Self { source, delay, scheduler }
  }
}

impl<P: Publisher> Publisher for DelayElementsOp<P> {
  type Item = P::Item;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item> + 'static,
  {
    let scheduler = self.scheduler.clone().unwrap_or_else(default_scheduler);
    let core = Arc::new(DelayCore {
      drain: Drain::new(QueueProducer::new(1)),
      state: Mutex::new(DelayState { phase: Phase::Idle, upstream: None, terminal: None }),
      delay: self.delay,
      scheduler,
    });
    core.drain.start_with(subscriber, Arc::new(DelayHandle(core.clone())));
    if !core.drain.is_cancelled() {
      self.source.subscribe_with(DelaySubscriber(core));
    }
  }
}

enum Phase {
  /// Nothing requested from upstream.
  Idle,
  /// One item requested, not yet received.
  Awaiting,
  /// The received item waits for its timer.
  Scheduled(Option<TaskHandle>),
  Done,
}

struct DelayState {
  phase: Phase,
  upstream: Option<SubscriptionRef>,
  /// Upstream terminal signal held back until the item in flight is out.
  terminal: Option<Result<(), Error>>,
}

struct DelayCore<T, S> {
  drain: Arc<Drain<T, QueueProducer<T>, S>>,
  state: Mutex<DelayState>,
  delay: Duration,
  scheduler: SchedulerRef,
}

impl<T, S> DelayCore<T, S>
where
  T: Send + 'static,
  S: Subscriber<T> + 'static,
{
  /// Asks upstream for one item if nothing is in flight and the downstream
  /// has demand. Releases the timer once the drain has terminated on its own.
  fn pump(&self) {
    if self.drain.is_cancelled() {
      self.stop();
      return;
    }
    let upstream = {
      let mut state = lock(&self.state);
      if !matches!(state.phase, Phase::Idle) || self.drain.requested() == 0 {
        return;
      }
      let Some(upstream) = state.upstream.clone() else { return };
      state.phase = Phase::Awaiting;
      upstream
    };
    upstream.request(1);
  }

  fn schedule(self: &Arc<Self>, value: T) {
    let mut state = lock(&self.state);
    if !matches!(state.phase, Phase::Awaiting) {
      tracing::warn!("delay_elements received an item it did not request, dropping it");
      return;
    }
    // Held across `schedule` so a zero delay cannot fire before the phase is set.
    state.phase = Phase::Scheduled(None);
    let core = self.clone();
    let handle = self.scheduler.schedule(self.delay, Box::new(move || core.fire(value)));
    state.phase = Phase::Scheduled(Some(handle));
  }

  fn fire(&self, value: T) {
    let terminal = {
      let mut state = lock(&self.state);
      if !matches!(state.phase, Phase::Scheduled(_)) {
        return;
      }
      let terminal = state.terminal.take();
      state.phase = if terminal.is_some() { Phase::Done } else { Phase::Idle };
      terminal
    };
    self.drain.feed(|queue| queue.push(value));
    match terminal {
      Some(result) => self.drain.feed(|queue| queue.finish(result)),
      None => self.pump(),
    }
  }

  fn terminate(&self, result: Result<(), Error>) {
    let result = {
      let mut state = lock(&self.state);
      match state.phase {
        Phase::Scheduled(_) => {
          state.terminal = Some(result);
          return;
        }
        _ => state.phase = Phase::Done,
      }
      result
    };
    self.drain.feed(|queue| queue.finish(result));
  }

  fn stop(&self) {
    let phase = std::mem::replace(&mut lock(&self.state).phase, Phase::Done);
    if let Phase::Scheduled(Some(handle)) = phase {
      handle.cancel();
    }
  }
}

/// The downstream's subscription: demand goes to the drain, then may pull
/// the next upstream item.
struct DelayHandle<T, S>(Arc<DelayCore<T, S>>);

impl<T, S> Subscription for DelayHandle<T, S>
where
  T: Send + 'static,
  S: Subscriber<T> + 'static,
{
  fn request(&self, n: u64) {
    self.0.drain.request(n);
    self.0.pump();
  }

  fn cancel(&self) {
    self.0.drain.cancel();
    self.0.stop();
  }
}

struct DelaySubscriber<T, S>(Arc<DelayCore<T, S>>);

impl<T, S> Subscriber<T> for DelaySubscriber<T, S>
where
  T: Send + 'static,
  S: Subscriber<T> + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.0.drain.link(subscription.clone());
    lock(&self.0.state).upstream = Some(subscription);
    self.0.pump();
  }

  fn on_next(&mut self, value: T) { self.0.schedule(value) }

  fn on_error(&mut self, err: Error) { self.0.terminate(Err(err)) }

  fn on_complete(&mut self) { self.0.terminate(Ok(())) }
}

#[cfg(test)]
mod test {
  use std::{sync::Arc, time::Duration};

  use crate::prelude::*;

  #[rxflux_macro::test]
  fn items_are_spaced_by_the_delay() {
    StepVerifier::with_virtual_time(|| flux::range(1, 3).delay_elements(Duration::from_secs(1)))
      .expect_subscription()
      .expect_no_event(Duration::from_secs(1))
      .expect_next(1)
      .expect_no_event(Duration::from_secs(1))
      .expect_next(2)
      .expect_no_event(Duration::from_secs(1))
      .expect_next(3)
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn pulls_one_item_at_a_time() {
    let scheduler = VirtualTimeScheduler::new();
    let requests = Arc::new(std::sync::Mutex::new(vec![]));
    let c_requests = requests.clone();
    let seen = Arc::new(std::sync::Mutex::new(vec![]));
    let c_seen = seen.clone();
    flux::range(1, 3)
      .do_on_request(move |n| c_requests.lock().unwrap().push(n))
      .delay_elements_on(Duration::from_millis(100), Arc::new(scheduler.clone()))
      .subscribe(move |v| c_seen.lock().unwrap().push(v));
    assert_eq!(*requests.lock().unwrap(), vec![1]);
    scheduler.advance_by(Duration::from_millis(250));
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert_eq!(*requests.lock().unwrap(), vec![1, 1, 1]);
  }

  #[rxflux_macro::test]
  fn cancel_drops_the_scheduled_item() {
    let scheduler = VirtualTimeScheduler::new();
    let seen = Arc::new(std::sync::Mutex::new(vec![]));
    let c_seen = seen.clone();
    let handle = flux::just([1, 2])
      .delay_elements_on(Duration::from_secs(1), Arc::new(scheduler.clone()))
      .subscribe(move |v| c_seen.lock().unwrap().push(v));
    assert_eq!(scheduler.pending_count(), 1);
    handle.dispose();
    assert_eq!(scheduler.pending_count(), 0);
    scheduler.advance_by(Duration::from_secs(5));
    assert!(seen.lock().unwrap().is_empty());
  }

  #[rxflux_macro::test]
  fn waits_for_downstream_demand() {
    StepVerifier::with_virtual_time_and_request(|| flux::range(1, 2).delay_elements(Duration::from_secs(1)), 1)
      .expect_subscription()
      .then_await(Duration::from_secs(1))
      .expect_next(1)
      .expect_no_event(Duration::from_secs(5))
      .then_request(1)
      .expect_no_event(Duration::from_secs(1))
      .expect_next(2)
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn errors_wait_for_the_item_in_flight() {
    let source = || flux::just([1]).concat_with(flux::error(Error::message("late"))).delay_elements(Duration::from_secs(1));
    StepVerifier::with_virtual_time(source)
      .expect_subscription()
      .expect_no_event(Duration::from_secs(1))
      .expect_next(1)
      .verify_error()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn longest_delay_never_fires() {
    let scheduler = VirtualTimeScheduler::new();
    scheduler.advance_by(Duration::from_secs(1));
    let seen = Arc::new(std::sync::Mutex::new(vec![]));
    let c_seen = seen.clone();
    let handle = flux::just([1])
      .delay_elements_on(Duration::MAX, Arc::new(scheduler.clone()))
      .subscribe(move |v| c_seen.lock().unwrap().push(v));
    scheduler.advance_by(Duration::MAX);
    assert!(seen.lock().unwrap().is_empty());
    handle.dispose();
  }

  #[rxflux_macro::test]
  fn invalid_request_releases_the_timer() {
    let scheduler = VirtualTimeScheduler::new();
    let upstream = Arc::new(std::sync::Mutex::new(None));
    let c_upstream = upstream.clone();
    let errors = Arc::new(std::sync::Mutex::new(vec![]));
    let c_errors = errors.clone();
    flux::just([1, 2])
      .delay_elements_on(Duration::from_secs(1), Arc::new(scheduler.clone()))
      .subscribe_full(
        |_| {},
        move |err: Error| c_errors.lock().unwrap().push(err.kind()),
        || {},
        move |subscription: &SubscriptionRef| *c_upstream.lock().unwrap() = Some(subscription.clone()),
      );
    let subscription = upstream.lock().unwrap().clone().unwrap();
    subscription.request(1);
    assert_eq!(scheduler.pending_count(), 1);
    subscription.request(0);
    assert_eq!(*errors.lock().unwrap(), vec![ErrorKind::InvalidRequest]);
    assert_eq!(scheduler.pending_count(), 0);
  }

  #[rxflux_macro::test]
  fn runs_on_the_real_timer() {
    let elapsed = StepVerifier::create(flux::just(["a", "b"]).delay_elements(Duration::from_millis(20)))
      .expect_next_seq(["a", "b"])
      .verify_complete()
      .unwrap();
    assert!(elapsed >= Duration::from_millis(40));
  }
}
