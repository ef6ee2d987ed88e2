use std::{
  sync::{Arc, Mutex},
  time::Duration,
};

use crate::{
  error::Error,
  publisher::Publisher,
  rc::lock,
  scheduler::{default_scheduler, SchedulerRef, TaskHandle},
  signal::Signal,
  subscriber::Subscriber,
  subscription::{
    drain::{Drain, Emitter, QueueProducer},
    Subscription, SubscriptionRef,
  },
};

/// Creates a publisher that emits `0, 1, 2, …`, one number every `period`
/// on the default scheduler, starting one period after subscription.
///
/// A tick that finds no outstanding demand fails the sequence with
/// [`Error::Overflow`].
pub fn interval(period: Duration) -> Interval { Interval { period, scheduler: None } }

/// [`interval`] on an explicit scheduler.
pub fn interval_on(period: Duration, scheduler: SchedulerRef) -> Interval {
  Interval { period, scheduler: Some(scheduler) }
}

#[derive(Clone)]
pub struct Interval {
  period: Duration,
  scheduler: Option<SchedulerRef>,
}

impl Publisher for Interval {
  type Item = u64;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<u64> + 'static,
  {
    let scheduler = self.scheduler.clone().unwrap_or_else(default_scheduler);
    let drain: Arc<Drain<u64, QueueProducer<u64>, S>> = Drain::new(QueueProducer::new(1));
    let ticker = Arc::new(Ticker {
      emitter: drain.clone(),
      origin: scheduler.now(),
      period: self.period,
      scheduler,
      pending: Mutex::new(None),
    });
    drain.start_with(subscriber, Arc::new(IntervalHandle { drain: drain.clone(), ticker: ticker.clone() }));
    ticker.schedule(0);
  }
}

struct Ticker {
  emitter: Arc<dyn Emitter<u64>>,
  origin: Duration,
  period: Duration,
  scheduler: SchedulerRef,
  pending: Mutex<Option<TaskHandle>>,
}

impl Ticker {
  /// Schedules tick `n` at `origin + (n + 1) * period`, so ticks do not
  /// drift when a task runs late.
  fn schedule(self: &Arc<Self>, n: u64) {
    if self.emitter.is_cancelled() {
      return;
    }
    let ticks = u32::try_from(n.saturating_add(1)).unwrap_or(u32::MAX);
    let due = self.origin.saturating_add(self.period.saturating_mul(ticks));
    let ticker = self.clone();
    let handle = self
      .scheduler
      .schedule(due.saturating_sub(self.scheduler.now()), Box::new(move || ticker.tick(n)));
    *lock(&self.pending) = Some(handle);
    if self.emitter.is_cancelled() {
      self.stop();
    }
  }

  fn tick(self: &Arc<Self>, n: u64) {
    if self.emitter.is_cancelled() {
      return;
    }
    if self.emitter.requested() == 0 {
      tracing::debug!(tick = n, "interval tick without demand");
      self.emitter.emit(Signal::Error(Error::Overflow("interval tick")));
      return;
    }
    self.emitter.emit(Signal::Next(n));
    self.schedule(n + 1);
  }

  fn stop(&self) {
    if let Some(handle) = lock(&self.pending).take() {
      handle.cancel();
    }
  }
}

struct IntervalHandle {
  drain: SubscriptionRef,
  ticker: Arc<Ticker>,
}

impl Subscription for IntervalHandle {
  fn request(&self, n: u64) {
    self.drain.request(n);
    if self.ticker.emitter.is_cancelled() {
      self.ticker.stop();
    }
  }

  fn cancel(&self) {
    self.drain.cancel();
    self.ticker.stop();
  }
}

#[cfg(test)]
mod test {
  use std::{sync::Arc, time::Duration};

  use crate::prelude::*;

  #[rxflux_macro::test]
  fn ticks_once_per_period() {
    StepVerifier::with_virtual_time(|| flux::interval(Duration::from_secs(1)))
      .expect_subscription()
      .expect_no_event(Duration::from_secs(1))
      .expect_next(0)
      .then_await(Duration::from_secs(2))
      .expect_next_seq([1, 2])
      .then_cancel()
      .verify()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn tick_without_demand_overflows() {
    StepVerifier::with_virtual_time_and_request(|| flux::interval(Duration::from_secs(1)), 1)
      .then_await(Duration::from_secs(1))
      .expect_next(0)
      .then_await(Duration::from_secs(1))
      .expect_error_kind(ErrorKind::Overflow)
      .verify()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn longest_period_never_ticks() {
    let scheduler = VirtualTimeScheduler::new();
    scheduler.advance_by(Duration::from_secs(1));
    let ticks = Arc::new(std::sync::Mutex::new(vec![]));
    let c_ticks = ticks.clone();
    let handle = flux::interval_on(Duration::MAX, Arc::new(scheduler.clone()))
      .subscribe(move |v| c_ticks.lock().unwrap().push(v));
    scheduler.advance_by(Duration::MAX);
    assert!(ticks.lock().unwrap().is_empty());
    handle.dispose();
  }

  #[rxflux_macro::test]
  fn invalid_request_removes_the_pending_tick() {
    let scheduler = VirtualTimeScheduler::new();
    let upstream = Arc::new(std::sync::Mutex::new(None));
    let c_upstream = upstream.clone();
    flux::interval_on(Duration::from_secs(1), Arc::new(scheduler.clone())).subscribe_full(
      |_| {},
      |_| {},
      || {},
      move |subscription: &SubscriptionRef| *c_upstream.lock().unwrap() = Some(subscription.clone()),
    );
    assert_eq!(scheduler.pending_count(), 1);
    upstream.lock().unwrap().clone().unwrap().request(0);
    assert_eq!(scheduler.pending_count(), 0);
  }

  #[rxflux_macro::test]
  fn cancel_removes_the_pending_tick() {
    let scheduler = VirtualTimeScheduler::new();
    let handle = flux::interval_on(Duration::from_millis(10), Arc::new(scheduler.clone())).subscribe(|_| {});
    assert_eq!(scheduler.pending_count(), 1);
    scheduler.advance_by(Duration::from_millis(35));
    assert_eq!(scheduler.pending_count(), 1);
    handle.dispose();
    assert_eq!(scheduler.pending_count(), 0);
  }
}
