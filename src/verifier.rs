//! Scripted verification of a publisher's signals.
//!
//! A [`StepVerifier`] is built from a publisher and a list of expectations,
//! then [`verify`](StepVerifier::verify) subscribes and checks the signals
//! one step at a time. In real time every wait is bounded by a timeout; in
//! virtual time the verifier drives a [`VirtualTimeScheduler`] itself, so
//! time-based publishers are checked without waiting.
//!
//! ```rust
//! use rxflux::prelude::*;
//! use std::time::Duration;
//!
//! StepVerifier::with_virtual_time(|| flux::just([1, 2]).delay_elements(Duration::from_secs(1)))
//!   .expect_subscription()
//!   .expect_no_event(Duration::from_secs(1))
//!   .expect_next(1)
//!   .then_await(Duration::from_secs(1))
//!   .expect_next(2)
//!   .verify_complete()
//!   .unwrap();
//! ```

use std::{
  collections::VecDeque,
  error::Error as StdError,
  fmt::Debug,
  sync::{Arc, Condvar, Mutex},
  time::{Duration, Instant},
};

use crate::{
  error::{Error, ErrorKind},
  publisher::Publisher,
  rc::lock,
  scheduler::{set_thread_default, Scheduler, VirtualTimeScheduler},
  signal::Signal,
  subscriber::Subscriber,
  subscription::{SubscriptionRef, UNBOUNDED},
};

/// How long a real-time step waits for a signal by default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a verification failed. `step` counts expectations from zero.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
  #[error("step {step}: expected {expected}, got {actual}")]
  Mismatch { step: usize, expected: String, actual: String },
  #[error("step {step}: no {expected} within {timeout:?}")]
  Timeout { step: usize, expected: String, timeout: Duration },
  #[error("step {step}: expected {expected}, but no scheduled task is left to produce it")]
  Stalled { step: usize, expected: String },
  #[error("step {step}: expected no event for {window:?}, got {actual}")]
  UnexpectedEvent { step: usize, window: Duration, actual: String },
  #[error("step {step}: the publisher never called on_subscribe")]
  NoSubscription { step: usize },
}

type ItemCheck<T> = Box<dyn Fn(&T) -> bool>;
type ErrorCheck = Box<dyn Fn(&Error) -> bool>;

enum Step<T> {
  Subscription,
  Next { expected: String, check: ItemCheck<T> },
  NextCount(usize),
  NoEvent(Duration),
  Request(u64),
  Await(Duration),
  Complete,
  Error { expected: String, check: ErrorCheck },
  Cancel,
}

enum Clock {
  Real { timeout: Duration },
  Virtual(VirtualTimeScheduler),
}

/// A script of expectations about one subscription to a publisher.
pub struct StepVerifier<P: Publisher> {
  publisher: P,
  initial_request: u64,
  clock: Clock,
  steps: Vec<Step<P::Item>>,
}

impl<P> StepVerifier<P>
where
  P: Publisher,
  P::Item: Debug,
{
  /// Verifies `publisher` in real time, requesting [`UNBOUNDED`] on
  /// subscribe.
  pub fn create(publisher: P) -> Self { Self::create_with_initial_request(publisher, UNBOUNDED) }

  /// Like [`create`](Self::create), requesting `n` on subscribe. Zero
  /// requests nothing; use [`then_request`](Self::then_request) later.
  pub fn create_with_initial_request(publisher: P, n: u64) -> Self {
    Self { publisher, initial_request: n, clock: Clock::Real { timeout: DEFAULT_TIMEOUT }, steps: vec![] }
  }

  /// Verifies the publisher `supplier` builds in virtual time.
  ///
  /// A fresh [`VirtualTimeScheduler`] is the thread's default scheduler while
  /// `supplier` runs and for the whole of [`verify`](Self::verify), so
  /// time-based operators that use the default scheduler run on it.
  pub fn with_virtual_time<F>(supplier: F) -> Self
  where
    F: FnOnce() -> P,
  {
    Self::with_virtual_time_and_request(supplier, UNBOUNDED)
  }

  pub fn with_virtual_time_and_request<F>(supplier: F, n: u64) -> Self
  where
    F: FnOnce() -> P,
  {
    let scheduler = VirtualTimeScheduler::new();
    let publisher = {
      let _default = set_thread_default(Arc::new(scheduler.clone()));
      supplier()
    };
    Self { publisher, initial_request: n, clock: Clock::Virtual(scheduler), steps: vec![] }
  }

  /// Bounds every real-time wait; ignored in virtual time.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    if let Clock::Real { timeout: current } = &mut self.clock {
      *current = timeout;
    }
    self
  }

  fn step(mut self, step: Step<P::Item>) -> Self {
    self.steps.push(step);
    self
  }

  pub fn expect_subscription(self) -> Self { self.step(Step::Subscription) }

  pub fn expect_next(self, value: P::Item) -> Self
  where
    P::Item: PartialEq + 'static,
  {
    let expected = format!("onNext({value:?})");
    self.step(Step::Next { expected, check: Box::new(move |v| *v == value) })
  }

  /// One [`expect_next`](Self::expect_next) per value, in order.
  pub fn expect_next_seq(self, values: impl IntoIterator<Item = P::Item>) -> Self
  where
    P::Item: PartialEq + 'static,
  {
    values.into_iter().fold(self, |verifier, value| verifier.expect_next(value))
  }

  /// Expects `count` items, whatever their values.
  pub fn expect_next_count(self, count: usize) -> Self { self.step(Step::NextCount(count)) }

  pub fn expect_next_matches<F>(self, predicate: F) -> Self
  where
    F: Fn(&P::Item) -> bool + 'static,
  {
    self.step(Step::Next { expected: "onNext matching the predicate".into(), check: Box::new(predicate) })
  }

  /// Expects no signal during `window`. In virtual time a signal due exactly
  /// when the window ends is allowed.
  pub fn expect_no_event(self, window: Duration) -> Self { self.step(Step::NoEvent(window)) }

  pub fn then_request(self, n: u64) -> Self { self.step(Step::Request(n)) }

  /// Lets `duration` pass: advances the virtual clock, or sleeps in real
  /// time.
  pub fn then_await(self, duration: Duration) -> Self { self.step(Step::Await(duration)) }

  pub fn expect_complete(self) -> Self { self.step(Step::Complete) }

  pub fn expect_error(self) -> Self {
    self.step(Step::Error { expected: "onError".into(), check: Box::new(|_| true) })
  }

  pub fn expect_error_kind(self, kind: ErrorKind) -> Self {
    let expected = format!("onError of kind {kind:?}");
    self.step(Step::Error { expected, check: Box::new(move |e| e.kind() == kind) })
  }

  /// Expects an error whose cause is an `E`.
  pub fn expect_error_of<E: StdError + 'static>(self) -> Self {
    let expected = format!("onError caused by {}", std::any::type_name::<E>());
    self.step(Step::Error { expected, check: Box::new(|e| e.is::<E>()) })
  }

  pub fn expect_error_matches<F>(self, predicate: F) -> Self
  where
    F: Fn(&Error) -> bool + 'static,
  {
    self.step(Step::Error { expected: "onError matching the predicate".into(), check: Box::new(predicate) })
  }

  /// Cancels the subscription.
  pub fn then_cancel(self) -> Self { self.step(Step::Cancel) }

  /// Subscribes and checks every step in order. Returns how long the
  /// verification took in real time.
  pub fn verify(self) -> Result<Duration, VerifyError> {
    let started = Instant::now();
    let _default = match &self.clock {
      Clock::Virtual(scheduler) => Some(set_thread_default(Arc::new(scheduler.clone()))),
      Clock::Real { .. } => None,
    };
    let record = Arc::new(Record::default());
    self
      .publisher
      .subscribe_with(Recorder { record: record.clone(), initial_request: self.initial_request });
    let run = Run { record, clock: &self.clock };
    let outcome = self.steps.into_iter().enumerate().try_for_each(|(index, step)| run.check(index, step));
    run.cancel();
    match &outcome {
      Ok(()) => tracing::debug!(elapsed = ?started.elapsed(), "verification passed"),
      Err(err) => tracing::debug!(error = %err, "verification failed"),
    }
    outcome.map(|()| started.elapsed())
  }

  /// Expects completion, then verifies.
  pub fn verify_complete(self) -> Result<Duration, VerifyError> { self.expect_complete().verify() }

  /// Expects any error, then verifies.
  pub fn verify_error(self) -> Result<Duration, VerifyError> { self.expect_error().verify() }
}

fn describe<T: Debug>(signal: &Signal<T>) -> String {
  match signal {
    Signal::Next(v) => format!("onNext({v:?})"),
    Signal::Error(e) => format!("onError({e})"),
    Signal::Complete => "onComplete()".into(),
  }
}

struct RecordState<T> {
  subscription: Option<SubscriptionRef>,
  signals: VecDeque<Signal<T>>,
}

struct Record<T> {
  state: Mutex<RecordState<T>>,
  arrived: Condvar,
}

impl<T> Default for Record<T> {
  fn default() -> Self {
    Self {
      state: Mutex::new(RecordState { subscription: None, signals: VecDeque::new() }),
      arrived: Condvar::new(),
    }
  }
}

impl<T> Record<T> {
  fn push(&self, signal: Signal<T>) {
    lock(&self.state).signals.push_back(signal);
    self.arrived.notify_all();
  }

  fn subscription(&self) -> Option<SubscriptionRef> { lock(&self.state).subscription.clone() }
}

struct Recorder<T> {
  record: Arc<Record<T>>,
  initial_request: u64,
}

impl<T: Send> Subscriber<T> for Recorder<T> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    lock(&self.record.state).subscription = Some(subscription.clone());
    self.record.arrived.notify_all();
    if self.initial_request > 0 {
      subscription.request(self.initial_request);
    }
  }

  fn on_next(&mut self, value: T) { self.record.push(Signal::Next(value)) }

  fn on_error(&mut self, err: Error) { self.record.push(Signal::Error(err)) }

  fn on_complete(&mut self) { self.record.push(Signal::Complete) }
}

/// A verification in progress.
struct Run<'a, T> {
  record: Arc<Record<T>>,
  clock: &'a Clock,
}

impl<T: Debug> Run<'_, T> {
  fn check(&self, index: usize, step: Step<T>) -> Result<(), VerifyError> {
    match step {
      Step::Subscription => self
        .wait(index, "onSubscribe", |state| state.subscription.as_ref().map(|_| ()))
        .map_err(|_| VerifyError::NoSubscription { step: index }),
      Step::Next { expected, check } => match self.next_signal(index, &expected)? {
        Signal::Next(v) if check(&v) => Ok(()),
        other => Err(VerifyError::Mismatch { step: index, expected, actual: describe(&other) }),
      },
      Step::NextCount(count) => {
        for seen in 0..count {
          let expected = format!("onNext #{} of {count}", seen + 1);
          match self.next_signal(index, &expected)? {
            Signal::Next(_) => {}
            other => return Err(VerifyError::Mismatch { step: index, expected, actual: describe(&other) }),
          }
        }
        Ok(())
      }
      Step::NoEvent(window) => self.quiet_for(index, window),
      Step::Request(n) => {
        self.current_subscription(index)?.request(n);
        Ok(())
      }
      Step::Await(duration) => {
        match self.clock {
          Clock::Real { .. } => std::thread::sleep(duration),
          Clock::Virtual(scheduler) => scheduler.advance_by(duration),
        }
        Ok(())
      }
      Step::Complete => match self.next_signal(index, "onComplete()")? {
        Signal::Complete => Ok(()),
        other => Err(VerifyError::Mismatch { step: index, expected: "onComplete()".into(), actual: describe(&other) }),
      },
      Step::Error { expected, check } => match self.next_signal(index, &expected)? {
        Signal::Error(e) if check(&e) => Ok(()),
        other => Err(VerifyError::Mismatch { step: index, expected, actual: describe(&other) }),
      },
      Step::Cancel => {
        self.current_subscription(index)?.cancel();
        Ok(())
      }
    }
  }

  fn current_subscription(&self, index: usize) -> Result<SubscriptionRef, VerifyError> {
    self.record.subscription().ok_or(VerifyError::NoSubscription { step: index })
  }

  fn next_signal(&self, index: usize, expected: &str) -> Result<Signal<T>, VerifyError> {
    self.wait(index, expected, |state| state.signals.pop_front())
  }

  /// Polls the record until `poll` yields something. Real time waits for new
  /// signals up to the timeout; virtual time runs the next scheduled tasks.
  fn wait<R>(
    &self,
    index: usize,
    expected: &str,
    mut poll: impl FnMut(&mut RecordState<T>) -> Option<R>,
  ) -> Result<R, VerifyError> {
    match self.clock {
      Clock::Real { timeout } => {
        let deadline = Instant::now() + *timeout;
        let mut state = lock(&self.record.state);
        loop {
          if let Some(found) = poll(&mut *state) {
            return Ok(found);
          }
          let now = Instant::now();
          if now >= deadline {
            return Err(VerifyError::Timeout { step: index, expected: expected.into(), timeout: *timeout });
          }
          state = match self.record.arrived.wait_timeout(state, deadline - now) {
            Ok((state, _)) => state,
            Err(poisoned) => poisoned.into_inner().0,
          };
        }
      }
      Clock::Virtual(scheduler) => loop {
        if let Some(found) = poll(&mut *lock(&self.record.state)) {
          return Ok(found);
        }
        if !scheduler.advance_to_next() {
          return Err(VerifyError::Stalled { step: index, expected: expected.into() });
        }
      },
    }
  }

  fn quiet_for(&self, index: usize, window: Duration) -> Result<(), VerifyError> {
    let unexpected = |signal: &Signal<T>| VerifyError::UnexpectedEvent { step: index, window, actual: describe(signal) };
    match self.clock {
      Clock::Real { .. } => {
        let deadline = Instant::now() + window;
        let mut state = lock(&self.record.state);
        loop {
          if let Some(signal) = state.signals.front() {
            return Err(unexpected(signal));
          }
          let now = Instant::now();
          if now >= deadline {
            return Ok(());
          }
          state = match self.record.arrived.wait_timeout(state, deadline - now) {
            Ok((state, _)) => state,
            Err(poisoned) => poisoned.into_inner().0,
          };
        }
      }
      Clock::Virtual(scheduler) => {
        let end = scheduler.now() + window;
        loop {
          if let Some(signal) = lock(&self.record.state).signals.front() {
            return Err(unexpected(signal));
          }
          match scheduler.next_deadline() {
            Some(deadline) if deadline < end => {
              scheduler.advance_to_next();
            }
            _ => break,
          }
        }
        scheduler.advance_by(end.saturating_sub(scheduler.now()));
        Ok(())
      }
    }
  }

  /// Releases whatever the publisher still holds once the script is over.
  fn cancel(&self) {
    if let Some(subscription) = self.record.subscription() {
      subscription.cancel();
    }
  }
}
