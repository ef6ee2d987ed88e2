use std::{
  sync::{Arc, Mutex},
  time::Duration,
};

use super::{
  task::{Task, TaskHandle, TaskQueue},
  Scheduler,
};
use crate::rc::lock;

/// A scheduler whose clock only moves when told to.
///
/// Tasks run on the thread that advances the clock, in deadline order; tasks
/// sharing a deadline run in the order they were scheduled. A task scheduled
/// while the clock is advancing runs in the same advance if it falls due
/// before the target time.
///
/// ```rust
/// use rxflux::prelude::*;
/// use std::{sync::{Arc, Mutex}, time::Duration};
///
/// let scheduler = VirtualTimeScheduler::new();
/// let ticks = Arc::new(Mutex::new(vec![]));
/// let c_ticks = ticks.clone();
/// flux::interval_on(Duration::from_secs(1), Arc::new(scheduler.clone()))
///   .take(3)
///   .subscribe(move |v| c_ticks.lock().unwrap().push(v));
///
/// scheduler.advance_by(Duration::from_secs(2));
/// assert_eq!(*ticks.lock().unwrap(), vec![0, 1]);
/// scheduler.advance_by(Duration::from_secs(10));
/// assert_eq!(*ticks.lock().unwrap(), vec![0, 1, 2]);
/// ```
#[derive(Clone)]
pub struct VirtualTimeScheduler {
  clock: Arc<Mutex<Duration>>,
  queue: Arc<TaskQueue>,
}

impl Default for VirtualTimeScheduler {
  fn default() -> Self { Self::new() }
}

impl VirtualTimeScheduler {
  pub fn new() -> Self { Self { clock: Arc::new(Mutex::new(Duration::ZERO)), queue: TaskQueue::new() } }

  /// Moves the clock forward by `by`, running every task that falls due.
  pub fn advance_by(&self, by: Duration) {
    let target = self.now().saturating_add(by);
    self.run_until(target);
    self.set_clock(target);
  }

  /// Jumps to the earliest pending deadline and runs the tasks due then.
  /// Returns `false` if nothing was pending.
  pub fn advance_to_next(&self) -> bool {
    match self.queue.next_deadline() {
      Some(deadline) => {
        let target = deadline.max(self.now());
        self.run_until(target);
        self.set_clock(target);
        true
      }
      None => false,
    }
  }

  /// Runs the tasks already due without moving the clock.
  pub fn flush(&self) { self.run_until(self.now()) }

  pub fn pending_count(&self) -> usize { self.queue.len() }

  pub(crate) fn next_deadline(&self) -> Option<Duration> { self.queue.next_deadline() }

  fn run_until(&self, target: Duration) {
    while let Some((deadline, task)) = self.queue.pop_due(target) {
      self.set_clock(deadline.max(self.now()));
      tracing::trace!(at = ?deadline, "running virtual task");
      task();
    }
  }

  fn set_clock(&self, at: Duration) { *lock(&self.clock) = at; }
}

impl Scheduler for VirtualTimeScheduler {
  fn now(&self) -> Duration { *lock(&self.clock) }

  fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
    self.queue.insert(self.now().saturating_add(delay), task)
  }
}
