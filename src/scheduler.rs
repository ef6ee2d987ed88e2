//! Clocks and timed task execution.
//!
//! Time-based publishers (`interval`, `delay_elements`) never block the
//! caller: they schedule a [`Task`] and keep the returned [`TaskHandle`] so
//! cancellation can remove it before it runs.
//!
//! Operators without an explicit scheduler use [`default_scheduler`], resolved
//! when they are subscribed. That is the process-wide [`TimerScheduler`]
//! unless the current thread installed an override with
//! [`set_thread_default`]; the step verifier does so to run under virtual
//! time.

use std::{cell::RefCell, sync::Arc, time::Duration};

use once_cell::sync::Lazy;

mod task;
mod timer;
mod virtual_time;

pub use task::{Task, TaskHandle};
pub use timer::TimerScheduler;
pub use virtual_time::VirtualTimeScheduler;

pub trait Scheduler: Send + Sync {
  /// Time elapsed on this scheduler's clock.
  fn now(&self) -> Duration;

  /// Runs `task` once `delay` has elapsed on this scheduler's clock.
  fn schedule(&self, delay: Duration, task: Task) -> TaskHandle;
}

pub type SchedulerRef = Arc<dyn Scheduler>;

static GLOBAL_TIMER: Lazy<SchedulerRef> = Lazy::new(|| {
  tracing::debug!("starting the global timer scheduler");
  Arc::new(TimerScheduler::new())
});

thread_local! {
  static THREAD_DEFAULT: RefCell<Option<SchedulerRef>> = const { RefCell::new(None) };
}

/// The scheduler used by operators subscribed on this thread without an
/// explicit one.
pub fn default_scheduler() -> SchedulerRef {
  THREAD_DEFAULT
    .with(|slot| slot.borrow().clone())
    .unwrap_or_else(|| GLOBAL_TIMER.clone())
}

/// Makes `scheduler` the default on this thread until the guard is dropped.
#[must_use = "the override is removed when the guard is dropped"]
pub fn set_thread_default(scheduler: SchedulerRef) -> DefaultGuard {
  let previous = THREAD_DEFAULT.with(|slot| slot.borrow_mut().replace(scheduler));
  DefaultGuard { previous }
}

/// Restores the previous thread default on drop.
pub struct DefaultGuard {
  previous: Option<SchedulerRef>,
}

impl Drop for DefaultGuard {
  fn drop(&mut self) {
    let previous = self.previous.take();
    THREAD_DEFAULT.with(|slot| *slot.borrow_mut() = previous);
  }
}
