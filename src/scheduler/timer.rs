use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use super::{
  task::{Task, TaskHandle, TaskQueue},
  Scheduler,
};
use crate::error;

/// Real-time scheduler: one timer thread waits for deadlines and hands due
/// tasks to a worker pool.
///
/// With the `futures-scheduler` feature (on by default) tasks run on a
/// `futures` thread pool; without it they run on the timer thread itself.
/// Dropping the last clone stops the timer thread and discards pending tasks.
#[derive(Clone)]
pub struct TimerScheduler {
  core: Arc<TimerCore>,
}

struct TimerCore {
  started: Instant,
  queue: Arc<TaskQueue>,
}

impl Drop for TimerCore {
  fn drop(&mut self) { self.queue.shutdown() }
}

impl Default for TimerScheduler {
  fn default() -> Self { Self::new() }
}

impl TimerScheduler {
  pub fn new() -> Self {
    let core = Arc::new(TimerCore { started: Instant::now(), queue: TaskQueue::new() });
    spawn_timer_thread(core.started, core.queue.clone());
    Self { core }
  }
}

impl Scheduler for TimerScheduler {
  fn now(&self) -> Duration { self.core.started.elapsed() }

  fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
    self.core.queue.insert(self.now().saturating_add(delay), task)
  }
}

fn spawn_timer_thread(started: Instant, queue: Arc<TaskQueue>) {
  let worker = Worker::new();
  let spawned = std::thread::Builder::new().name("rxflux-timer".into()).spawn(move || {
    tracing::debug!("timer thread started");
    while let Some(task) = queue.wait_due(|| started.elapsed()) {
      worker.run(task);
    }
    tracing::debug!("timer thread stopped");
  });
  if let Err(err) = spawned {
    tracing::error!(error = %err, "could not start the timer thread, timed tasks will not run");
  }
}

fn run_guarded(task: Task) {
  if let Err(err) = error::catch(task) {
    tracing::error!(error = %err, "scheduled task panicked");
  }
}

#[cfg(feature = "futures-scheduler")]
struct Worker(Option<futures::executor::ThreadPool>);

#[cfg(feature = "futures-scheduler")]
impl Worker {
  fn new() -> Self {
    match futures::executor::ThreadPool::builder().name_prefix("rxflux-worker-").create() {
      Ok(pool) => Worker(Some(pool)),
      Err(err) => {
        tracing::warn!(error = %err, "no worker pool, running timed tasks on the timer thread");
        Worker(None)
      }
    }
  }

  fn run(&self, task: Task) {
    match &self.0 {
      Some(pool) => pool.spawn_ok(async move { run_guarded(task) }),
      None => run_guarded(task),
    }
  }
}

#[cfg(not(feature = "futures-scheduler"))]
struct Worker;

#[cfg(not(feature = "futures-scheduler"))]
impl Worker {
  fn new() -> Self { Worker }

  fn run(&self, task: Task) { run_guarded(task) }
}

#[cfg(test)]
mod test {
  use std::sync::mpsc;

  use super::*;

  #[rxflux_macro::test]
  fn runs_tasks_after_their_delay() {
    let scheduler = TimerScheduler::new();
    let (tx, rx) = mpsc::channel();
    let started = Instant::now();
    scheduler.schedule(Duration::from_millis(30), Box::new(move || tx.send(Instant::now()).unwrap()));
    let fired = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(fired - started >= Duration::from_millis(30));
  }

  #[rxflux_macro::test]
  fn earlier_deadlines_run_first() {
    let scheduler = TimerScheduler::new();
    let (tx, rx) = mpsc::channel();
    let c_tx = tx.clone();
    scheduler.schedule(Duration::from_millis(80), Box::new(move || c_tx.send("late").unwrap()));
    scheduler.schedule(Duration::from_millis(10), Box::new(move || tx.send("early").unwrap()));
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "early");
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "late");
  }

  #[rxflux_macro::test]
  fn cancelled_tasks_do_not_run() {
    let scheduler = TimerScheduler::new();
    let (tx, rx) = mpsc::channel::<()>();
    let handle = scheduler.schedule(Duration::from_millis(30), Box::new(move || tx.send(()).unwrap()));
    assert!(handle.cancel());
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
  }
}
