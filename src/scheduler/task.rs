use std::{
  collections::BTreeMap,
  sync::{Arc, Condvar, Mutex, PoisonError, Weak},
  time::Duration,
};

use crate::rc::lock;

/// Work handed to a [`Scheduler`](super::Scheduler).
pub type Task = Box<dyn FnOnce() + Send>;

/// Deadline on the scheduler's clock, then insertion order.
type TaskKey = (Duration, u64);

/// Deadline-ordered pending tasks of one scheduler.
pub(crate) struct TaskQueue {
  state: Mutex<QueueState>,
  wakeup: Condvar,
}

#[derive(Default)]
struct QueueState {
  seq: u64,
  tasks: BTreeMap<TaskKey, Task>,
  shutdown: bool,
}

impl TaskQueue {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Self { state: Mutex::new(QueueState::default()), wakeup: Condvar::new() })
  }

  /// Queues `task` for `deadline`. A deadline of `Duration::MAX` is where
  /// saturated deadlines end up; such a task is dropped and never runs.
  pub(crate) fn insert(self: &Arc<Self>, deadline: Duration, task: Task) -> TaskHandle {
    let key = {
      let mut state = lock(&self.state);
      let key = (deadline, state.seq);
      state.seq += 1;
      if deadline == Duration::MAX {
        return TaskHandle { queue: Arc::downgrade(self), key };
      }
      state.tasks.insert(key, task);
      key
    };
    self.wakeup.notify_one();
    TaskHandle { queue: Arc::downgrade(self), key }
  }

  fn remove(&self, key: &TaskKey) -> bool { lock(&self.state).tasks.remove(key).is_some() }

  fn contains(&self, key: &TaskKey) -> bool { lock(&self.state).tasks.contains_key(key) }

  /// Removes and returns the earliest task due at or before `now`.
  pub(crate) fn pop_due(&self, now: Duration) -> Option<(Duration, Task)> {
    let mut state = lock(&self.state);
    match state.tasks.first_key_value() {
      Some(((deadline, _), _)) if *deadline <= now => {
        state.tasks.pop_first().map(|((deadline, _), task)| (deadline, task))
      }
      _ => None,
    }
  }

  pub(crate) fn next_deadline(&self) -> Option<Duration> {
    lock(&self.state).tasks.first_key_value().map(|((deadline, _), _)| *deadline)
  }

  pub(crate) fn len(&self) -> usize { lock(&self.state).tasks.len() }

  /// Blocks until a task is due on `clock`, or returns `None` after
  /// [`shutdown`](Self::shutdown).
  pub(crate) fn wait_due(&self, clock: impl Fn() -> Duration) -> Option<Task> {
    let mut state = lock(&self.state);
    loop {
      if state.shutdown {
        return None;
      }
      let now = clock();
      state = match state.tasks.first_key_value() {
        None => self.wakeup.wait(state).unwrap_or_else(PoisonError::into_inner),
        Some(((deadline, _), _)) if *deadline <= now => {
          return state.tasks.pop_first().map(|(_, task)| task);
        }
        Some(((deadline, _), _)) => {
          let timeout = *deadline - now;
          match self.wakeup.wait_timeout(state, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
          }
        }
      };
    }
  }

  /// Drops every pending task and releases [`wait_due`](Self::wait_due).
  pub(crate) fn shutdown(&self) {
    let tasks = {
      let mut state = lock(&self.state);
      state.shutdown = true;
      std::mem::take(&mut state.tasks)
    };
    self.wakeup.notify_all();
    drop(tasks);
  }
}

/// Cancels one scheduled task.
#[derive(Clone)]
pub struct TaskHandle {
  queue: Weak<TaskQueue>,
  key: TaskKey,
}

impl TaskHandle {
  /// Removes the task if it has not started yet. Returns `true` if it was
  /// removed.
  pub fn cancel(&self) -> bool { self.queue.upgrade().is_some_and(|queue| queue.remove(&self.key)) }

  /// The task is still waiting for its deadline.
  pub fn is_pending(&self) -> bool {
    self.queue.upgrade().is_some_and(|queue| queue.contains(&self.key))
  }

  /// The time the task is due at, on its scheduler's clock.
  pub fn deadline(&self) -> Duration { self.key.0 }
}
