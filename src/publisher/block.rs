//! Waiting on the calling thread for the first signal of a publisher.

use std::{
  sync::{Arc, Condvar, Mutex, PoisonError},
  time::{Duration, Instant},
};

use super::Publisher;
use crate::{error::Error, rc::lock, subscriber::Subscriber, subscription::SubscriptionRef};

type Outcome<T> = Result<Option<T>, Error>;

struct BlockState<T> {
  upstream: Option<SubscriptionRef>,
  outcome: Option<Outcome<T>>,
}

struct Block<T> {
  state: Mutex<BlockState<T>>,
  settled: Condvar,
}

impl<T> Block<T> {
  /// Keeps the first outcome and releases the upstream.
  fn settle(&self, outcome: Outcome<T>) {
    let upstream = {
      let mut state = lock(&self.state);
      if state.outcome.is_some() {
        return;
      }
      state.outcome = Some(outcome);
      state.upstream.take()
    };
    self.settled.notify_all();
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
  }
}

/// Requests one item and hands whatever arrives first to the waiting thread.
struct BlockingSubscriber<T>(Arc<Block<T>>);

impl<T: Send> Subscriber<T> for BlockingSubscriber<T> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    {
      let mut state = lock(&self.0.state);
      if state.outcome.is_some() {
        drop(state);
        subscription.cancel();
        return;
      }
      state.upstream = Some(subscription.clone());
    }
    subscription.request(1);
  }

  fn on_next(&mut self, value: T) { self.0.settle(Ok(Some(value))) }

  fn on_error(&mut self, err: Error) { self.0.settle(Err(err)) }

  fn on_complete(&mut self) { self.0.settle(Ok(None)) }
}

/// Subscribes `publisher` and waits for its first item, its empty completion
/// or its error. With a `timeout`, the subscription is cancelled once it
/// elapses and the wait fails with [`Error::Timeout`].
pub(crate) fn first<P>(publisher: &P, timeout: Option<Duration>) -> Outcome<P::Item>
where
  P: Publisher,
{
  let block = Arc::new(Block {
    state: Mutex::new(BlockState { upstream: None, outcome: None }),
    settled: Condvar::new(),
  });
  publisher.subscribe_with(BlockingSubscriber(block.clone()));

  let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
  let mut state = lock(&block.state);
  loop {
    if let Some(outcome) = state.outcome.take() {
      return outcome;
    }
    state = match (deadline, timeout) {
      (Some(deadline), Some(timeout)) => {
        let now = Instant::now();
        if now >= deadline {
          state.outcome = Some(Err(Error::Timeout(timeout)));
          let upstream = state.upstream.take();
          drop(state);
          if let Some(upstream) = upstream {
            upstream.cancel();
          }
          tracing::debug!(?timeout, "blocking wait timed out");
          return Err(Error::Timeout(timeout));
        }
        match block.settled.wait_timeout(state, deadline - now) {
          Ok((state, _)) => state,
          Err(poisoned) => poisoned.into_inner().0,
        }
      }
      _ => block.settled.wait(state).unwrap_or_else(PoisonError::into_inner),
    };
  }
}
