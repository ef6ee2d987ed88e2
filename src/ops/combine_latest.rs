use std::{collections::VecDeque, sync::Arc};

use crate::{
  error::{self, Error},
  publisher::Publisher,
  signal::Signal,
  subscriber::Subscriber,
  subscription::drain::{Drain, Feed, Producer, Step},
};

/// Recombines the latest item of each source whenever either emits.
///
/// Nothing is emitted until both sources have emitted once. The sequence
/// completes when both sources have completed, or right away when a source
/// completes without ever emitting, because no combination can exist then.
pub struct CombineLatestOp<A, B, F> {
  source_a: A,
  source_b: B,
  binary_op: Arc<F>,
}

impl<A, B, F> CombineLatestOp<A, B, F> {
  pub(crate) fn new(source_a: A, source_b: B, binary_op: F) -> Self {
    Self { source_a, source_b, binary_op: Arc::new(binary_op) }
  }
}

impl<A, B, F, U> Publisher for CombineLatestOp<A, B, F>
where
  A: Publisher,
  B: Publisher,
  A::Item: Clone,
  B::Item: Clone,
  F: Fn(A::Item, B::Item) -> U + Send + Sync + 'static,
  U: Send + 'static,
{
  type Item = U;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<U> + 'static,
  {
    let state = CombineState::new(self.binary_op.clone());
    let drain: Arc<Drain<U, CombineState<A::Item, B::Item, F, U>, S>> = Drain::new(state);
    drain.start(subscriber);
    self.source_a.subscribe_with(Feed::new(drain.clone(), CombineState::<A::Item, B::Item, F, U>::accept_a));
    if !drain.is_cancelled() {
      self.source_b.subscribe_with(Feed::new(drain, CombineState::<A::Item, B::Item, F, U>::accept_b));
    }
  }
}

struct CombineState<X, Y, F, U> {
  latest_a: Option<X>,
  latest_b: Option<Y>,
  completed_a: bool,
  completed_b: bool,
  output: VecDeque<U>,
  error: Option<Error>,
  binary_op: Arc<F>,
}

impl<X, Y, F, U> CombineState<X, Y, F, U>
where
  X: Clone,
  Y: Clone,
  F: Fn(X, Y) -> U,
{
  fn new(binary_op: Arc<F>) -> Self {
    Self {
      latest_a: None,
      latest_b: None,
      completed_a: false,
      completed_b: false,
      output: VecDeque::new(),
      error: None,
      binary_op,
    }
  }

  fn accept_a(&mut self, signal: Signal<X>) {
    match signal {
      Signal::Next(a) => {
        self.latest_a = Some(a.clone());
        if let Some(b) = self.latest_b.clone() {
          self.combine(a, b);
        }
      }
      Signal::Error(e) => self.fail(e),
      Signal::Complete => self.completed_a = true,
    }
  }

  fn accept_b(&mut self, signal: Signal<Y>) {
    match signal {
      Signal::Next(b) => {
        self.latest_b = Some(b.clone());
        if let Some(a) = self.latest_a.clone() {
          self.combine(a, b);
        }
      }
      Signal::Error(e) => self.fail(e),
      Signal::Complete => self.completed_b = true,
    }
  }

  fn combine(&mut self, a: X, b: Y) {
    let binary_op = &self.binary_op;
    match error::catch(|| binary_op(a, b)) {
      Ok(v) => self.output.push_back(v),
      Err(e) => self.fail(e),
    }
  }

  fn fail(&mut self, err: Error) {
    if self.error.is_none() {
      self.output.clear();
      self.error = Some(err);
    }
  }
}

impl<X, Y, F, U> Producer<U> for CombineState<X, Y, F, U>
where
  X: Send,
  Y: Send,
  U: Send,
  F: Send + Sync,
{
  fn step(&mut self, can_emit: bool) -> Step<U> {
    if let Some(err) = self.error.take() {
      return Step::Done(Err(err));
    }
    if can_emit {
      if let Some(v) = self.output.pop_front() {
        return Step::Next(v);
      }
    }
    let exhausted = (self.completed_a && self.completed_b)
      || (self.completed_a && self.latest_a.is_none())
      || (self.completed_b && self.latest_b.is_none());
    if exhausted && self.output.is_empty() { Step::Done(Ok(())) } else { Step::Pending }
  }
}
