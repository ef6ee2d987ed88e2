//! Zip operator
//!
//! Pairs the items of two publishers by position.

use std::{collections::VecDeque, sync::Arc};

use crate::{
  error::Error,
  publisher::Publisher,
  signal::Signal,
  subscriber::Subscriber,
  subscription::drain::{Drain, Feed, Producer, Step},
};

/// Emits `(a, b)` tuples, each pairing the earliest unpaired item of both
/// sources.
///
/// Items of the faster side wait in a buffer until their partner arrives.
/// Completes as soon as one side has completed with an empty buffer, since no
/// further pair can be formed; the other side is cancelled then.
pub struct ZipOp<A, B> {
  source_a: A,
  source_b: B,
}

impl<A, B> ZipOp<A, B> {
  pub(crate) fn new(source_a: A, source_b: B) -> Self { Self { source_a, source_b } }
}

impl<A, B> Publisher for ZipOp<A, B>
where
  A: Publisher,
  B: Publisher,
{
  type Item = (A::Item, B::Item);

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Item> + 'static,
  {
    let drain: Arc<Drain<Self::Item, _, S>> = Drain::new(ZipState::<A::Item, B::Item>::default());
    drain.start(subscriber);
    self.source_a.subscribe_with(Feed::new(drain.clone(), ZipState::<A::Item, B::Item>::accept_a));
    if !drain.is_cancelled() {
      self.source_b.subscribe_with(Feed::new(drain, ZipState::<A::Item, B::Item>::accept_b));
    }
  }
}

struct ZipState<X, Y> {
  buffer_a: VecDeque<X>,
  buffer_b: VecDeque<Y>,
  completed_a: bool,
  completed_b: bool,
  error: Option<Error>,
}

impl<X, Y> Default for ZipState<X, Y> {
  fn default() -> Self {
    Self {
      buffer_a: VecDeque::new(),
      buffer_b: VecDeque::new(),
      completed_a: false,
      completed_b: false,
      error: None,
    }
  }
}

impl<X, Y> ZipState<X, Y> {
  fn accept_a(&mut self, signal: Signal<X>) {
    match signal {
      Signal::Next(v) => self.buffer_a.push_back(v),
      Signal::Error(e) => self.fail(e),
      Signal::Complete => self.completed_a = true,
    }
  }

  fn accept_b(&mut self, signal: Signal<Y>) {
    match signal {
      Signal::Next(v) => self.buffer_b.push_back(v),
      Signal::Error(e) => self.fail(e),
      Signal::Complete => self.completed_b = true,
    }
  }

  fn fail(&mut self, err: Error) {
    if self.error.is_none() {
      self.error = Some(err);
    }
  }
}

impl<X: Send, Y: Send> Producer<(X, Y)> for ZipState<X, Y> {
  fn step(&mut self, can_emit: bool) -> Step<(X, Y)> {
    if let Some(err) = self.error.take() {
      return Step::Done(Err(err));
    }
    if can_emit && !self.buffer_a.is_empty() && !self.buffer_b.is_empty() {
      if let (Some(a), Some(b)) = (self.buffer_a.pop_front(), self.buffer_b.pop_front()) {
        return Step::Next((a, b));
      }
    }
    // No pair can be formed any more.
    if (self.completed_a && self.buffer_a.is_empty()) || (self.completed_b && self.buffer_b.is_empty())
    {
      Step::Done(Ok(()))
    } else {
      Step::Pending
    }
  }
}

#[cfg(test)]
mod test {
  use std::time::Duration;

  use crate::prelude::*;

  #[rxflux_macro::test]
  fn test_zip_basic() {
    StepVerifier::create(flux::zip(flux::just(["a", "b", "c"]), flux::just(["x", "y", "z"])))
      .expect_next_seq([("a", "x"), ("b", "y"), ("c", "z")])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn test_zip_different_lengths() {
    StepVerifier::create(flux::range(0, 5).zip_with(flux::just(["a", "b"])))
      .expect_next_seq([(0, "a"), (1, "b")])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn pet_names() {
    let names = flux::just(["Tom", "Jerry", "Spike"]);
    let types = flux::just(["Cat", "Mouse", "Dog"]);
    let pets = flux::zip(names, types).map(|(name, kind)| format!("{name} {kind}"));
    StepVerifier::create(pets)
      .expect_next_seq(["Tom Cat".to_string(), "Jerry Mouse".into(), "Spike Dog".into()])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn faster_side_waits_for_its_partner() {
    let zipped = || {
      flux::interval(Duration::from_secs(1)).zip_with(flux::just(['a', 'b']).delay_elements(Duration::from_secs(3)))
    };
    StepVerifier::with_virtual_time(zipped)
      .expect_subscription()
      .expect_no_event(Duration::from_secs(3))
      .expect_next((0, 'a'))
      .expect_no_event(Duration::from_secs(3))
      .expect_next((1, 'b'))
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn demand_bounds_the_pairs() {
    StepVerifier::create_with_initial_request(flux::zip(flux::range(0, 4), flux::range(10, 4)), 1)
      .expect_next((0, 10))
      .expect_no_event(Duration::from_millis(20))
      .then_request(2)
      .expect_next_seq([(1, 11), (2, 12)])
      .then_cancel()
      .verify()
      .unwrap();
  }
}
