use std::sync::Arc;

use crate::{
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::drain::{Drain, Feed, QueueProducer},
};

/// Subscribes to every source at once and emits their items in arrival order.
///
/// Completes once all sources complete; the first error cancels the other
/// sources and is delivered immediately.
pub struct MergeOp<P> {
  sources: Vec<P>,
}

impl<P> MergeOp<P> {
  pub(crate) fn new(sources: Vec<P>) -> Self { Self { sources } }
}

impl<P: Publisher> Publisher for MergeOp<P> {
  type Item = P::Item;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item> + 'static,
  {
    let drain: Arc<Drain<P::Item, _, S>> = Drain::new(QueueProducer::new(self.sources.len()));
    drain.start(subscriber);
    for source in &self.sources {
      if drain.is_cancelled() {
        break;
      }
      source.subscribe_with(Feed::new(drain.clone(), QueueProducer::<P::Item>::accept));
    }
  }
}

#[cfg(test)]
mod test {
  use std::time::Duration;

  use crate::prelude::*;

  #[rxflux_macro::test]
  fn synchronous_sources_are_drained_in_order() {
    let merged = flux::merge([flux::just(["a", "b", "c"]), flux::just(["d", "e", "f"])]);
    StepVerifier::create(merged)
      .expect_next_seq(["a", "b", "c", "d", "e", "f"])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn timed_sources_interleave() {
    let merged = || {
      let odd = flux::just([1, 3, 5]).delay_elements(Duration::from_millis(100));
      let even = flux::just([0, 2, 4]).delay_elements(Duration::from_millis(120));
      odd.merge_with(even)
    };
    StepVerifier::with_virtual_time(merged)
      .then_await(Duration::from_secs(1))
      .expect_next_seq([1, 0, 3, 2, 5, 4])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn completes_only_when_every_source_completes() {
    StepVerifier::create(flux::merge([flux::just([1]).box_it(), flux::never().box_it()]))
      .expect_next(1)
      .expect_no_event(Duration::from_millis(20))
      .then_cancel()
      .verify()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn error_is_delivered_once() {
    let merged = flux::merge([
      flux::error::<i32>(Error::message("first")).box_it(),
      flux::error(Error::message("second")).box_it(),
    ]);
    StepVerifier::create(merged)
      .expect_error_matches(|e| e.to_string() == "source error: first")
      .verify()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn empty_merge_completes() {
    StepVerifier::create(flux::merge(Vec::<flux::FromIter<Vec<i32>>>::new())).verify_complete().unwrap();
  }
}
