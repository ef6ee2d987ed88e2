use std::{
  iter::{Peekable, Take},
  ops::RangeInclusive,
};

use crate::{
  error,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::drain::{Drain, Producer, Step},
};

/// Creates a publisher that emits the items of `iter`, cloning it for every
/// subscription.
///
/// Completes right after the last item has been delivered, without waiting
/// for further demand.
///
/// ```
/// use rxflux::prelude::*;
///
/// flux::from_iter(0..10).subscribe(|v| println!("{v},"));
/// ```
pub fn from_iter<I>(iter: I) -> FromIter<I>
where
  I: IntoIterator,
{
  FromIter(iter)
}

/// Creates a publisher of the given items.
///
/// ```
/// use rxflux::prelude::*;
///
/// StepVerifier::create(flux::just([1, 2, 3, 4, 5]))
///   .expect_next_seq([1, 2, 3, 4, 5])
///   .verify_complete()
///   .unwrap();
/// ```
pub fn just<T>(items: impl Into<Vec<T>>) -> FromIter<Vec<T>> { FromIter(items.into()) }

/// Creates a publisher of `count` consecutive integers starting at `start`.
///
/// The sequence ends early at `i64::MAX`: `range(i64::MAX - 1, 5)` emits two
/// items.
pub fn range(start: i64, count: usize) -> FromIter<Take<RangeInclusive<i64>>> {
  FromIter((start..=i64::MAX).take(count))
}

#[derive(Clone)]
pub struct FromIter<I>(I);

impl<I> Publisher for FromIter<I>
where
  I: IntoIterator + Clone + Send + Sync,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
{
  type Item = I::Item;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<I::Item> + 'static,
  {
    let producer = IterProducer(self.0.clone().into_iter().peekable());
    Drain::new(producer).start(subscriber);
  }
}

struct IterProducer<It: Iterator>(Peekable<It>);

impl<It> Producer<It::Item> for IterProducer<It>
where
  It: Iterator + Send,
  It::Item: Send,
{
  fn step(&mut self, can_emit: bool) -> Step<It::Item> {
    let iter = &mut self.0;
    let exhausted = match error::catch(|| iter.peek().is_none()) {
      Ok(exhausted) => exhausted,
      Err(err) => return Step::Done(Err(err)),
    };
    if exhausted {
      Step::Done(Ok(()))
    } else if can_emit {
      iter.next().map_or(Step::Done(Ok(())), Step::Next)
    } else {
      Step::Pending
    }
  }
}

#[cfg(test)]
mod test {
  use crate::prelude::*;

  #[rxflux_macro::test]
  fn every_subscription_restarts() {
    let numbers = flux::from_iter(vec![1, 2, 3]);
    StepVerifier::create(&numbers).expect_next_seq([1, 2, 3]).verify_complete().unwrap();
    StepVerifier::create(&numbers).expect_next_count(3).verify_complete().unwrap();
  }

  #[rxflux_macro::test]
  fn back_pressure() {
    StepVerifier::create_with_initial_request(flux::range(1, 10), 0)
      .then_request(2)
      .expect_next_seq([1, 2])
      .expect_no_event(std::time::Duration::from_millis(10))
      .then_request(8)
      .expect_next_count(8)
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn completes_with_the_last_item() {
    StepVerifier::create_with_initial_request(flux::just(["a", "b"]), 2)
      .expect_next_seq(["a", "b"])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn empty_range_completes() {
    StepVerifier::create(flux::range(5, 0)).verify_complete().unwrap();
  }

  #[rxflux_macro::test]
  fn range_stops_at_the_largest_value() {
    StepVerifier::create(flux::range(i64::MAX - 1, 5))
      .expect_next_seq([i64::MAX - 1, i64::MAX])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn panicking_iterator_errors() {
    let source = flux::from_iter((1..4).map(|v: i32| if v == 2 { panic!("bad item") } else { v }));
    StepVerifier::create(source).expect_next(1).expect_error_kind(ErrorKind::Panicked).verify().unwrap();
  }
}
