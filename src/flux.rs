//! Factories for publishers of zero to many items.

mod create;
mod defer;
mod from_iter;
mod interval;
mod trivial;

pub use create::{create, Create, FluxSink};
pub use defer::{defer, Defer};
pub use from_iter::{from_iter, just, range, FromIter};
pub use interval::{interval, interval_on, Interval};
pub(crate) use trivial::terminate;
pub use trivial::{empty, error, error_with, never, Empty, ErrorPublisher, ErrorWith, Never};

use crate::{
  ops::{combine_latest::CombineLatestOp, concat::ConcatOp, merge::MergeOp, zip::ZipOp},
  publisher::Publisher,
};

/// Emits the items of each source in turn, subscribing to the next one only
/// after the previous one completed.
///
/// ```
/// use rxflux::prelude::*;
///
/// let abc = flux::just(["a", "b", "c"]);
/// let def = flux::just(["d", "e", "f"]);
/// StepVerifier::create(flux::concat([abc, def]))
///   .expect_next_seq(["a", "b", "c", "d", "e", "f"])
///   .verify_complete()
///   .unwrap();
/// ```
pub fn concat<P>(sources: impl IntoIterator<Item = P>) -> ConcatOp<P>
where
  P: Publisher + 'static,
{
  ConcatOp::new(sources.into_iter().collect())
}

/// Subscribes to all sources at once and emits their items as they arrive.
///
/// Sources of different types can be merged after
/// [`box_it`](crate::publisher::PublisherExt::box_it).
pub fn merge<P>(sources: impl IntoIterator<Item = P>) -> MergeOp<P>
where
  P: Publisher,
{
  MergeOp::new(sources.into_iter().collect())
}

/// Pairs the items of `a` and `b` by position.
///
/// ```
/// use rxflux::prelude::*;
///
/// let names = flux::just(["Tom", "Jerry", "Spike"]);
/// let kinds = flux::just(["Cat", "Mouse", "Dog"]);
/// let pets = flux::zip(names, kinds).map(|(name, kind)| format!("{name} {kind}"));
/// StepVerifier::create(pets)
///   .expect_next_seq(["Tom Cat".to_string(), "Jerry Mouse".into(), "Spike Dog".into()])
///   .verify_complete()
///   .unwrap();
/// ```
pub fn zip<A, B>(a: A, b: B) -> ZipOp<A, B>
where
  A: Publisher,
  B: Publisher,
{
  ZipOp::new(a, b)
}

/// Emits `f(latest a, latest b)` each time either source emits, once both
/// have emitted at least once.
pub fn combine_latest<A, B, U, F>(a: A, b: B, f: F) -> CombineLatestOp<A, B, F>
where
  A: Publisher,
  B: Publisher,
  A::Item: Clone,
  B::Item: Clone,
  F: Fn(A::Item, B::Item) -> U + Send + Sync + 'static,
  U: Send + 'static,
{
  CombineLatestOp::new(a, b, f)
}
