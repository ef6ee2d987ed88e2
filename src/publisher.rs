//! The `Publisher` trait and the operator methods every publisher gets.

mod block;

use std::{error::Error as StdError, sync::Arc, time::Duration};

use crate::{
  connectable::ConnectableFlux,
  error::Error,
  ops::{
    combine_latest::CombineLatestOp,
    concat::ConcatOp,
    delay::DelayElementsOp,
    filter::FilterOp,
    flat_map::{FlatMapOp, DEFAULT_CONCURRENCY},
    lifecycle::{PeekHooks, PeekOp},
    map::{MapOp, TryMapOp},
    merge::MergeOp,
    on_error::{OnErrorResumeOp, ResumeAll, ResumeOn, ResumeWhen, ReturnValue},
    switch_if_empty::SwitchIfEmptyOp,
    take::TakeOp,
    zip::ZipOp,
  },
  scheduler::SchedulerRef,
  signal::Signal,
  subscriber::{BoxedSubscriber, Disposable, LambdaSubscriber, Subscriber},
  subscription::SubscriptionRef,
};

/// A possibly unbounded sequence of `Item`s, delivered on demand.
///
/// Every call to [`subscribe_with`](Publisher::subscribe_with) starts a
/// subscription of its own; whether subscriptions share one underlying
/// sequence (hot) or each replay it from the start (cold) depends on the
/// publisher.
pub trait Publisher: Send + Sync {
  type Item: Send + 'static;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Item> + 'static;
}

impl<P: Publisher> Publisher for &P {
  type Item = P::Item;

  #[inline]
  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Item> + 'static,
  {
    (**self).subscribe_with(subscriber)
  }
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
  type Item = P::Item;

  #[inline]
  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Item> + 'static,
  {
    (**self).subscribe_with(subscriber)
  }
}

/// Object-safe face of [`Publisher`].
pub trait DynPublisher<T>: Send + Sync {
  fn subscribe_dyn(&self, subscriber: BoxedSubscriber<T>);
}

impl<P: Publisher> DynPublisher<P::Item> for P {
  fn subscribe_dyn(&self, subscriber: BoxedSubscriber<P::Item>) { self.subscribe_with(subscriber) }
}

/// A type-erased publisher, created by [`PublisherExt::box_it`].
pub struct BoxedPublisher<T>(Arc<dyn DynPublisher<T>>);

impl<T> Clone for BoxedPublisher<T> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T: Send + 'static> Publisher for BoxedPublisher<T> {
  type Item = T;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + 'static,
  {
    self.0.subscribe_dyn(Box::new(subscriber))
  }
}

pub trait PublisherExt: Publisher + Sized {
  // ==========================================================================
  // Transformation
  // ==========================================================================

  /// Transforms every item with `f`. A panic in `f` cancels the upstream and
  /// terminates the sequence with [`Error::Panicked`].
  fn map<U, F>(self, f: F) -> MapOp<Self, F>
  where
    F: Fn(Self::Item) -> U + Send + Sync + 'static,
    U: Send + 'static,
  {
    MapOp::new(self, f)
  }

  /// Like [`map`](Self::map) with a fallible closure; `Err` terminates the
  /// sequence with [`Error::Transformation`].
  fn try_map<U, E, F>(self, f: F) -> TryMapOp<Self, F>
  where
    F: Fn(Self::Item) -> Result<U, E> + Send + Sync + 'static,
    E: StdError + Send + Sync + 'static,
    U: Send + 'static,
  {
    TryMapOp::new(self, f)
  }

  /// Keeps the items for which `predicate` returns `true`.
  fn filter<F>(self, predicate: F) -> FilterOp<Self, F>
  where
    F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
  {
    FilterOp::new(self, predicate)
  }

  /// Emits at most `count` items, then completes and cancels the upstream.
  fn take(self, count: usize) -> TakeOp<Self> { TakeOp::new(self, count) }

  /// Maps every item to a publisher and merges their items as they arrive.
  ///
  /// Items of one inner publisher keep their order; items of different inner
  /// publishers interleave. At most 256 inner publishers run at once.
  fn flat_map<Q, F>(self, f: F) -> FlatMapOp<Self, F>
  where
    F: Fn(Self::Item) -> Q + Send + Sync + 'static,
    Q: Publisher + 'static,
  {
    FlatMapOp::new(self, f, DEFAULT_CONCURRENCY)
  }

  /// [`flat_map`](Self::flat_map) with an explicit bound on concurrently
  /// active inner publishers.
  fn flat_map_with<Q, F>(self, f: F, concurrency: usize) -> FlatMapOp<Self, F>
  where
    F: Fn(Self::Item) -> Q + Send + Sync + 'static,
    Q: Publisher + 'static,
  {
    FlatMapOp::new(self, f, concurrency.max(1))
  }

  /// Switches to `alternative` if this publisher completes without items.
  fn switch_if_empty<A>(self, alternative: A) -> SwitchIfEmptyOp<Self, A>
  where
    A: Publisher<Item = Self::Item> + 'static,
    Self: 'static,
  {
    SwitchIfEmptyOp::new(self, alternative)
  }

  // ==========================================================================
  // Error recovery
  // ==========================================================================

  /// Replaces any error with `value` followed by completion.
  fn on_error_return(self, value: Self::Item) -> OnErrorResumeOp<Self, ReturnValue<Self::Item>>
  where
    Self::Item: Clone + Sync,
    Self: 'static,
  {
    OnErrorResumeOp::new(self, ReturnValue(value))
  }

  /// Continues with the publisher `f` returns for any error.
  fn on_error_resume<Q, F>(self, f: F) -> OnErrorResumeOp<Self, ResumeAll<F>>
  where
    F: Fn(Error) -> Q + Send + Sync + 'static,
    Q: Publisher<Item = Self::Item> + 'static,
    Self: 'static,
  {
    OnErrorResumeOp::new(self, ResumeAll(f))
  }

  /// Continues with the publisher `f` returns when the error's cause is an
  /// `E`; other errors pass through.
  fn on_error_resume_on<E, Q, F>(self, f: F) -> OnErrorResumeOp<Self, ResumeOn<E, F>>
  where
    E: StdError + 'static,
    F: Fn(&E) -> Q + Send + Sync + 'static,
    Q: Publisher<Item = Self::Item> + 'static,
    Self: 'static,
  {
    OnErrorResumeOp::new(self, ResumeOn::new(f))
  }

  /// Continues with the publisher `f` returns when `predicate` accepts the
  /// error; other errors pass through.
  fn on_error_resume_when<Pr, Q, F>(
    self,
    predicate: Pr,
    f: F,
  ) -> OnErrorResumeOp<Self, ResumeWhen<Pr, F>>
  where
    Pr: Fn(&Error) -> bool + Send + Sync + 'static,
    F: Fn(Error) -> Q + Send + Sync + 'static,
    Q: Publisher<Item = Self::Item> + 'static,
    Self: 'static,
  {
    OnErrorResumeOp::new(self, ResumeWhen(predicate, f))
  }

  // ==========================================================================
  // Time
  // ==========================================================================

  /// Delays every item by `delay` on the default scheduler, asking upstream
  /// for the next item only once the previous one was delivered.
  fn delay_elements(self, delay: Duration) -> DelayElementsOp<Self> {
    DelayElementsOp::new(self, delay, None)
  }

  fn delay_elements_on(self, delay: Duration, scheduler: SchedulerRef) -> DelayElementsOp<Self> {
    DelayElementsOp::new(self, delay, Some(scheduler))
  }

  // ==========================================================================
  // Combination
  // ==========================================================================

  /// Emits this publisher's items, then `other`'s.
  fn concat_with<O>(self, other: O) -> ConcatOp<BoxedPublisher<Self::Item>>
  where
    O: Publisher<Item = Self::Item> + 'static,
    Self: 'static,
  {
    ConcatOp::new(vec![self.box_it(), other.box_it()])
  }

  /// Interleaves this publisher's items with `other`'s as they arrive.
  fn merge_with<O>(self, other: O) -> MergeOp<BoxedPublisher<Self::Item>>
  where
    O: Publisher<Item = Self::Item> + 'static,
    Self: 'static,
  {
    MergeOp::new(vec![self.box_it(), other.box_it()])
  }

  /// Pairs items of this publisher and `other` by position.
  fn zip_with<O>(self, other: O) -> ZipOp<Self, O>
  where
    O: Publisher,
  {
    ZipOp::new(self, other)
  }

  /// Emits `f(latest of self, latest of other)` whenever either side emits,
  /// once both have emitted.
  fn combine_latest_with<O, U, F>(self, other: O, f: F) -> CombineLatestOp<Self, O, F>
  where
    O: Publisher,
    Self::Item: Clone,
    O::Item: Clone,
    F: Fn(Self::Item, O::Item) -> U + Send + Sync + 'static,
    U: Send + 'static,
  {
    CombineLatestOp::new(self, other, f)
  }

  // ==========================================================================
  // Lifecycle
  // ==========================================================================

  /// Runs `f` when the subscription reaches the subscriber.
  fn do_on_subscribe<F>(self, f: F) -> PeekOp<Self>
  where
    F: Fn(&SubscriptionRef) + Send + Sync + 'static,
  {
    PeekOp::new(self, PeekHooks::default().on_subscribe(f))
  }

  /// Runs `f` with every amount the subscriber requests.
  fn do_on_request<F>(self, f: F) -> PeekOp<Self>
  where
    F: Fn(u64) + Send + Sync + 'static,
  {
    PeekOp::new(self, PeekHooks::default().on_request(f))
  }

  fn do_on_next<F>(self, f: F) -> PeekOp<Self>
  where
    F: Fn(&Self::Item) + Send + Sync + 'static,
  {
    PeekOp::new(self, PeekHooks::default().on_next(f))
  }

  fn do_on_error<F>(self, f: F) -> PeekOp<Self>
  where
    F: Fn(&Error) + Send + Sync + 'static,
  {
    PeekOp::new(self, PeekHooks::default().on_error(f))
  }

  fn do_on_complete<F>(self, f: F) -> PeekOp<Self>
  where
    F: Fn() + Send + Sync + 'static,
  {
    PeekOp::new(self, PeekHooks::default().on_complete(f))
  }

  /// Runs `f` with the first item, or with `None` when the sequence completes
  /// empty. Meant for publishers of at most one item.
  fn do_on_success<F>(self, f: F) -> PeekOp<Self>
  where
    F: Fn(Option<&Self::Item>) + Send + Sync + 'static,
  {
    PeekOp::new(self, PeekHooks::default().on_success(f))
  }

  /// Runs `f` with every signal, terminal ones included.
  fn do_on_each<F>(self, f: F) -> PeekOp<Self>
  where
    F: Fn(&Signal<Self::Item>) + Send + Sync + 'static,
  {
    PeekOp::new(self, PeekHooks::default().on_each(f))
  }

  fn do_on_cancel<F>(self, f: F) -> PeekOp<Self>
  where
    F: Fn() + Send + Sync + 'static,
  {
    PeekOp::new(self, PeekHooks::default().on_cancel(f))
  }

  /// Logs every signal and request at `info` level under `rxflux.Flux`.
  fn log(self) -> PeekOp<Self>
  where
    Self::Item: std::fmt::Debug,
  {
    self.log_with("rxflux.Flux")
  }

  fn log_with(self, category: &'static str) -> PeekOp<Self>
  where
    Self::Item: std::fmt::Debug,
  {
    PeekOp::new(self, PeekHooks::default().log(category))
  }

  // ==========================================================================
  // Conversion
  // ==========================================================================

  /// Turns this publisher into a hot one that starts on
  /// [`ConnectableFlux::connect`].
  fn publish(self) -> ConnectableFlux<Self>
  where
    Self::Item: Clone,
    Self: 'static,
  {
    ConnectableFlux::new(self)
  }

  fn box_it(self) -> BoxedPublisher<Self::Item>
  where
    Self: 'static,
  {
    BoxedPublisher(Arc::new(self))
  }

  // ==========================================================================
  // Subscribing
  // ==========================================================================

  /// Subscribes with an unbounded request. Errors go to
  /// [`hooks::on_error_dropped`](crate::hooks::on_error_dropped).
  fn subscribe<N>(&self, next: N) -> Disposable
  where
    N: FnMut(Self::Item) + Send + 'static,
  {
    self.subscribe_lambda(LambdaSubscriber::new(next, None::<fn(Error)>, None::<fn()>))
  }

  fn subscribe_err<N, E>(&self, next: N, error: E) -> Disposable
  where
    N: FnMut(Self::Item) + Send + 'static,
    E: FnMut(Error) + Send + 'static,
  {
    self.subscribe_lambda(LambdaSubscriber::new(next, Some(error), None::<fn()>))
  }

  fn subscribe_all<N, E, C>(&self, next: N, error: E, complete: C) -> Disposable
  where
    N: FnMut(Self::Item) + Send + 'static,
    E: FnMut(Error) + Send + 'static,
    C: FnMut() + Send + 'static,
  {
    self.subscribe_lambda(LambdaSubscriber::new(next, Some(error), Some(complete)))
  }

  /// Like [`subscribe_all`](Self::subscribe_all), but `on_subscribe` receives
  /// the subscription and nothing is requested on its behalf.
  fn subscribe_full<N, E, C, O>(&self, next: N, error: E, complete: C, on_subscribe: O) -> Disposable
  where
    N: FnMut(Self::Item) + Send + 'static,
    E: FnMut(Error) + Send + 'static,
    C: FnMut() + Send + 'static,
    O: FnMut(&SubscriptionRef) + Send + 'static,
  {
    self.subscribe_lambda(
      LambdaSubscriber::new(next, Some(error), Some(complete)).with_on_subscribe(on_subscribe),
    )
  }

  /// Subscribes and blocks the calling thread until the first item arrives,
  /// then cancels the subscription. Returns `Ok(None)` if the publisher
  /// completes empty.
  ///
  /// Waits forever on a publisher that never signals, including one timed on
  /// a virtual-time scheduler nobody advances.
  ///
  /// ```
  /// use rxflux::prelude::*;
  ///
  /// assert_eq!(mono::just("Hello World").block().unwrap(), Some("Hello World"));
  /// ```
  fn block(&self) -> Result<Option<Self::Item>, Error> { block::first(self, None) }

  /// Like [`block`](Self::block), but gives up after `timeout`, cancelling the
  /// subscription and returning [`Error::Timeout`].
  fn block_timeout(&self, timeout: Duration) -> Result<Option<Self::Item>, Error> {
    block::first(self, Some(timeout))
  }

  #[doc(hidden)]
  fn subscribe_lambda<N, E, C>(&self, subscriber: LambdaSubscriber<N, E, C>) -> Disposable
  where
    LambdaSubscriber<N, E, C>: Subscriber<Self::Item> + 'static,
  {
    let handle = subscriber.disposable();
    self.subscribe_with(subscriber);
    handle
  }
}

impl<P: Publisher> PublisherExt for P {}
