//! Error recovery: continue with another publisher instead of failing.

use std::{error::Error as StdError, marker::PhantomData, sync::Arc};

use crate::{
  error::{self, Error},
  mono,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{Arbiter, Arbitrated, SubscriptionRef},
};

/// Decides how an error is recovered from.
///
/// `Ok` names the publisher to continue with; `Err` hands the error (the
/// original one, or a new one) to the downstream.
pub trait ErrorResolver<T>: Send + Sync {
  type Fallback: Publisher<Item = T> + 'static;

  fn resolve(&self, err: Error) -> Result<Self::Fallback, Error>;
}

/// Recovers from every error.
pub struct ResumeAll<F>(pub(crate) F);

impl<T, F, Q> ErrorResolver<T> for ResumeAll<F>
where
  F: Fn(Error) -> Q + Send + Sync,
  Q: Publisher<Item = T> + 'static,
{
  type Fallback = Q;

  fn resolve(&self, err: Error) -> Result<Q, Error> { Ok((self.0)(err)) }
}

/// Recovers from errors whose cause is an `E`.
pub struct ResumeOn<E, F> {
  func: F,
  _cause: PhantomData<fn(&E)>,
}

impl<E, F> ResumeOn<E, F> {
  pub(crate) fn new(func: F) -> Self { Self { func, _cause: PhantomData } }
}

impl<T, E, F, Q> ErrorResolver<T> for ResumeOn<E, F>
where
  E: StdError + 'static,
  F: Fn(&E) -> Q + Send + Sync,
  Q: Publisher<Item = T> + 'static,
{
  type Fallback = Q;

  fn resolve(&self, err: Error) -> Result<Q, Error> {
    let fallback = err.downcast_ref::<E>().map(&self.func);
    fallback.ok_or(err)
  }
}

/// Recovers from errors accepted by a predicate.
pub struct ResumeWhen<Pr, F>(pub(crate) Pr, pub(crate) F);

impl<T, Pr, F, Q> ErrorResolver<T> for ResumeWhen<Pr, F>
where
  Pr: Fn(&Error) -> bool + Send + Sync,
  F: Fn(Error) -> Q + Send + Sync,
  Q: Publisher<Item = T> + 'static,
{
  type Fallback = Q;

  fn resolve(&self, err: Error) -> Result<Q, Error> {
    if (self.0)(&err) { Ok((self.1)(err)) } else { Err(err) }
  }
}

/// Replaces every error with one value.
pub struct ReturnValue<T>(pub(crate) T);

impl<T> ErrorResolver<T> for ReturnValue<T>
where
  T: Clone + Send + Sync + 'static,
{
  type Fallback = mono::Just<T>;

  fn resolve(&self, _err: Error) -> Result<mono::Just<T>, Error> { Ok(mono::just(self.0.clone())) }
}

/// Created by the `on_error_*` methods of
/// [`PublisherExt`](crate::publisher::PublisherExt).
pub struct OnErrorResumeOp<P, R> {
  source: P,
  resolver: Arc<R>,
}

impl<P, R> OnErrorResumeOp<P, R> {
  pub(crate) fn new(source: P, resolver: R) -> Self { Self { source, resolver: Arc::new(resolver) } }
}

impl<P, R> Publisher for OnErrorResumeOp<P, R>
where
  P: Publisher,
  R: ErrorResolver<P::Item> + 'static,
{
  type Item = P::Item;

  fn subscribe_with<S>(&self, mut subscriber: S)
  where
    S: Subscriber<P::Item> + 'static,
  {
    let arbiter = Arc::new(Arbiter::default());
    subscriber.on_subscribe(arbiter.clone());
    self.source.subscribe_with(OnErrorResumeSubscriber {
      actual: Some(subscriber),
      arbiter,
      resolver: self.resolver.clone(),
    });
  }
}

struct OnErrorResumeSubscriber<S, R> {
  actual: Option<S>,
  arbiter: Arc<Arbiter>,
  resolver: Arc<R>,
}

impl<T, S, R> Subscriber<T> for OnErrorResumeSubscriber<S, R>
where
  T: Send + 'static,
  S: Subscriber<T> + 'static,
  R: ErrorResolver<T>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.arbiter.set(subscription) }

  fn on_next(&mut self, value: T) {
    self.arbiter.produced(1);
    if let Some(actual) = self.actual.as_mut() {
      actual.on_next(value);
    }
  }

  fn on_error(&mut self, err: Error) {
    let Some(mut actual) = self.actual.take() else { return };
    if self.arbiter.is_cancelled() {
      return;
    }
    let resolver = &self.resolver;
    match error::catch(move || resolver.resolve(err)) {
      Ok(Ok(fallback)) => {
        tracing::debug!("recovering from error with a fallback publisher");
        fallback.subscribe_with(Arbitrated::new(self.arbiter.clone(), actual));
      }
      Ok(Err(err)) | Err(err) => actual.on_error(err),
    }
  }

  fn on_complete(&mut self) {
    if let Some(mut actual) = self.actual.take() {
      actual.on_complete();
    }
  }
}
