//! Lifecycle operators: side effects on the signals of a subscription.
//!
//! Every `do_on_*` method and `log` produce a [`PeekOp`]. The hooks observe
//! signals and requests without changing them. A panicking hook on the
//! subscribe, next or complete path terminates the subscription with
//! [`Error::Panicked`]; a panicking hook on the request, cancel or error path
//! is reported through [`hooks::error_dropped`].

use std::{fmt::Debug, sync::Arc};

use crate::{
  error::{self, Error},
  hooks,
  publisher::Publisher,
  signal::Signal,
  subscriber::{Forward, Subscriber},
  subscription::{empty_subscription, Subscription, SubscriptionRef, UNBOUNDED},
};

type SubscribeHook = Box<dyn Fn(&SubscriptionRef) + Send + Sync>;
type RequestHook = Box<dyn Fn(u64) + Send + Sync>;
type UnitHook = Box<dyn Fn() + Send + Sync>;
type NextHook<T> = Box<dyn Fn(&T) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&Error) + Send + Sync>;
type SuccessHook<T> = Box<dyn Fn(Option<&T>) + Send + Sync>;
type EachHook<T> = Box<dyn Fn(&Signal<T>) + Send + Sync>;

/// The callbacks of one [`PeekOp`].
pub struct PeekHooks<T> {
  subscribe: Option<SubscribeHook>,
  request: Option<RequestHook>,
  cancel: Option<UnitHook>,
  next: Option<NextHook<T>>,
  error: Option<ErrorHook>,
  complete: Option<UnitHook>,
  success: Option<SuccessHook<T>>,
  each: Option<EachHook<T>>,
  logger: Option<SignalLogger<T>>,
}

impl<T> Default for PeekHooks<T> {
  fn default() -> Self {
    Self {
      subscribe: None,
      request: None,
      cancel: None,
      next: None,
      error: None,
      complete: None,
      success: None,
      each: None,
      logger: None,
    }
  }
}

impl<T> PeekHooks<T> {
  pub fn on_subscribe(mut self, f: impl Fn(&SubscriptionRef) + Send + Sync + 'static) -> Self {
    self.subscribe = Some(Box::new(f));
    self
  }

  pub fn on_request(mut self, f: impl Fn(u64) + Send + Sync + 'static) -> Self {
    self.request = Some(Box::new(f));
    self
  }

  pub fn on_cancel(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.cancel = Some(Box::new(f));
    self
  }

  pub fn on_next(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
    self.next = Some(Box::new(f));
    self
  }

  pub fn on_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
    self.error = Some(Box::new(f));
    self
  }

  pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.complete = Some(Box::new(f));
    self
  }

  pub fn on_success(mut self, f: impl Fn(Option<&T>) + Send + Sync + 'static) -> Self {
    self.success = Some(Box::new(f));
    self
  }

  pub fn on_each(mut self, f: impl Fn(&Signal<T>) + Send + Sync + 'static) -> Self {
    self.each = Some(Box::new(f));
    self
  }

  /// Logs every signal at `info` level, tagged with `category`.
  pub fn log(mut self, category: &'static str) -> Self
  where
    T: Debug,
  {
    self.logger = Some(SignalLogger { category, describe: describe_debug::<T> });
    self
  }

  /// Whether requests and cancellation need to pass through the operator.
  fn watches_subscription(&self) -> bool {
    self.request.is_some() || self.cancel.is_some() || self.logger.is_some()
  }
}

fn describe_debug<T: Debug>(value: &T) -> String { format!("{value:?}") }

/// Writes the `| onNext(..)` style lines of `log()`.
struct SignalLogger<T> {
  category: &'static str,
  describe: fn(&T) -> String,
}

impl<T> SignalLogger<T> {
  fn line(&self, line: &str) { tracing::info!(category = self.category, "| {}", line); }

  fn next(&self, value: &T) { self.line(&format!("onNext({})", (self.describe)(value))) }

  fn request(&self, n: u64) {
    if n == UNBOUNDED {
      self.line("request(unbounded)");
    } else {
      self.line(&format!("request({n})"));
    }
  }
}

/// Created by the `do_on_*` and `log` methods of
/// [`PublisherExt`](crate::publisher::PublisherExt).
pub struct PeekOp<P: Publisher> {
  source: P,
  hooks: Arc<PeekHooks<P::Item>>,
}

impl<P: Publisher> PeekOp<P> {
  pub(crate) fn new(source: P, hooks: PeekHooks<P::Item>) -> Self {
    Self { source, hooks: Arc::new(hooks) }
  }
}

impl<P: Publisher> Publisher for PeekOp<P> {
  type Item = P::Item;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item> + 'static,
  {
    self.source.subscribe_with(PeekSubscriber {
      forward: Forward::new(subscriber),
      hooks: self.hooks.clone(),
      seen_item: false,
    })
  }
}

struct PeekSubscriber<S, T> {
  forward: Forward<S, T>,
  hooks: Arc<PeekHooks<T>>,
  seen_item: bool,
}

impl<T, S> Subscriber<T> for PeekSubscriber<S, T>
where
  T: Send + 'static,
  S: Subscriber<T>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let peek = &self.hooks;
    if let Some(logger) = &peek.logger {
      logger.line("onSubscribe");
    }
    let hooked = match &peek.subscribe {
      Some(f) => error::catch(|| f(&subscription)),
      None => Ok(()),
    };
    match hooked {
      Ok(()) if peek.watches_subscription() => {
        let watched = PeekSubscription { inner: subscription, hooks: self.hooks.clone() };
        self.forward.subscribe(Arc::new(watched));
      }
      Ok(()) => self.forward.subscribe(subscription),
      Err(err) => {
        subscription.cancel();
        self.forward.subscribe(empty_subscription());
        self.forward.error(err);
      }
    }
  }

  fn on_next(&mut self, value: T) {
    if self.forward.done {
      return;
    }
    let first = !self.seen_item;
    self.seen_item = true;
    let peek = &self.hooks;
    let observed = error::catch(|| {
      if let Some(logger) = &peek.logger {
        logger.next(&value);
      }
      if let Some(f) = &peek.next {
        f(&value);
      }
      if let (true, Some(f)) = (first, &peek.success) {
        f(Some(&value));
      }
      let signal = Signal::Next(value);
      if let Some(f) = &peek.each {
        f(&signal);
      }
      signal
    });
    match observed {
      Ok(signal) => {
        if let Some(value) = signal.into_value() {
          self.forward.next(value);
        }
      }
      Err(err) => self.forward.fail(err),
    }
  }

  fn on_error(&mut self, err: Error) {
    if self.forward.done {
      hooks::error_dropped(&err);
      return;
    }
    let peek = &self.hooks;
    let observed = error::catch(|| {
      if let Some(logger) = &peek.logger {
        logger.line(&format!("onError({err})"));
      }
      if let Some(f) = &peek.error {
        f(&err);
      }
      if let Some(f) = &peek.each {
        f(&Signal::Error(err.clone()));
      }
    });
    if let Err(hook_err) = observed {
      hooks::error_dropped(&hook_err);
    }
    self.forward.error(err);
  }

  fn on_complete(&mut self) {
    if self.forward.done {
      return;
    }
    let peek = &self.hooks;
    let seen_item = self.seen_item;
    let observed = error::catch(|| {
      if let Some(logger) = &peek.logger {
        logger.line("onComplete()");
      }
      if let (false, Some(f)) = (seen_item, &peek.success) {
        f(None);
      }
      if let Some(f) = &peek.complete {
        f();
      }
      if let Some(f) = &peek.each {
        f(&Signal::Complete);
      }
    });
    match observed {
      Ok(()) => self.forward.complete(false),
      Err(err) => self.forward.error(err),
    }
  }
}

/// Lets request and cancel hooks see the downstream's calls.
struct PeekSubscription<T> {
  inner: SubscriptionRef,
  hooks: Arc<PeekHooks<T>>,
}

impl<T: 'static> Subscription for PeekSubscription<T> {
  fn request(&self, n: u64) {
    let peek = &self.hooks;
    let observed = error::catch(|| {
      if let Some(logger) = &peek.logger {
        logger.request(n);
      }
      if let Some(f) = &peek.request {
        f(n);
      }
    });
    if let Err(err) = observed {
      hooks::error_dropped(&err);
    }
    self.inner.request(n);
  }

  fn cancel(&self) {
    let peek = &self.hooks;
    let observed = error::catch(|| {
      if let Some(logger) = &peek.logger {
        logger.line("cancel()");
      }
      if let Some(f) = &peek.cancel {
        f();
      }
    });
    if let Err(err) = observed {
      hooks::error_dropped(&err);
    }
    self.inner.cancel();
  }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use crate::prelude::*;

  fn journal() -> (Arc<Mutex<Vec<String>>>, impl Fn(String) + Clone + Send + Sync + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let c_log = log.clone();
    (log, move |line: String| c_log.lock().unwrap().push(line))
  }

  #[rxflux_macro::test]
  fn hooks_run_in_signal_order() {
    let (log, push) = journal();
    let (p1, p2, p3, p4) = (push.clone(), push.clone(), push.clone(), push.clone());
    let publisher = mono::just("value")
      .do_on_subscribe(move |_| p1("subscribe".into()))
      .do_on_request(move |n| p2(format!("request {n}")))
      .do_on_next(move |v| p3(format!("next {v}")))
      .do_on_complete(move || p4("complete".into()));
    StepVerifier::create_with_initial_request(publisher, 2).expect_next("value").verify_complete().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["subscribe", "request 2", "next value", "complete"]);
  }

  #[rxflux_macro::test]
  fn do_on_request_sees_unbounded() {
    let (log, push) = journal();
    let publisher = mono::just(1).do_on_request(move |n| push(n.to_string()));
    publisher.subscribe(|_| {});
    publisher.subscribe_full(|_| {}, |_| {}, || {}, |s| s.request(2));
    assert_eq!(*log.lock().unwrap(), vec![u64::MAX.to_string(), "2".to_string()]);
  }

  #[rxflux_macro::test]
  fn do_on_success_sees_value_or_none() {
    let (log, push) = journal();
    let p2 = push.clone();
    mono::just("value").do_on_success(move |v| push(format!("{v:?}"))).subscribe(|_| {});
    mono::empty::<&str>().do_on_success(move |v| p2(format!("{v:?}"))).subscribe(|_| {});
    assert_eq!(*log.lock().unwrap(), vec!["Some(\"value\")", "None"]);
  }

  #[rxflux_macro::test]
  fn do_on_each_sees_every_signal_kind() {
    let kinds = Arc::new(Mutex::new(vec![]));
    let c_kinds = kinds.clone();
    let publisher = mono::just("value").do_on_each(move |s| c_kinds.lock().unwrap().push(s.kind()));
    StepVerifier::create(publisher).expect_next("value").verify_complete().unwrap();
    assert_eq!(*kinds.lock().unwrap(), vec![SignalKind::OnNext, SignalKind::OnComplete]);
  }

  #[rxflux_macro::test]
  fn do_on_error_and_cancel() {
    let (log, push) = journal();
    let p2 = push.clone();
    let failing = mono::error::<i32>(Error::message("boom")).do_on_error(move |e| push(e.to_string()));
    StepVerifier::create(failing).verify_error().unwrap();
    let never = flux::never::<i32>().do_on_cancel(move || p2("cancel".into()));
    StepVerifier::create(never).expect_subscription().then_cancel().verify().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["source error: boom", "cancel"]);
  }

  #[rxflux_macro::test]
  fn panicking_next_hook_fails_the_subscription() {
    let publisher = flux::range(1, 3).do_on_next(|v| assert!(*v < 2, "too big"));
    StepVerifier::create(publisher).expect_next(1).expect_error_kind(ErrorKind::Panicked).verify().unwrap();
  }

  #[rxflux_macro::test]
  fn log_passes_signals_through() {
    StepVerifier::create(mono::just("value1").log()).expect_next("value1").verify_complete().unwrap();
    StepVerifier::create(flux::range(1, 2).log_with("numbers")).expect_next_seq([1, 2]).verify_complete().unwrap();
  }
}
