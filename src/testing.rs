//! Recording subscriber for unit tests.

use std::sync::{Arc, Mutex};

use crate::{
  error::Error,
  rc::lock,
  subscriber::Subscriber,
  subscription::{Subscription, SubscriptionRef},
};

#[derive(Default)]
struct Record<T> {
  items: Vec<T>,
  error: Option<Error>,
  completed: bool,
  subscription: Option<SubscriptionRef>,
}

/// Records every signal and exposes the subscription it was given.
pub(crate) struct Collect<T> {
  initial: u64,
  record: Arc<Mutex<Record<T>>>,
}

impl<T> Clone for Collect<T> {
  fn clone(&self) -> Self { Self { initial: self.initial, record: self.record.clone() } }
}

impl<T> Collect<T> {
  /// `initial` is requested in `on_subscribe`; zero requests nothing.
  pub(crate) fn new(initial: u64) -> Self {
    Self {
      initial,
      record: Arc::new(Mutex::new(Record {
        items: Vec::new(),
        error: None,
        completed: false,
        subscription: None,
      })),
    }
  }

  pub(crate) fn items(&self) -> Vec<T>
  where
    T: Clone,
  {
    lock(&self.record).items.clone()
  }

  pub(crate) fn error(&self) -> Option<Error> { lock(&self.record).error.clone() }

  pub(crate) fn is_completed(&self) -> bool { lock(&self.record).completed }

  pub(crate) fn is_terminated(&self) -> bool {
    let record = lock(&self.record);
    record.completed || record.error.is_some()
  }

  fn subscription(&self) -> Option<SubscriptionRef> { lock(&self.record).subscription.clone() }

  pub(crate) fn request(&self, n: u64) {
    if let Some(s) = self.subscription() {
      s.request(n);
    }
  }

  pub(crate) fn cancel(&self) {
    if let Some(s) = self.subscription() {
      s.cancel();
    }
  }
}

impl<T: Send> Subscriber<T> for Collect<T> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    lock(&self.record).subscription = Some(subscription.clone());
    if self.initial > 0 {
      subscription.request(self.initial);
    }
  }

  fn on_next(&mut self, value: T) { lock(&self.record).items.push(value); }

  fn on_error(&mut self, err: Error) { lock(&self.record).error = Some(err); }

  fn on_complete(&mut self) { lock(&self.record).completed = true; }
}
