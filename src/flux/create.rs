use std::{
  marker::PhantomData,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use crate::{
  error::{self, Error},
  publisher::Publisher,
  signal::Signal,
  subscriber::Subscriber,
  subscription::drain::{Drain, Emitter, QueueProducer},
};

/// Creates a publisher driven by `emitter`, called once per subscription with
/// a [`FluxSink`].
///
/// Items pushed beyond the subscriber's demand are buffered until requested.
/// The sink may be moved to other threads.
///
/// ```rust
/// use rxflux::prelude::*;
///
/// let source = flux::create(|sink: FluxSink<&str>| {
///   sink.next("hello");
///   sink.next("world");
///   sink.complete();
/// });
/// StepVerifier::create(source).expect_next_seq(["hello", "world"]).verify_complete().unwrap();
/// ```
pub fn create<T, F>(emitter: F) -> Create<T, F>
where
  F: Fn(FluxSink<T>) + Send + Sync,
{
  Create { emitter, _item: PhantomData }
}

pub struct Create<T, F> {
  emitter: F,
  _item: PhantomData<fn() -> T>,
}

impl<T, F> Publisher for Create<T, F>
where
  T: Send + 'static,
  F: Fn(FluxSink<T>) + Send + Sync,
{
  type Item = T;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + 'static,
  {
    let drain: Arc<Drain<T, QueueProducer<T>, S>> = Drain::new(QueueProducer::new(1));
    drain.start(subscriber);
    let sink = FluxSink { emitter: drain, done: Arc::new(AtomicBool::new(false)) };
    let c_sink = sink.clone();
    if let Err(err) = error::catch(move || (self.emitter)(c_sink)) {
      sink.error(err);
    }
  }
}

/// Pushes signals into one subscription of a [`create`] publisher.
///
/// Signals after the first terminal one, or after the subscriber cancelled,
/// are ignored.
pub struct FluxSink<T> {
  emitter: Arc<dyn Emitter<T>>,
  done: Arc<AtomicBool>,
}

impl<T> Clone for FluxSink<T> {
  fn clone(&self) -> Self { Self { emitter: self.emitter.clone(), done: self.done.clone() } }
}

impl<T> FluxSink<T> {
  pub fn next(&self, value: T) {
    if !self.done.load(Ordering::Acquire) {
      self.emitter.emit(Signal::Next(value));
    }
  }

  pub fn error(&self, err: Error) {
    if !self.done.swap(true, Ordering::AcqRel) {
      self.emitter.emit(Signal::Error(err));
    }
  }

  pub fn complete(&self) {
    if !self.done.swap(true, Ordering::AcqRel) {
      self.emitter.emit(Signal::Complete);
    }
  }

  pub fn is_cancelled(&self) -> bool { self.emitter.is_cancelled() }

  /// Demand the subscriber has requested and not yet received.
  pub fn requested(&self) -> u64 { self.emitter.requested() }
}

#[cfg(test)]
mod test {
  use std::{sync::mpsc, thread, time::Duration};

  use crate::prelude::*;

  #[rxflux_macro::test]
  fn buffers_beyond_demand() {
    let source = flux::create(|sink: FluxSink<i32>| {
      for i in 0..5 {
        sink.next(i);
      }
      sink.complete();
    });
    StepVerifier::create_with_initial_request(source, 2)
      .expect_next_seq([0, 1])
      .expect_no_event(Duration::from_millis(10))
      .then_request(3)
      .expect_next_seq([2, 3, 4])
      .verify_complete()
      .unwrap();
  }

  #[rxflux_macro::test]
  fn signals_after_terminal_are_ignored() {
    let source = flux::create(|sink: FluxSink<i32>| {
      sink.next(1);
      sink.error(Error::message("stop"));
      sink.next(2);
      sink.complete();
    });
    StepVerifier::create(source).expect_next(1).verify_error().unwrap();
  }

  #[rxflux_macro::test]
  fn sink_reports_demand_and_cancellation() {
    let (tx, rx) = mpsc::channel();
    let source = flux::create(move |sink: FluxSink<i32>| tx.send(sink).unwrap());
    let handle = source.subscribe_full(|_| {}, |_| {}, || {}, |s| s.request(3));
    let sink = rx.recv().unwrap();
    assert_eq!(sink.requested(), 3);
    sink.next(1);
    assert_eq!(sink.requested(), 2);
    handle.dispose();
    assert!(sink.is_cancelled());
  }

  #[rxflux_macro::test]
  fn sink_can_emit_from_another_thread() {
    let source = flux::create(|sink: FluxSink<&str>| {
      thread::spawn(move || {
        sink.next("from");
        sink.next("thread");
        sink.complete();
      });
    });
    StepVerifier::create(source).expect_next_seq(["from", "thread"]).verify_complete().unwrap();
  }
}
