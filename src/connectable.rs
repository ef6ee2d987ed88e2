//! Hot publishing: one upstream subscription shared by many subscribers.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Mutex,
};

mod registry;

use registry::{Key, Registry};

use crate::{
  error::Error,
  flux::terminate,
  publisher::Publisher,
  rc::lock,
  signal::Signal,
  subscriber::Subscriber,
  subscription::{
    drain::{Drain, Emitter, QueueProducer},
    Subscription, SubscriptionRef, UNBOUNDED,
  },
};

/// A publisher that subscribes to its source only on [`connect`], then
/// broadcasts the source's items to every current subscriber.
///
/// Subscribers see the items emitted after they attached; nothing is replayed
/// and items emitted while nobody is attached are lost. Each subscriber has
/// its own demand: items it has not requested yet are buffered for it alone
/// while the source is requested [`UNBOUNDED`]. Once the source terminates,
/// current and later subscribers receive the terminal signal.
///
/// Clones share the same connection.
///
/// [`connect`]: ConnectableFlux::connect
///
/// ```rust
/// use rxflux::prelude::*;
/// use std::sync::{Arc, Mutex};
///
/// let hot = flux::range(1, 3).publish();
/// let seen = Arc::new(Mutex::new(vec![]));
/// let c_seen = seen.clone();
/// hot.subscribe(move |v| c_seen.lock().unwrap().push(v));
/// hot.connect();
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
/// ```
pub struct ConnectableFlux<P: Publisher> {
  source: Arc<P>,
  hub: Arc<Hub<P::Item>>,
}

impl<P: Publisher> Clone for ConnectableFlux<P> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), hub: self.hub.clone() } }
}

impl<P> ConnectableFlux<P>
where
  P: Publisher + 'static,
  P::Item: Clone,
{
  pub(crate) fn new(source: P) -> Self {
    Self { source: Arc::new(source), hub: Arc::new(Hub::default()) }
  }

  /// Subscribes to the source unless already connected. After the source
  /// terminated this does nothing.
  pub fn connect(&self) -> Connection {
    let epoch = {
      let mut state = lock(&self.hub.state);
      if matches!(state.phase, Phase::Unconnected) {
        state.epoch += 1;
        state.phase = Phase::Connected { upstream: None };
        Some(state.epoch)
      } else {
        None
      }
    };
    let hub: Arc<dyn Disconnect> = self.hub.clone();
    match epoch {
      Some(epoch) => {
        tracing::debug!(epoch, "connecting hot publisher");
        self.source.subscribe_with(HubSubscriber { hub: self.hub.clone(), epoch });
        Connection { hub, epoch }
      }
      None => {
        let epoch = lock(&self.hub.state).epoch;
        Connection { hub, epoch }
      }
    }
  }

  /// Connects once the `n`-th subscriber has attached through the returned
  /// publisher.
  pub fn auto_connect(self, n: usize) -> AutoConnect<P> {
    if n == 0 {
      self.connect();
    }
    AutoConnect { flux: self, threshold: n, subscribed: AtomicUsize::new(0) }
  }

  pub fn is_connected(&self) -> bool { matches!(lock(&self.hub.state).phase, Phase::Connected { .. }) }

  pub fn subscriber_count(&self) -> usize { lock(&self.hub.state).members.len() }
}

impl<P> Publisher for ConnectableFlux<P>
where
  P: Publisher + 'static,
  P::Item: Clone,
{
  type Item = P::Item;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item> + 'static,
  {
    let drain: Arc<Drain<P::Item, QueueProducer<P::Item>, S>> = Drain::new(QueueProducer::new(1));
    let key = {
      let mut state = lock(&self.hub.state);
      if let Phase::Terminated(result) = &state.phase {
        let result = result.clone();
        drop(state);
        terminate(subscriber, result);
        return;
      }
      state.members.insert(drain.clone())
    };
    let handle = MemberHandle { drain: drain.clone(), hub: self.hub.clone(), key };
    drain.start_with(subscriber, Arc::new(handle));
  }
}

/// Created by [`ConnectableFlux::auto_connect`].
pub struct AutoConnect<P: Publisher> {
  flux: ConnectableFlux<P>,
  threshold: usize,
  subscribed: AtomicUsize,
}

impl<P> Publisher for AutoConnect<P>
where
  P: Publisher + 'static,
  P::Item: Clone,
{
  type Item = P::Item;

  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item> + 'static,
  {
    self.flux.subscribe_with(subscriber);
    if self.subscribed.fetch_add(1, Ordering::AcqRel) + 1 == self.threshold {
      self.flux.connect();
    }
  }
}

/// Handle of one [`connect`](ConnectableFlux::connect) call.
pub struct Connection {
  hub: Arc<dyn Disconnect>,
  epoch: u64,
}

impl Connection {
  /// Cancels the shared upstream subscription. The publisher can be
  /// connected again afterwards; attached subscribers stay attached.
  pub fn dispose(&self) { self.hub.disconnect(self.epoch) }

  pub fn is_disposed(&self) -> bool { !self.hub.is_connected(self.epoch) }
}

trait Disconnect: Send + Sync {
  fn disconnect(&self, epoch: u64);

  fn is_connected(&self, epoch: u64) -> bool;
}

enum Phase {
  Unconnected,
  Connected { upstream: Option<SubscriptionRef> },
  Terminated(Result<(), Error>),
}

struct HubState<T> {
  phase: Phase,
  /// Bumped by every connect; signals from an older upstream are ignored.
  epoch: u64,
  members: Registry<Arc<dyn Emitter<T>>>,
}

struct Hub<T> {
  state: Mutex<HubState<T>>,
}

impl<T> Default for Hub<T> {
  fn default() -> Self {
    Self {
      state: Mutex::new(HubState { phase: Phase::Unconnected, epoch: 0, members: Registry::default() }),
    }
  }
}

impl<T: Clone> Hub<T> {
  /// Sends `value` to the subscribers attached when the round starts.
  fn broadcast(&self, epoch: u64, value: T) {
    let members = {
      let state = lock(&self.state);
      if state.epoch != epoch || !matches!(state.phase, Phase::Connected { .. }) {
        return;
      }
      state.members.snapshot()
    };
    let mut members = members.into_iter().peekable();
    while let Some(member) = members.next() {
      if members.peek().is_some() {
        member.emit(Signal::Next(value.clone()));
      } else {
        member.emit(Signal::Next(value));
        break;
      }
    }
  }

  fn finish(&self, epoch: u64, result: Result<(), Error>) {
    let members = {
      let mut state = lock(&self.state);
      if state.epoch != epoch || !matches!(state.phase, Phase::Connected { .. }) {
        return;
      }
      state.phase = Phase::Terminated(result.clone());
      state.members.take_all()
    };
    tracing::debug!(epoch, subscribers = members.len(), "hot publisher terminated");
    for member in members {
      member.emit(Signal::from(result.clone()));
    }
  }
}

impl<T: Send> Disconnect for Hub<T> {
  fn disconnect(&self, epoch: u64) {
    let upstream = {
      let mut state = lock(&self.state);
      if state.epoch != epoch {
        return;
      }
      match std::mem::replace(&mut state.phase, Phase::Unconnected) {
        Phase::Connected { upstream } => upstream,
        other => {
          state.phase = other;
          return;
        }
      }
    };
    tracing::debug!(epoch, "hot publisher disconnected");
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
  }

  fn is_connected(&self, epoch: u64) -> bool {
    let state = lock(&self.state);
    state.epoch == epoch && matches!(state.phase, Phase::Connected { .. })
  }
}

/// The single upstream subscriber of one connection.
struct HubSubscriber<T> {
  hub: Arc<Hub<T>>,
  epoch: u64,
}

impl<T> Subscriber<T> for HubSubscriber<T>
where
  T: Clone + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let accepted = {
      let mut state = lock(&self.hub.state);
      let current = state.epoch == self.epoch;
      match &mut state.phase {
        Phase::Connected { upstream } if current => {
          *upstream = Some(subscription.clone());
          true
        }
        _ => false,
      }
    };
    if accepted {
      subscription.request(UNBOUNDED);
    } else {
      subscription.cancel();
    }
  }

  fn on_next(&mut self, value: T) { self.hub.broadcast(self.epoch, value) }

  fn on_error(&mut self, err: Error) { self.hub.finish(self.epoch, Err(err)) }

  fn on_complete(&mut self) { self.hub.finish(self.epoch, Ok(())) }
}

/// A subscriber's subscription: cancelling also detaches it from the hub.
struct MemberHandle<T> {
  drain: SubscriptionRef,
  hub: Arc<Hub<T>>,
  key: Key,
}

impl<T> MemberHandle<T> {
  fn detach(&self) { lock(&self.hub.state).members.remove(self.key); }
}

impl<T: Send + 'static> Subscription for MemberHandle<T> {
  fn request(&self, n: u64) {
    self.drain.request(n);
    // `request(0)` terminates the drain.
    if n == 0 {
      self.detach();
    }
  }

  fn cancel(&self) {
    self.drain.cancel();
    self.detach();
  }
}
