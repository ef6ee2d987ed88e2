//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Factories
pub use crate::{flux, mono};
// Core traits
pub use crate::{
  publisher::{BoxedPublisher, Publisher, PublisherExt},
  subscriber::{Disposable, Subscriber},
  subscription::{Subscription, SubscriptionRef, UNBOUNDED},
};
// Signals and errors
pub use crate::{
  error::{Error, ErrorKind},
  hooks,
  signal::{Signal, SignalKind},
};
// Hot publishing
pub use crate::connectable::{ConnectableFlux, Connection};
pub use crate::flux::FluxSink;
// Schedulers
pub use crate::scheduler::{Scheduler, SchedulerRef, TimerScheduler, VirtualTimeScheduler};
// Verification
pub use crate::verifier::{StepVerifier, VerifyError};
