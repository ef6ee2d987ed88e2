//! # rxflux: backpressured reactive streams
//!
//! Publishers of zero to many items ([`flux`]) and of at most one item
//! ([`mono`]), composed with operators and consumed on demand.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxflux::prelude::*;
//!
//! flux::range(0, 10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 2)
//!   .subscribe(|v| println!("Value: {}", v));
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Publisher`] | Produces a sequence; every subscription is driven by demand |
//! | [`Subscriber`] | Consumes `on_next`, `on_error` and `on_complete` |
//! | [`Subscription`] | `request(n)` more items or `cancel()` |
//! | [`ConnectableFlux`] | A hot publisher shared by many subscribers |
//! | [`StepVerifier`] | Scripted checks, optionally in virtual time |
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): timer tasks run on a `futures`
//!   thread pool instead of the timer thread
//!
//! [`Publisher`]: publisher::Publisher
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`ConnectableFlux`]: connectable::ConnectableFlux
//! [`StepVerifier`]: verifier::StepVerifier

pub mod connectable;
pub mod error;
pub mod flux;
pub mod hooks;
pub mod mono;
pub mod ops;
pub mod prelude;
pub mod publisher;
pub mod rc;
pub mod scheduler;
pub mod signal;
pub mod subscriber;
pub mod subscription;
pub mod verifier;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorKind};
