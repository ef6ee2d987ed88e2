//! Operator types returned by [`PublisherExt`](crate::publisher::PublisherExt).
//!
//! Each operator wraps its upstream publisher and subscribes to it with a
//! subscriber of its own when it is subscribed to.

pub mod combine_latest;
pub mod concat;
pub mod delay;
pub mod filter;
pub mod flat_map;
pub mod lifecycle;
pub mod map;
pub mod merge;
pub mod on_error;
pub mod switch_if_empty;
pub mod take;
pub mod zip;
