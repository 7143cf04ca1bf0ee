//! Request admission for Turnstile.
//!
//! This crate decides whether a caller may invoke a protected operation:
//! - Callers are identified by network address and authenticated principal
//! - Requests are counted per caller and operation in a shared store, inside
//!   a window that every request refreshes
//! - Callers far over their limit get their whole address blacklisted
//!
//! Counts live in Redis when several instances serve traffic, or in memory
//! for a single instance.

#![deny(missing_docs)]

mod annotate;
mod blacklist;
mod counter;
mod error;
mod guard;
mod request;
mod storage;
mod threshold;
mod tracker;

pub use annotate::{Annotations, Field, ResponseAnnotator};
pub use blacklist::BlacklistStore;
pub use counter::WindowedCounter;
pub use error::RateLimitError;
pub use guard::{Admission, Guard};
pub use request::{RateLimitRequest, RateLimitRequestBuilder};
pub use storage::{CounterStore, InMemoryStorage, RedisStorage, StorageError};
pub use threshold::{ThresholdEvaluator, Verdict};
pub use tracker::{ANONYMOUS, Tracker};
