#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A thread-safe object pool with explicit reference counting.
//!
//! This crate provides [`CountedPool`], a pool of reusable instances that callers borrow, share
//! between concurrent holders by incrementing a reference count, and release by decrementing it.
//! When the count of an instance reaches zero, the instance is reset to a pristine state and
//! returned to the pool, ready to be handed out again without reallocating.
//!
//! # Key Features
//!
//! - **Explicit accounting**: Holders call [`increment_reference_count()`][1] and
//!   [`decrement_reference_count()`][2] (plus by-N variants) on a [`Counted<T>`] handle.
//! - **Lock-free**: Accounting is a single atomic integer per instance; the idle set is a
//!   lock-free queue. Nothing blocks.
//! - **Reset on reuse**: Every instance is reset through the [`Reset`] trait when its last
//!   reference is released, so a new holder never observes data left by a previous one.
//! - **Over-release detection**: Releasing an instance more times than it was acquired and
//!   shared is a fatal usage error that panics instead of resetting the instance a second time.
//! - **Lazy construction**: Instances are constructed by a user-supplied factory only when the
//!   pool has no idle instance, optionally ahead of time via prewarming.
//!
//! # Pooled types
//!
//! A pooled type embeds the [`ReferenceCounter`] that the pool hands to its factory, implements
//! [`Reset`] to wipe its domain state and implements [`ReferenceCountable`] to expose the counter.
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};
//!
//! struct Reading {
//!     celsius: AtomicU32,
//!     counter: ReferenceCounter<Self>,
//! }
//!
//! impl Reset for Reading {
//!     fn reset(&mut self) {
//!         *self.celsius.get_mut() = 0;
//!     }
//! }
//!
//! impl ReferenceCountable for Reading {
//!     fn reference_counter(&self) -> &ReferenceCounter<Self> {
//!         &self.counter
//!     }
//! }
//!
//! let pool = CountedPool::new(|counter| Reading {
//!     celsius: AtomicU32::new(0),
//!     counter,
//! });
//!
//! let reading = pool.acquire();
//! reading.celsius.store(42, Ordering::Relaxed);
//!
//! // SAFETY: This was our only reference and we do not use the handle afterwards.
//! unsafe { reading.decrement_reference_count() };
//!
//! // The same instance comes back, reset to its pristine state.
//! let reading = pool.acquire();
//! assert_eq!(reading.celsius.load(Ordering::Relaxed), 0);
//!
//! // SAFETY: This was our only reference and we do not use the handle afterwards.
//! unsafe { reading.decrement_reference_count() };
//! ```
//!
//! # Logging and metrics
//!
//! Pool activity is reported through [`tracing`](https://docs.rs/tracing) events and counted in
//! [`nm`](https://docs.rs/nm) events named `counted_pool_*`. Neither is configured by this crate.
//!
//! [1]: Counted::increment_reference_count
//! [2]: Counted::decrement_reference_count

mod builder;
mod constants;
mod counted;
mod counter;
mod metrics;
mod pool;
mod reset;
mod store;

pub use builder::*;
pub use counted::*;
pub use counter::ReferenceCounter;
pub use pool::CountedPool;
pub use reset::*;
pub(crate) use store::*;
