use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::BuildHasher;

use crate::ReferenceCounter;

/// A value that can be restored to a pristine, reusable state.
///
/// The pool calls [`reset()`](Reset::reset) every time the last reference to a pooled instance is
/// released, immediately before the instance returns to the idle set. The next caller to acquire
/// the instance must not be able to observe anything written by previous holders.
///
/// Implementations are given exclusive access and must not panic under normal conditions.
/// A reset that leaves residual data behind is a logic error that leaks state between
/// unrelated holders of the same instance.
///
/// Implementations for common standard library containers are provided so that composite
/// types can delegate to them field by field.
///
/// # Example
///
/// ```rust
/// use counted_pool::Reset;
///
/// struct Scratch {
///     lines: Vec<String>,
///     label: Option<String>,
/// }
///
/// impl Reset for Scratch {
///     fn reset(&mut self) {
///         self.lines.reset();
///         self.label.reset();
///     }
/// }
///
/// let mut scratch = Scratch {
///     lines: vec!["a".to_string()],
///     label: Some("b".to_string()),
/// };
/// scratch.reset();
///
/// assert!(scratch.lines.is_empty());
/// assert!(scratch.label.is_none());
/// ```
pub trait Reset {
    /// Restores the value to its pristine default state, erasing all prior data.
    fn reset(&mut self);
}

/// A poolable value that embeds its own [`ReferenceCounter`].
///
/// The counter is handed to the pool's factory when the instance is first constructed; the
/// factory must store it inside the value it returns and this method must return that same
/// counter for the entire lifetime of the value.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// use counted_pool::{ReferenceCountable, ReferenceCounter, Reset};
///
/// struct Connection {
///     bytes_sent: AtomicU64,
///     counter: ReferenceCounter<Self>,
/// }
///
/// impl Reset for Connection {
///     fn reset(&mut self) {
///         *self.bytes_sent.get_mut() = 0;
///     }
/// }
///
/// impl ReferenceCountable for Connection {
///     fn reference_counter(&self) -> &ReferenceCounter<Self> {
///         &self.counter
///     }
/// }
/// ```
pub trait ReferenceCountable: Reset + Sized {
    /// Returns the reference counter embedded in this value.
    fn reference_counter(&self) -> &ReferenceCounter<Self>;
}

impl<T> Reset for Vec<T> {
    #[inline]
    fn reset(&mut self) {
        self.clear();
    }
}

impl<T> Reset for VecDeque<T> {
    #[inline]
    fn reset(&mut self) {
        self.clear();
    }
}

impl Reset for String {
    #[inline]
    fn reset(&mut self) {
        self.clear();
    }
}

impl<K, V, S: BuildHasher> Reset for HashMap<K, V, S> {
    #[inline]
    fn reset(&mut self) {
        self.clear();
    }
}

impl<K, V> Reset for BTreeMap<K, V> {
    #[inline]
    fn reset(&mut self) {
        self.clear();
    }
}

impl<T> Reset for Option<T> {
    #[inline]
    fn reset(&mut self) {
        *self = None;
    }
}
