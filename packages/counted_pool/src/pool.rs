use std::any::type_name;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::constants::ERR_FOREIGN_COUNTER;
use crate::metrics::{CONSTRUCTED, REUSED};
use crate::{Counted, CountedPoolBuilder, IdleStore, ReferenceCountable, ReferenceCounter};

/// Builds a new instance around the counter it is given.
pub(crate) type Factory<T, E> = dyn Fn(ReferenceCounter<T>) -> Result<T, E> + Send + Sync;

/// A thread-safe pool of reusable, explicitly reference-counted instances.
///
/// [`acquire()`](Self::acquire) hands out an instance with a reference count of 1, taking an idle
/// instance if one is available and constructing a new one via the factory otherwise. Holders
/// share the instance by incrementing its count and release it by decrementing it (see
/// [`Counted<T>`]). When the count reaches zero, the instance is reset and becomes idle again.
///
/// The pool never blocks and has no capacity limit: it is a cache of idle instances, not a
/// limiter. Acquisition and release are lock-free.
///
/// This type acts as a cloneable handle to a shared pool. Instances that are still checked out
/// when the last pool handle is dropped are dropped (instead of returned) when their last
/// reference is released.
///
/// # Fallible construction
///
/// A pool whose factory can fail is created with [`new_fallible()`](Self::new_fallible) and
/// acquired from with [`try_acquire()`](Self::try_acquire), which returns the factory's error
/// unchanged. The pool does not retry.
///
/// # Example
///
/// ```rust
/// use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};
///
/// struct Buffer {
///     bytes: Vec<u8>,
///     counter: ReferenceCounter<Self>,
/// }
///
/// impl Reset for Buffer {
///     fn reset(&mut self) {
///         self.bytes.clear();
///     }
/// }
///
/// impl ReferenceCountable for Buffer {
///     fn reference_counter(&self) -> &ReferenceCounter<Self> {
///         &self.counter
///     }
/// }
///
/// let pool = CountedPool::new(|counter| Buffer {
///     bytes: Vec::with_capacity(4096),
///     counter,
/// });
///
/// let buffer = pool.acquire();
/// assert_eq!(buffer.reference_count(), 1);
/// assert!(buffer.bytes.capacity() >= 4096);
///
/// // SAFETY: We do not use the handle after releasing our only reference.
/// unsafe { buffer.decrement_reference_count() };
///
/// assert_eq!(pool.idle_count(), 1);
/// ```
pub struct CountedPool<T, E = Infallible> {
    core: Arc<PoolCore<T, E>>,
}

struct PoolCore<T, E> {
    store: Arc<IdleStore<T>>,
    factory: Box<Factory<T, E>>,
}

impl<T: ReferenceCountable> CountedPool<T, Infallible> {
    /// Creates a pool that constructs instances with an infallible factory.
    ///
    /// The factory receives a fresh [`ReferenceCounter`] bound to this pool and must embed it in
    /// the instance it returns. The factory runs once per backing instance, the first time the
    /// pool has no idle instance to hand out. It must not touch the reference count itself.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};
    ///
    /// struct Message {
    ///     body: String,
    ///     counter: ReferenceCounter<Self>,
    /// }
    ///
    /// impl Reset for Message {
    ///     fn reset(&mut self) {
    ///         self.body.clear();
    ///     }
    /// }
    ///
    /// impl ReferenceCountable for Message {
    ///     fn reference_counter(&self) -> &ReferenceCounter<Self> {
    ///         &self.counter
    ///     }
    /// }
    ///
    /// let pool = CountedPool::new(|counter| Message {
    ///     body: String::new(),
    ///     counter,
    /// });
    /// ```
    #[must_use]
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(ReferenceCounter<T>) -> T + Send + Sync + 'static,
    {
        Self::from_parts(
            type_name::<T>(),
            Box::new(move |counter: ReferenceCounter<T>| Ok::<T, Infallible>(factory(counter))),
        )
    }

    /// Returns a builder for creating a [`CountedPool`] with custom configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};
    ///
    /// struct Job {
    ///     counter: ReferenceCounter<Self>,
    /// }
    ///
    /// impl Reset for Job {
    ///     fn reset(&mut self) {}
    /// }
    ///
    /// impl ReferenceCountable for Job {
    ///     fn reference_counter(&self) -> &ReferenceCounter<Self> {
    ///         &self.counter
    ///     }
    /// }
    ///
    /// let pool = CountedPool::builder()
    ///     .name("jobs")
    ///     .prewarm(8)
    ///     .build(|counter| Job { counter });
    ///
    /// assert_eq!(pool.name(), "jobs");
    /// assert_eq!(pool.idle_count(), 8);
    /// ```
    pub fn builder() -> CountedPoolBuilder<T> {
        CountedPoolBuilder::new()
    }

    /// Acquires an instance with a reference count of 1.
    ///
    /// An idle instance is reused if one is available; otherwise a new instance is constructed.
    /// In both cases the instance is in its pristine state: reused instances were reset when
    /// their last reference was released.
    ///
    /// This never blocks and never fails.
    #[must_use]
    pub fn acquire(&self) -> Counted<T> {
        let Ok(counted) = self.try_acquire();
        counted
    }

    /// Constructs `count` instances up front and makes them idle, so that the next `count`
    /// acquisitions do not need to construct anything.
    pub fn prewarm(&self, count: usize) {
        let Ok(()) = self.try_prewarm(count);
    }
}

impl<T: ReferenceCountable, E> CountedPool<T, E> {
    /// Creates a pool whose factory may fail.
    ///
    /// Factory failures are returned as-is from [`try_acquire()`](Self::try_acquire) and
    /// [`try_prewarm()`](Self::try_prewarm).
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};
    ///
    /// struct Socket {
    ///     counter: ReferenceCounter<Self>,
    /// }
    ///
    /// impl Reset for Socket {
    ///     fn reset(&mut self) {}
    /// }
    ///
    /// impl ReferenceCountable for Socket {
    ///     fn reference_counter(&self) -> &ReferenceCounter<Self> {
    ///         &self.counter
    ///     }
    /// }
    ///
    /// let pool = CountedPool::new_fallible(|_counter| Err::<Socket, _>("no ports left"));
    ///
    /// assert_eq!(pool.try_acquire().unwrap_err(), "no ports left");
    /// ```
    #[must_use]
    pub fn new_fallible<F>(factory: F) -> Self
    where
        F: Fn(ReferenceCounter<T>) -> Result<T, E> + Send + Sync + 'static,
    {
        Self::from_parts(type_name::<T>(), Box::new(factory))
    }

    #[must_use]
    pub(crate) fn from_parts(name: &'static str, factory: Box<Factory<T, E>>) -> Self {
        debug!(pool = name, "created pool");

        Self {
            core: Arc::new(PoolCore {
                store: Arc::new(IdleStore::new(name)),
                factory,
            }),
        }
    }

    /// Acquires an instance with a reference count of 1, constructing one if the pool has no
    /// idle instance.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if a new instance had to be constructed and the factory
    /// failed. Nothing is retried and the pool state is unchanged.
    pub fn try_acquire(&self) -> Result<Counted<T>, E> {
        let instance = match self.core.store.take() {
            Some(idle) => {
                REUSED.with(|e| e.observe_once());
                trace!(pool = self.name(), "reusing idle instance");
                idle
            }
            None => {
                let constructed = self.core.construct()?;
                trace!(pool = self.name(), "constructed new instance");
                constructed
            }
        };

        Ok(Counted::check_out(instance))
    }

    /// Constructs `count` instances up front and makes them idle.
    ///
    /// # Errors
    ///
    /// Returns the first factory error. Instances constructed before the failure remain idle
    /// in the pool.
    pub fn try_prewarm(&self, count: usize) -> Result<(), E> {
        for _ in 0..count {
            let instance = self.core.construct()?;
            self.core.store.give_back(instance);
        }

        debug!(pool = self.name(), count, "prewarmed pool");

        Ok(())
    }

    /// Returns the number of idle instances waiting to be reused.
    ///
    /// This is a snapshot; concurrent acquisitions and releases may change it at any time.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.core.store.len()
    }

    /// Returns whether at least one idle instance is waiting to be reused.
    ///
    /// This is a snapshot; concurrent acquisitions and releases may change it at any time.
    #[must_use]
    pub fn has_idle(&self) -> bool {
        !self.core.store.is_empty()
    }

    /// Returns the name of the pool, as used in log events.
    ///
    /// Defaults to the name of the pooled type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.core.store.name()
    }
}

impl<T: ReferenceCountable, E> PoolCore<T, E> {
    fn construct(&self) -> Result<Box<T>, E> {
        let counter = ReferenceCounter::new(Arc::downgrade(&self.store), self.store.name());

        let instance = Box::new((self.factory)(counter)?);

        assert!(
            instance.reference_counter().belongs_to(&self.store),
            "{ERR_FOREIGN_COUNTER}"
        );

        CONSTRUCTED.with(|e| e.observe_once());

        Ok(instance)
    }
}

impl<T, E> Drop for PoolCore<T, E> {
    fn drop(&mut self) {
        debug!(
            pool = self.store.name(),
            idle = self.store.len(),
            "dropping pool"
        );
    }
}

impl<T, E> Clone for CountedPool<T, E> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T, E> fmt::Debug for CountedPool<T, E> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("store", &self.core.store)
            .finish_non_exhaustive()
    }
}
