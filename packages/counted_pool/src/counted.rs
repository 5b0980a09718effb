use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::ReferenceCountable;
use crate::counter::release;

/// Handle to an instance checked out from a [`CountedPool`][crate::CountedPool].
///
/// Every handle returned by [`acquire()`][crate::CountedPool::acquire] starts out representing
/// exactly one reference. Handles are [`Copy`]; copying a handle does not change the count.
/// Accounting is explicit:
///
/// * Before handing the instance to another concurrent holder, call
///   [`increment_reference_count()`](Self::increment_reference_count) (or the by-N variant).
/// * When a holder is done with the instance, it calls
///   [`decrement_reference_count()`](Self::decrement_reference_count) (or the by-N variant).
///
/// When the last reference is released, the instance is reset and returned to the pool for reuse.
/// Every increment must be matched by exactly one decrement: a missing decrement leaks the
/// instance, an extra decrement is a fatal usage error that panics.
///
/// The handle provides shared access to the instance via [`Deref`]. Types that need to be mutated
/// while shared must use interior mutability, exactly as they would behind an `Arc`.
///
/// # Thread safety
///
/// This type is thread-safe ([`Send`] + [`Sync`]) if and only if `T` is [`Send`] + [`Sync`].
/// The instance may be reset and returned to the pool on whichever thread releases the last
/// reference.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::thread;
///
/// use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};
///
/// struct Tally {
///     total: AtomicU64,
///     counter: ReferenceCounter<Self>,
/// }
///
/// impl Reset for Tally {
///     fn reset(&mut self) {
///         *self.total.get_mut() = 0;
///     }
/// }
///
/// impl ReferenceCountable for Tally {
///     fn reference_counter(&self) -> &ReferenceCounter<Self> {
///         &self.counter
///     }
/// }
///
/// let pool = CountedPool::new(|counter| Tally {
///     total: AtomicU64::new(0),
///     counter,
/// });
///
/// let tally = pool.acquire();
///
/// // One reference for the worker thread, on top of the one we already hold.
/// tally.increment_reference_count();
///
/// thread::spawn(move || {
///     tally.total.fetch_add(10, Ordering::Relaxed);
///
///     // SAFETY: The worker does not use its copy of the handle after releasing its reference.
///     unsafe { tally.decrement_reference_count() };
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(tally.total.load(Ordering::Relaxed), 10);
///
/// // SAFETY: This is our last use of the handle.
/// unsafe { tally.decrement_reference_count() };
///
/// assert_eq!(pool.idle_count(), 1);
/// ```
pub struct Counted<T> {
    ptr: NonNull<T>,

    _owns_some: PhantomData<T>,
}

impl<T: ReferenceCountable> Counted<T> {
    /// Takes ownership of an idle instance and binds it to its counter with a count of 1.
    ///
    /// # Panics
    ///
    /// Panics if the instance's count is not zero.
    #[must_use]
    pub(crate) fn check_out(instance: Box<T>) -> Self {
        let ptr = NonNull::from(Box::leak(instance));

        // SAFETY: We just leaked the box, so the pointer is valid and nothing else refers to it.
        unsafe { ptr.as_ref() }.reference_counter().bind(ptr);

        Self {
            ptr,
            _owns_some: PhantomData,
        }
    }

    /// Adds one reference to the instance.
    ///
    /// Call this before handing the instance to an additional holder. The new holder becomes
    /// responsible for one matching call to
    /// [`decrement_reference_count()`](Self::decrement_reference_count).
    ///
    /// # Panics
    ///
    /// Panics if the instance has already been released or if the count would overflow.
    #[inline]
    pub fn increment_reference_count(&self) {
        self.reference_counter().increment();
    }

    /// Adds `n` references to the instance in a single atomic step.
    ///
    /// Equivalent to calling [`increment_reference_count()`](Self::increment_reference_count)
    /// `n` times. Passing zero has no effect.
    ///
    /// # Panics
    ///
    /// Panics if the instance has already been released or if the count would overflow.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};
    ///
    /// struct Frame {
    ///     counter: ReferenceCounter<Self>,
    /// }
    ///
    /// impl Reset for Frame {
    ///     fn reset(&mut self) {}
    /// }
    ///
    /// impl ReferenceCountable for Frame {
    ///     fn reference_counter(&self) -> &ReferenceCounter<Self> {
    ///         &self.counter
    ///     }
    /// }
    ///
    /// let pool = CountedPool::new(|counter| Frame { counter });
    /// let frame = pool.acquire();
    ///
    /// // Fan out to three subscribers.
    /// frame.increment_reference_count_by_n(3);
    /// assert_eq!(frame.reference_count(), 4);
    ///
    /// // SAFETY: We release all four references at once and do not use the handle afterwards.
    /// unsafe { frame.decrement_reference_count_by_n(4) };
    /// assert_eq!(pool.idle_count(), 1);
    /// ```
    #[inline]
    pub fn increment_reference_count_by_n(&self, n: u32) {
        self.reference_counter().increment_by(n);
    }

    /// Releases one reference to the instance.
    ///
    /// If this was the last reference, the instance is reset and returned to the pool on the
    /// current thread. If the pool has been dropped in the meantime, the instance is dropped.
    ///
    /// # Safety
    ///
    /// The caller must own the reference being released. After the last reference has been
    /// released, neither this handle nor any copy of it may be used again (other than for a
    /// further decrement, which is detected as an over-release as long as the pool is alive),
    /// because the instance may have been reset and handed out to another caller.
    ///
    /// # Panics
    ///
    /// Panics if the reference count is already zero, which means the instance was released
    /// more times than it was acquired and shared. No second reset takes place in that case.
    #[inline]
    pub unsafe fn decrement_reference_count(&self) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe { release(self.ptr) };
    }

    /// Releases `n` references to the instance.
    ///
    /// This is equivalent to `n` sequential calls to
    /// [`decrement_reference_count()`](Self::decrement_reference_count). Passing zero has
    /// no effect.
    ///
    /// # Safety
    ///
    /// The caller must own all `n` references being released. The same rules as for
    /// [`decrement_reference_count()`](Self::decrement_reference_count) apply once the last
    /// reference has been released.
    ///
    /// # Panics
    ///
    /// Panics if the reference count reaches zero before all `n` references have been released.
    /// The instance is reclaimed exactly once, at the decrement that reaches zero.
    pub unsafe fn decrement_reference_count_by_n(&self, n: u32) {
        for _ in 0..n {
            // SAFETY: Forwarding the caller's guarantees. An excess decrement after the
            // instance was reclaimed is detected by the counter while the pool is alive.
            unsafe { release(self.ptr) };
        }
    }

    /// Returns the current reference count.
    ///
    /// This is a snapshot intended for diagnostics and tests; other holders may change
    /// it at any time.
    #[must_use]
    #[inline]
    pub fn reference_count(&self) -> u32 {
        self.reference_counter().count()
    }
}

impl<T> Counted<T> {
    /// Returns a pointer to the checked-out instance.
    ///
    /// The pointer is valid for as long as the caller holds a reference to the instance.
    #[must_use]
    #[inline]
    pub fn ptr(&self) -> NonNull<T> {
        self.ptr
    }
}

impl<T> Deref for Counted<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // SAFETY: A usable handle implies the caller holds a reference, which keeps the
        // instance checked out and alive. Using a handle after releasing the last reference
        // is excluded by the safety contract of the decrement methods.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> Copy for Counted<T> {}

impl<T> Clone for Counted<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Counted<T> {
    /// Two handles are equal if they refer to the same instance.
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for Counted<T> {}

impl<T> fmt::Debug for Counted<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("ptr", &self.ptr)
            .finish()
    }
}

// SAFETY: The handle only provides shared access to `T`, so sharing it across threads requires
// `T: Sync`. Releasing the last reference resets and moves the instance on the releasing thread,
// which requires `T: Send`.
unsafe impl<T: Send + Sync> Send for Counted<T> {}

// SAFETY: See `Send` above; `&Counted<T>` offers the same capabilities as `Counted<T>`.
unsafe impl<T: Send + Sync> Sync for Counted<T> {}
