use std::any::type_name;
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::atomic::{self, AtomicPtr, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use tracing::{error, trace};

use crate::constants::{
    ERR_BIND_NOT_IDLE, ERR_COUNT_OVERFLOW, ERR_INCREMENT_RELEASED, ERR_OVER_RELEASE,
    ERR_RECLAIM_UNBOUND,
};
use crate::metrics::{DROPPED_ORPHANS, RECLAIMED};
use crate::{IdleStore, ReferenceCountable, Reset};

/// The reference count embedded in every pooled instance.
///
/// A counter is created by a [`CountedPool`][crate::CountedPool] and handed to the pool's factory,
/// which stores it inside the instance it builds. From then on the counter travels with the
/// instance, accounting for how many holders currently share it:
///
/// * While the instance is checked out, the count is at least 1 and the counter holds a
///   back-pointer to the instance it is embedded in. This back-pointer is rebound every time the
///   instance is handed out, never only at construction.
/// * When the count drops to zero, the instance is reset and returned to the idle set of the pool
///   that built it. The back-pointer is cleared.
///
/// The counter only refers to its pool weakly. If the pool has been dropped by the time the last
/// reference is released, the instance is dropped instead of being returned.
///
/// Callers never operate on the counter directly; the operations are exposed through
/// [`Counted<T>`][crate::Counted].
///
/// # Thread safety
///
/// All accounting is done with atomic operations on a single integer, without locks. Only the
/// decrement that observes the transition from 1 to 0 performs the reclamation, and exactly one
/// decrement can observe that transition.
pub struct ReferenceCounter<T> {
    count: AtomicU32,

    /// The idle set that the instance returns to when the count reaches zero.
    destination: Weak<IdleStore<T>>,

    /// Points at the instance this counter is embedded in while the instance is checked out.
    /// Null while the instance is idle.
    instance: AtomicPtr<T>,

    pool_name: &'static str,
}

impl<T> ReferenceCounter<T> {
    #[must_use]
    pub(crate) fn new(destination: Weak<IdleStore<T>>, pool_name: &'static str) -> Self {
        Self {
            count: AtomicU32::new(0),
            destination,
            instance: AtomicPtr::new(ptr::null_mut()),
            pool_name,
        }
    }

    /// Whether this counter returns its instance to the given store.
    #[must_use]
    pub(crate) fn belongs_to(&self, store: &Arc<IdleStore<T>>) -> bool {
        ptr::eq(self.destination.as_ptr(), Arc::as_ptr(store))
    }

    /// Whether the counter's back-pointer currently refers to `instance`.
    ///
    /// This is true for an instance that is checked out from a pool and false for one that is
    /// idle or was never handed out.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};
    ///
    /// struct Slot {
    ///     counter: ReferenceCounter<Self>,
    /// }
    ///
    /// impl Reset for Slot {
    ///     fn reset(&mut self) {}
    /// }
    ///
    /// impl ReferenceCountable for Slot {
    ///     fn reference_counter(&self) -> &ReferenceCounter<Self> {
    ///         &self.counter
    ///     }
    /// }
    ///
    /// let pool = CountedPool::new(|counter| Slot { counter });
    /// let slot = pool.acquire();
    ///
    /// assert!(slot.reference_counter().is_bound_to(&slot));
    ///
    /// // SAFETY: We do not use the handle after releasing our only reference.
    /// unsafe { slot.decrement_reference_count() };
    /// ```
    #[must_use]
    pub fn is_bound_to(&self, instance: &T) -> bool {
        ptr::eq(self.instance.load(Ordering::Relaxed), instance)
    }

    /// Snapshot of the current count.
    #[must_use]
    pub(crate) fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Binds the counter to the instance it is embedded in and accounts for exactly one holder.
    ///
    /// This is called on every acquisition, whether the instance is freshly constructed or reused.
    ///
    /// # Panics
    ///
    /// Panics if the count is not zero. An instance is only ever bound when it is idle.
    pub(crate) fn bind(&self, instance: NonNull<T>) {
        if self
            .count
            .compare_exchange(0, 1, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            self.fatal(ERR_BIND_NOT_IDLE);
        }

        // Publication to other threads happens via whatever mechanism the caller uses to
        // share the handle, which orders this store before any use of the back-pointer.
        self.instance.store(instance.as_ptr(), Ordering::Relaxed);
    }

    pub(crate) fn increment(&self) {
        self.increment_by(1);
    }

    /// Adds `n` holders in a single atomic step.
    ///
    /// # Panics
    ///
    /// Panics if the instance has already been released or if the count would overflow.
    /// The count is restored before panicking.
    pub(crate) fn increment_by(&self, n: u32) {
        if n == 0 {
            return;
        }

        // New holders can only be created from an existing one, which already guarantees the
        // instance stays alive, so no ordering is needed here. Same reasoning as `Arc::clone`.
        let previous = self.count.fetch_add(n, Ordering::Relaxed);

        if previous == 0 {
            self.count.fetch_sub(n, Ordering::Relaxed);
            self.fatal(ERR_INCREMENT_RELEASED);
        }

        if previous.checked_add(n).is_none() {
            self.count.fetch_sub(n, Ordering::Relaxed);
            self.fatal(ERR_COUNT_OVERFLOW);
        }
    }

    /// Removes one holder.
    ///
    /// Returns the pending reclamation if this was the last holder. The caller must complete it
    /// after dropping every reference derived from the instance, including `self`.
    ///
    /// # Panics
    ///
    /// Panics if the count is already zero, or if a concurrent decrement took it to zero first.
    /// The count is restored before panicking and no second reclamation takes place.
    #[must_use]
    pub(crate) fn decrement(&self) -> Option<Reclamation<T>> {
        // Catches the common over-release (sequential double release) before touching the count.
        if self.count.load(Ordering::Relaxed) == 0 {
            self.fatal(ERR_OVER_RELEASE);
        }

        // Adding the two's complement of 1 is a wrapping decrement by 1.
        //
        // Release ensures every use of the instance by this holder happens before the
        // reclamation performed by whichever holder observes the zero crossing.
        let previous = self.count.fetch_add(u32::MAX, Ordering::Release);

        match previous {
            // Another holder raced us past the pre-check and we wrapped around.
            0 => {
                self.count.fetch_add(1, Ordering::Relaxed);
                self.fatal(ERR_OVER_RELEASE);
            }
            1 => {
                // Synchronizes with the Release decrements of all previous holders.
                atomic::fence(Ordering::Acquire);

                let instance = NonNull::new(self.instance.swap(ptr::null_mut(), Ordering::Relaxed))
                    .unwrap_or_else(|| self.fatal(ERR_RECLAIM_UNBOUND));

                Some(Reclamation {
                    instance,
                    destination: self.destination.upgrade(),
                    pool_name: self.pool_name,
                })
            }
            _ => None,
        }
    }

    #[cold]
    #[inline(never)]
    fn fatal(&self, message: &'static str) -> ! {
        error!(
            pool = self.pool_name,
            count = self.count.load(Ordering::Relaxed),
            "{message}"
        );

        panic!("{message}");
    }
}

impl<T> fmt::Debug for ReferenceCounter<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("count", &self.count.load(Ordering::Relaxed))
            .field("bound", &!self.instance.load(Ordering::Relaxed).is_null())
            .field("pool_name", &self.pool_name)
            .finish_non_exhaustive()
    }
}

/// The work that remains after the last holder of an instance has released it.
///
/// Produced by [`ReferenceCounter::decrement()`] so that the reset can run once no reference
/// into the instance remains.
#[must_use]
pub(crate) struct Reclamation<T> {
    instance: NonNull<T>,
    destination: Option<Arc<IdleStore<T>>>,
    pool_name: &'static str,
}

impl<T: Reset> Reclamation<T> {
    /// Resets the instance and returns it to the idle set it came from, or drops it if the
    /// pool no longer exists.
    ///
    /// # Safety
    ///
    /// No reference to the instance may be alive, and none may be created from any handle to
    /// the instance after this is called.
    pub(crate) unsafe fn complete(self) {
        // SAFETY: The back-pointer was created from a leaked box when the instance was bound.
        // The count reached zero, so no holder remains, and the caller guarantees no reference
        // into the instance is alive. We therefore have exclusive ownership of the allocation.
        let mut instance = unsafe { Box::from_raw(self.instance.as_ptr()) };

        instance.reset();

        if let Some(store) = self.destination {
            store.give_back(instance);

            RECLAIMED.with(|e| e.observe_once());
            trace!(pool = self.pool_name, "instance reset and returned to idle set");
        } else {
            drop(instance);

            DROPPED_ORPHANS.with(|e| e.observe_once());
            trace!(pool = self.pool_name, "pool is gone, dropped released instance");
        }
    }
}

/// Releases one reference held on a checked-out instance, reclaiming the instance if this was
/// the last one.
///
/// # Safety
///
/// `instance` must point to an instance that was handed out by a pool and is still checked out,
/// and the caller must own one of the references being counted. If this releases the last
/// reference, no reference to the instance may be created afterwards.
pub(crate) unsafe fn release<T: ReferenceCountable>(instance: NonNull<T>) {
    // SAFETY: The caller owns a reference, so the instance is alive. The shared reference we
    // create here ends at the end of the statement, before any reclamation takes place.
    let reclamation = unsafe { instance.as_ref() }.reference_counter().decrement();

    if let Some(reclamation) = reclamation {
        // SAFETY: We held the last reference and our own borrow ended above. The caller
        // guarantees no other reference is used after releasing the last one.
        unsafe { reclamation.complete() };
    }
}
