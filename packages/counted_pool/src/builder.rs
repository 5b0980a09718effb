use std::any::type_name;
use std::cell::Cell;
use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;

use crate::{CountedPool, ReferenceCountable, ReferenceCounter};

/// Builder for creating an instance of [`CountedPool`].
///
/// All settings are optional. The factory is provided when building, via either
/// [`build()`](Self::build) for infallible factories or [`try_build()`](Self::try_build) for
/// factories that can fail.
///
/// # Examples
///
/// ```
/// use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};
///
/// struct Packet {
///     payload: Vec<u8>,
///     counter: ReferenceCounter<Self>,
/// }
///
/// impl Reset for Packet {
///     fn reset(&mut self) {
///         self.payload.clear();
///     }
/// }
///
/// impl ReferenceCountable for Packet {
///     fn reference_counter(&self) -> &ReferenceCounter<Self> {
///         &self.counter
///     }
/// }
///
/// let pool = CountedPool::builder()
///     .name("packets")
///     .prewarm(16)
///     .build(|counter| Packet {
///         payload: Vec::with_capacity(1500),
///         counter,
///     });
///
/// assert_eq!(pool.idle_count(), 16);
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) and can be safely transferred between threads,
/// allowing pool configuration to happen on different threads than where the pool is used.
/// However, it is not thread-safe ([`Sync`]) as it contains mutable configuration state.
#[must_use]
pub struct CountedPoolBuilder<T> {
    name: Option<&'static str>,
    prewarm: usize,

    _item: PhantomData<fn() -> T>,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl<T: ReferenceCountable> CountedPoolBuilder<T> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            name: None,
            prewarm: 0,
            _item: PhantomData,
            _not_sync: PhantomData,
        }
    }

    /// Sets the name the pool uses to identify itself in log events.
    ///
    /// Defaults to the name of the pooled type.
    #[inline]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Sets how many instances to construct and make idle when the pool is built.
    ///
    /// Defaults to zero, meaning instances are only constructed on demand.
    #[inline]
    pub fn prewarm(mut self, count: usize) -> Self {
        self.prewarm = count;
        self
    }

    /// Builds the pool around an infallible factory.
    ///
    /// The factory receives a fresh [`ReferenceCounter`] bound to the new pool and must embed
    /// it in the instance it returns.
    #[must_use]
    pub fn build<F>(self, factory: F) -> CountedPool<T>
    where
        F: Fn(ReferenceCounter<T>) -> T + Send + Sync + 'static,
    {
        let Ok(pool) = self.try_build(move |counter| Ok::<T, Infallible>(factory(counter)));
        pool
    }

    /// Builds the pool around a factory that may fail.
    ///
    /// # Errors
    ///
    /// Returns the first factory error raised while prewarming. No pool is returned in that case.
    ///
    /// # Example
    ///
    /// ```
    /// use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};
    ///
    /// struct Lease {
    ///     counter: ReferenceCounter<Self>,
    /// }
    ///
    /// impl Reset for Lease {
    ///     fn reset(&mut self) {}
    /// }
    ///
    /// impl ReferenceCountable for Lease {
    ///     fn reference_counter(&self) -> &ReferenceCounter<Self> {
    ///         &self.counter
    ///     }
    /// }
    ///
    /// let result = CountedPool::builder()
    ///     .prewarm(1)
    ///     .try_build(|_counter| Err::<Lease, _>("lease server unavailable"));
    ///
    /// assert_eq!(result.unwrap_err(), "lease server unavailable");
    /// ```
    pub fn try_build<E, F>(self, factory: F) -> Result<CountedPool<T, E>, E>
    where
        F: Fn(ReferenceCounter<T>) -> Result<T, E> + Send + Sync + 'static,
    {
        let name = self.name.unwrap_or_else(type_name::<T>);

        let pool = CountedPool::from_parts(name, Box::new(factory));
        pool.try_prewarm(self.prewarm)?;

        Ok(pool)
    }
}

impl<T> fmt::Debug for CountedPoolBuilder<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("name", &self.name)
            .field("prewarm", &self.prewarm)
            .finish()
    }
}
