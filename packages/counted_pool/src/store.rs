use std::any::type_name;
use std::fmt;

use crossbeam::queue::SegQueue;

/// The set of idle instances belonging to one pool.
///
/// Unordered and unbounded. Instances are boxed so that their address stays stable while they
/// are checked out, which is what allows a counter to keep a back-pointer to its instance.
///
/// Both operations are lock-free and may be called from any number of threads at once. The
/// queue also serves as the synchronization point between a releasing thread that gives an
/// instance back and the acquiring thread that later takes it out.
pub(crate) struct IdleStore<T> {
    name: &'static str,
    idle: SegQueue<Box<T>>,
}

impl<T> IdleStore<T> {
    #[must_use]
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            idle: SegQueue::new(),
        }
    }

    /// The name of the pool that owns this store, for log events.
    #[must_use]
    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Takes any one idle instance, if there is one.
    #[must_use]
    pub(crate) fn take(&self) -> Option<Box<T>> {
        self.idle.pop()
    }

    /// Returns an instance to the idle set. The caller is responsible for having reset it.
    pub(crate) fn give_back(&self, instance: Box<T>) {
        self.idle.push(instance);
    }

    /// Number of idle instances. This is a snapshot that may be outdated as soon as it returns.
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.idle.len()
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }
}

impl<T> fmt::Debug for IdleStore<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("name", &self.name)
            .field("idle", &self.idle.len())
            .finish()
    }
}
