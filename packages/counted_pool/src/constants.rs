// Each of these indicates a caller violated the increment/decrement pairing contract. Continuing
// would let a reset instance be observed by a holder that still believes it owns it, so we panic.
pub(crate) const ERR_OVER_RELEASE: &str = "reference count decremented below zero - an instance \
    was released more times than it was acquired or shared";

pub(crate) const ERR_COUNT_OVERFLOW: &str = "reference count overflowed u32 - an instance was \
    shared more times than can be represented";

pub(crate) const ERR_INCREMENT_RELEASED: &str = "reference count incremented on an instance that \
    has already been released back to the pool";

pub(crate) const ERR_BIND_NOT_IDLE: &str = "attempted to hand out an instance whose reference \
    count is not zero - an idle instance was shared after being released";

pub(crate) const ERR_RECLAIM_UNBOUND: &str = "reference count reached zero on an instance that \
    is not bound to its counter - the instance was never handed out by a pool";

pub(crate) const ERR_FOREIGN_COUNTER: &str = "the factory returned an instance that does not \
    embed the reference counter it was given";
