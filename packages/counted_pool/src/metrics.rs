//! Metrics for pool traffic.
//!
//! These are plain counters shared by every pool in the process. They tell apart acquisitions
//! served from the idle set from acquisitions that had to construct a new instance, which is
//! the number that matters when judging whether a pool is doing its job.

use nm::Event;

thread_local! {
    /// An acquisition found the idle set empty and constructed a new instance.
    pub(crate) static CONSTRUCTED: Event = Event::builder()
        .name("counted_pool_constructed")
        .build();

    /// An acquisition was served by an idle instance.
    pub(crate) static REUSED: Event = Event::builder()
        .name("counted_pool_reused")
        .build();

    /// The last reference to an instance was released and the instance went back to the idle set.
    pub(crate) static RECLAIMED: Event = Event::builder()
        .name("counted_pool_reclaimed")
        .build();

    /// The last reference to an instance was released after its pool was dropped, so the
    /// instance was dropped instead of being returned.
    pub(crate) static DROPPED_ORPHANS: Event = Event::builder()
        .name("counted_pool_dropped_orphans")
        .build();
}
