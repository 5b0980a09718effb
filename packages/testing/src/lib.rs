#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for tests and benchmarks of the pool packages.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

/// Runs a test with a timeout so that a lost wakeup or a stuck spin loop in a multithreaded
/// test fails the test instead of hanging the build.
///
/// The timeout is 10 seconds under normal conditions and 60 seconds under Miri, where thread
/// synchronization primitives are significantly slower.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled and
/// the test function is executed directly. This allows mutation testing to properly detect
/// hanging mutations.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode). A panic inside
/// the test is propagated unchanged.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let sum = with_watchdog(|| 2 + 2);
/// assert_eq!(sum, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // If this fails, the receiver has already given up on us.
        drop(tx.send(result));
    });

    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded {timeout:?} timeout");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("test thread disconnected unexpectedly"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

/// A cloneable counter of events observed from pooled types, such as constructions or resets.
///
/// All clones share the same count, so a clone can be moved into a factory or embedded in every
/// pooled instance while the test keeps one to inspect.
///
/// # Example
///
/// ```rust
/// use testing::Tally;
///
/// let resets = Tally::default();
/// let in_instance = resets.clone();
///
/// in_instance.record();
/// in_instance.record();
///
/// assert_eq!(resets.get(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Tally {
    count: Arc<AtomicUsize>,
}

impl Tally {
    /// Records one occurrence.
    pub fn record(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of occurrences recorded so far by all clones.
    #[must_use]
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}
