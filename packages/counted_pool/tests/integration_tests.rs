//! Integration tests for the `counted_pool` package.
//!
//! These tests exercise the acquire/share/release cycle through the public API only,
//! from the perspective of a type that is pooled by a downstream crate.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicI64, Ordering};

use counted_pool::{Counted, CountedPool, ReferenceCountable, ReferenceCounter, Reset};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use testing::Tally;

/// A pooled type with one integer field, as in the canonical reuse scenario.
struct Field {
    value: AtomicI64,
    resets: Tally,
    counter: ReferenceCounter<Self>,
}

impl Reset for Field {
    fn reset(&mut self) {
        *self.value.get_mut() = 0;
        self.resets.record();
    }
}

impl ReferenceCountable for Field {
    fn reference_counter(&self) -> &ReferenceCounter<Self> {
        &self.counter
    }
}

struct Harness {
    pool: CountedPool<Field>,
    constructed: Tally,
    resets: Tally,
}

impl Harness {
    fn new() -> Self {
        let constructed = Tally::default();
        let resets = Tally::default();

        let pool = CountedPool::builder().name("fields").build({
            let constructed = constructed.clone();
            let resets = resets.clone();

            move |counter| {
                constructed.record();

                Field {
                    value: AtomicI64::new(0),
                    resets: resets.clone(),
                    counter,
                }
            }
        });

        Self {
            pool,
            constructed,
            resets,
        }
    }

    fn acquire(&self) -> Counted<Field> {
        self.pool.acquire()
    }
}

#[test]
fn field_resets_between_holders() {
    let harness = Harness::new();

    let a = harness.acquire();
    assert_eq!(a.value.load(Ordering::Relaxed), 0);

    a.value.store(42, Ordering::Relaxed);

    // SAFETY: Only reference, `a` is not used afterwards.
    unsafe { a.decrement_reference_count() };

    assert_eq!(harness.resets.get(), 1);
    assert_eq!(harness.pool.idle_count(), 1);

    let b = harness.acquire();
    assert_eq!(b.value.load(Ordering::Relaxed), 0);
    assert_eq!(harness.constructed.get(), 1);

    // SAFETY: Only reference, `b` is not used afterwards.
    unsafe { b.decrement_reference_count() };
}

#[test]
fn acquire_after_release_has_count_one_and_fresh_binding() {
    let harness = Harness::new();

    let first = harness.acquire();
    first.increment_reference_count_by_n(5);

    // SAFETY: Releasing all six references, `first` is not used afterwards.
    unsafe { first.decrement_reference_count_by_n(6) };

    let reused = harness.acquire();
    let fresh = harness.acquire();

    for handle in [reused, fresh] {
        assert_eq!(handle.reference_count(), 1);
        assert!(handle.reference_counter().is_bound_to(&handle));
    }

    // The two checked-out instances are distinct and each counter points at its own instance.
    assert_ne!(reused, fresh);
    assert!(!reused.reference_counter().is_bound_to(&fresh));
    assert!(!fresh.reference_counter().is_bound_to(&reused));

    // SAFETY: One reference each, neither handle is used afterwards.
    unsafe {
        reused.decrement_reference_count();
        fresh.decrement_reference_count();
    }

    assert_eq!(harness.constructed.get(), 2);
    assert_eq!(harness.pool.idle_count(), 2);
}

#[test]
fn increment_by_n_then_decrement_by_n_keeps_original_reference() {
    let harness = Harness::new();

    for n in 0..=64_u32 {
        let handle = harness.acquire();

        handle.increment_reference_count_by_n(n);
        assert_eq!(handle.reference_count(), n + 1);

        // SAFETY: Releasing the `n` references we just added; our original one remains.
        unsafe { handle.decrement_reference_count_by_n(n) };
        assert_eq!(handle.reference_count(), 1);
        assert!(!harness.pool.has_idle());

        // SAFETY: Only remaining reference, `handle` is not used afterwards.
        unsafe { handle.decrement_reference_count() };
        assert_eq!(harness.pool.idle_count(), 1);
    }

    assert_eq!(harness.resets.get(), 65);
    assert_eq!(harness.constructed.get(), 1);
}

#[test]
fn decrement_by_n_including_original_returns_once() {
    let harness = Harness::new();

    for n in 0..=64_u32 {
        let handle = harness.acquire();
        handle.increment_reference_count_by_n(n);

        let resets_before = harness.resets.get();

        // SAFETY: Releasing every reference, `handle` is not used afterwards.
        unsafe { handle.decrement_reference_count_by_n(n + 1) };

        assert_eq!(harness.resets.get(), resets_before + 1);
        assert_eq!(harness.pool.idle_count(), 1);
    }
}

#[test]
fn balanced_random_sequences_reclaim_exactly_once() {
    let harness = Harness::new();
    let mut rng = StdRng::seed_from_u64(0x00C0_FFEE);

    for _ in 0..200 {
        let handle = harness.acquire();
        let mut expected_count = 1_u32;
        let resets_before = harness.resets.get();

        for _ in 0..rng.random_range(0..40) {
            if rng.random_bool(0.5) {
                let n = rng.random_range(1..=4);

                if n == 1 && rng.random_bool(0.5) {
                    handle.increment_reference_count();
                } else {
                    handle.increment_reference_count_by_n(n);
                }

                expected_count += n;
            } else if expected_count > 1 {
                // Never release the last reference in the middle of the sequence.
                let n = rng.random_range(1..expected_count);

                if n == 1 && rng.random_bool(0.5) {
                    // SAFETY: At least one reference remains after this.
                    unsafe { handle.decrement_reference_count() };
                } else {
                    // SAFETY: At least one reference remains after this.
                    unsafe { handle.decrement_reference_count_by_n(n) };
                }

                expected_count -= n;
            }

            assert_eq!(handle.reference_count(), expected_count);
            assert_eq!(harness.resets.get(), resets_before);
        }

        // SAFETY: Releasing every remaining reference, `handle` is not used afterwards.
        unsafe { handle.decrement_reference_count_by_n(expected_count) };

        assert_eq!(harness.resets.get(), resets_before + 1);
        assert_eq!(harness.pool.idle_count(), 1);
    }

    assert_eq!(harness.constructed.get(), 1);
}

#[test]
fn double_release_panics_on_second_call_without_second_return() {
    let harness = Harness::new();
    let handle = harness.acquire();

    // SAFETY: Only reference. The deliberate second release below is detected while the pool
    // is alive, because the instance memory is kept by the pool's idle set.
    unsafe { handle.decrement_reference_count() };

    let second = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: See above, this is the over-release under test.
        unsafe { handle.decrement_reference_count() };
    }));

    let payload = second.expect_err("over-release must panic");
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or_default();
    assert!(message.contains("decremented below zero"), "{message}");

    assert_eq!(harness.resets.get(), 1);
    assert_eq!(harness.pool.idle_count(), 1);

    // The pool is still usable and hands out the same instance, correctly accounted.
    let again = harness.acquire();
    assert_eq!(again.reference_count(), 1);

    // SAFETY: Only reference, `again` is not used afterwards.
    unsafe { again.decrement_reference_count() };
    assert_eq!(harness.resets.get(), 2);
}

#[test]
#[should_panic(expected = "decremented below zero")]
fn decrement_by_n_past_zero_panics() {
    let harness = Harness::new();
    let handle = harness.acquire();

    // SAFETY: Deliberate over-release by one. The pool outlives the panic.
    unsafe { handle.decrement_reference_count_by_n(2) };
}

#[test]
#[should_panic(expected = "already been released")]
fn increment_after_release_panics() {
    let harness = Harness::new();
    let handle = harness.acquire();

    // SAFETY: Only reference. The deliberate misuse below is detected while the pool is alive.
    unsafe { handle.decrement_reference_count() };

    handle.increment_reference_count();
}

#[test]
fn prewarmed_pool_serves_without_constructing() {
    let constructed = Tally::default();

    let pool = CountedPool::builder().prewarm(3).build({
        let constructed = constructed.clone();
        move |counter| {
            constructed.record();
            Field {
                value: AtomicI64::new(0),
                resets: Tally::default(),
                counter,
            }
        }
    });

    assert_eq!(constructed.get(), 3);

    let handles = [pool.acquire(), pool.acquire(), pool.acquire()];
    assert_eq!(constructed.get(), 3);
    assert!(!pool.has_idle());

    for handle in handles {
        assert_eq!(handle.reference_count(), 1);
        assert!(handle.reference_counter().is_bound_to(&handle));

        // SAFETY: One reference each, not used afterwards.
        unsafe { handle.decrement_reference_count() };
    }

    assert_eq!(pool.idle_count(), 3);
}

#[test]
fn factory_failure_reaches_caller_unchanged() {
    #[derive(Debug, PartialEq)]
    struct OutOfMemory {
        requested: usize,
    }

    let pool = CountedPool::new_fallible(|_counter| {
        Err::<Field, _>(OutOfMemory { requested: 4096 })
    });

    assert_eq!(
        pool.try_acquire().unwrap_err(),
        OutOfMemory { requested: 4096 }
    );
    assert_eq!(
        pool.try_prewarm(1).unwrap_err(),
        OutOfMemory { requested: 4096 }
    );
    assert_eq!(pool.idle_count(), 0);
}

#[test]
fn instances_outliving_pool_are_dropped_on_release() {
    struct Tracked {
        drops: Tally,
        counter: ReferenceCounter<Self>,
    }

    impl Reset for Tracked {
        fn reset(&mut self) {}
    }

    impl ReferenceCountable for Tracked {
        fn reference_counter(&self) -> &ReferenceCounter<Self> {
            &self.counter
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.record();
        }
    }

    let drops = Tally::default();

    let pool = CountedPool::new({
        let drops = drops.clone();
        move |counter| Tracked {
            drops: drops.clone(),
            counter,
        }
    });

    let survivor = pool.acquire();
    let idle = pool.acquire();
    // SAFETY: Only reference, `idle` is not used afterwards.
    unsafe { idle.decrement_reference_count() };

    drop(pool);
    assert_eq!(drops.get(), 1);

    survivor.increment_reference_count();
    // SAFETY: Releasing both references, `survivor` is not used afterwards.
    unsafe { survivor.decrement_reference_count_by_n(2) };

    assert_eq!(drops.get(), 2);
}
