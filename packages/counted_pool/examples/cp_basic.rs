//! Basic usage example for `CountedPool`.
//!
//! A pooled type with a single integer field is acquired, mutated, released and acquired again,
//! showing that the reused instance comes back reset.

use std::sync::atomic::{AtomicI64, Ordering};

use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};

struct Field {
    value: AtomicI64,
    counter: ReferenceCounter<Self>,
}

impl Reset for Field {
    fn reset(&mut self) {
        *self.value.get_mut() = 0;
    }
}

impl ReferenceCountable for Field {
    fn reference_counter(&self) -> &ReferenceCounter<Self> {
        &self.counter
    }
}

fn main() {
    let pool = CountedPool::new(|counter| Field {
        value: AtomicI64::new(0),
        counter,
    });

    let a = pool.acquire();
    println!("Acquired A: value = {}", a.value.load(Ordering::Relaxed));

    a.value.store(42, Ordering::Relaxed);
    println!("Set A to {}", a.value.load(Ordering::Relaxed));

    // SAFETY: This is our only reference and `a` is not used after releasing it.
    unsafe { a.decrement_reference_count() };
    println!("Released A, idle instances: {}", pool.idle_count());

    let b = pool.acquire();
    let value = b.value.load(Ordering::Relaxed);
    println!("Acquired B: value = {value}");
    assert_eq!(value, 0);

    // SAFETY: This is our only reference and `b` is not used after releasing it.
    unsafe { b.decrement_reference_count() };

    println!("Basic example completed successfully!");
}
