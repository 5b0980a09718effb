//! Sharing one pooled instance with several worker threads.
//!
//! The producer takes one reference per worker up front, each worker releases its own reference
//! when done, and whichever worker finishes last returns the instance to the pool.

use std::sync::{Mutex, PoisonError};
use std::thread;

use counted_pool::{CountedPool, ReferenceCountable, ReferenceCounter, Reset};

const WORKERS: u32 = 4;

struct Batch {
    lines: Mutex<Vec<String>>,
    counter: ReferenceCounter<Self>,
}

impl Reset for Batch {
    fn reset(&mut self) {
        self.lines
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }
}

impl ReferenceCountable for Batch {
    fn reference_counter(&self) -> &ReferenceCounter<Self> {
        &self.counter
    }
}

fn main() {
    let pool = CountedPool::builder()
        .name("batches")
        .prewarm(1)
        .build(|counter| Batch {
            lines: Mutex::new(Vec::new()),
            counter,
        });

    let batch = pool.acquire();
    batch
        .lines
        .lock()
        .expect("no other holder yet")
        .extend(["alpha".to_string(), "beta".to_string()]);

    // One reference per worker. Ours is handed over to the last worker, so we add one fewer.
    batch.increment_reference_count_by_n(WORKERS - 1);

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            thread::spawn(move || {
                let line_count = batch.lines.lock().expect("no holder panicked").len();
                println!("Worker {worker} sees {line_count} lines");

                // SAFETY: Each worker owns exactly one reference and does not use the handle
                // after releasing it.
                unsafe { batch.decrement_reference_count() };
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker thread completed");
    }

    println!("All workers done, idle instances: {}", pool.idle_count());
    assert_eq!(pool.idle_count(), 1);

    let reused = pool.acquire();
    assert!(reused.lines.lock().expect("no holder panicked").is_empty());

    // SAFETY: This is our only reference and `reused` is not used after releasing it.
    unsafe { reused.decrement_reference_count() };

    println!("Fan-out example completed successfully!");
}
