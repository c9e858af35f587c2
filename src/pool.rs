//! Fixed-size worker pool fed by a bounded queue.
//!
//! Every batch operation (copy, archive write, extraction) funnels its work
//! items through [`run`]: `workers` scoped threads pull from a
//! `crossbeam-channel` queue of capacity `workers * 2`, the dispatcher
//! enqueues every item and then closes the queue. Closing the queue is the
//! only termination signal; the call returns once every worker has drained
//! it and exited.

use crossbeam_channel::bounded;
use std::thread;

/// Process `items` on `workers` threads, calling `work` once per item.
///
/// Each item is owned by exactly one worker. `work` must record its own
/// outcome (counters, error slots); nothing is returned.
///
/// A panic inside `work` propagates to the caller once all threads have
/// been joined.
pub(crate) fn run<T, I, F>(items: I, workers: usize, work: F)
where
    T: Send,
    I: IntoIterator<Item = T>,
    F: Fn(T) + Sync,
{
    let workers = workers.max(1);
    let (sender, receiver) = bounded::<T>(workers * 2);
    let work = &work;

    thread::scope(|s| {
        for _ in 0..workers {
            let receiver = receiver.clone();
            s.spawn(move || {
                for item in receiver {
                    work(item);
                }
            });
        }
        drop(receiver);

        for item in items {
            if sender.send(item).is_err() {
                // All workers gone; only happens if they panicked
                break;
            }
        }
        drop(sender);
    });
}
