//! Black-box counting-semaphore properties that don't require a live
//! process table (spec §8 idempotence/boundary properties). The FIFO
//! wake-order scenario (S3) needs to control which process is
//! "current", an internal-only hook, so it lives in `sem`'s own
//! `#[cfg(test)]` module instead.

use kernel_core::sem::Semaphore;

#[test]
fn wait_decrements_available_count() {
    let sem = Semaphore::new(3);
    assert_eq!(sem.count(), 3);
    sem.wait();
    assert_eq!(sem.count(), 2);
    sem.wait();
    assert_eq!(sem.count(), 1);
}

/// `signal` on a semaphore with no waiters and `count = k` yields
/// `count = k + 1` (spec §8 idempotence/boundary property).
#[test]
fn signal_with_no_waiters_increments_count() {
    let sem = Semaphore::new(0);
    assert_eq!(sem.count(), 0);
    sem.signal();
    assert_eq!(sem.count(), 1);
    sem.signal();
    assert_eq!(sem.count(), 2);
}

#[test]
fn wait_then_signal_restores_count() {
    let sem = Semaphore::new(1);
    sem.wait();
    assert_eq!(sem.count(), 0);
    sem.signal();
    assert_eq!(sem.count(), 1);
}
