//! Counting semaphores with an intrusive FIFO wait queue (spec §4.6).
//!
//! Spec §9 open question (a) notes the source is ambiguous between a
//! single process-wide spinlock and one per semaphore; the spec text
//! explicitly permits splitting it per-semaphore "without changing
//! semantics", so each [`Semaphore`] carries its own lock rather than
//! a shared global one.

use spin::Mutex;

use crate::{
    process::{
        pcb::{BlockReason, ProcessState},
        table,
    },
    raii::IrqGuard,
    sched,
};

struct State {
    count: i32,
    head: Option<usize>,
    tail: Option<usize>,
}

/// A counting semaphore backed by an intrusive FIFO of blocked PIDs.
pub struct Semaphore {
    state: Mutex<State>,
}

impl Semaphore {
    /// `init(s, value)` (spec §4.6).
    pub const fn new(value: i32) -> Self {
        Self {
            state: Mutex::new(State {
                count: value,
                head: None,
                tail: None,
            }),
        }
    }

    /// `wait(s)` / P: decrement if a slot is available; otherwise block
    /// until a matching `signal` hands this process the slot directly.
    pub fn wait(&self) {
        let _irq_guard = IrqGuard::save_and_enable();
        let mut state = self.state.lock();

        if state.count > 0 {
            state.count -= 1;
            return;
        }

        let pid = table::current_index();
        match state.tail {
            None => {
                state.head = Some(pid);
                state.tail = Some(pid);
            }
            Some(tail_pid) => {
                table::with_slot(tail_pid, |pcb| pcb.next = Some(pid));
                state.tail = Some(pid);
            }
        }
        table::with_slot(pid, |pcb| {
            pcb.state = ProcessState::Blocked;
            pcb.block_reason = BlockReason::Wait;
        });

        // Release the lock before yielding the CPU -- `schedule` may
        // run arbitrarily long (or forever, for this process) and must
        // not do so holding this semaphore's lock.
        drop(state);
        sched::schedule();
    }

    /// `signal(s)` / V: hand the slot directly to the head of the
    /// queue if non-empty (no `count` increment -- avoids the
    /// wake/decrement race), else increment `count`.
    pub fn signal(&self) {
        let mut state = self.state.lock();

        if let Some(head_pid) = state.head {
            let next = table::with_slot(head_pid, |pcb| pcb.next.take());
            state.head = next;
            if state.head.is_none() {
                state.tail = None;
            }
            table::with_slot(head_pid, |pcb| {
                pcb.state = ProcessState::Ready;
                pcb.block_reason = BlockReason::None;
            });
        } else {
            state.count += 1;
        }
    }

    /// Current count, for tests and diagnostics.
    pub fn count(&self) -> i32 {
        self.state.lock().count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S3 -- semaphore FIFO: P1, P2, P3 `wait` in that order on a
    /// count-0 semaphore (each confirmed BLOCKED before the next
    /// starts waiting); three `signal`s wake them P1, P2, P3.
    ///
    /// Drives `table::set_current_index` directly -- a crate-internal
    /// hook standing in for "process Pn is the one calling wait()" --
    /// since there's no real multi-process execution on the host.
    #[test]
    fn s3_semaphore_fifo_wakes_in_wait_order() {
        let layout = alloc::alloc::Layout::from_size_align(64 * 1024, 16).unwrap();
        // SAFETY: non-zero size, valid alignment; leaked for the test.
        let heap_ptr = unsafe { alloc::alloc::alloc(layout) };
        assert!(!heap_ptr.is_null());
        crate::mm::heap::init(heap_ptr as usize, heap_ptr as usize + 64 * 1024);
        table::init_processes();

        let p1 = table::create_process(0x1000, 0, 5, "P1") as usize;
        let p2 = table::create_process(0x2000, 0, 5, "P2") as usize;
        let p3 = table::create_process(0x3000, 0, 5, "P3") as usize;

        let sem = Semaphore::new(0);

        table::set_current_index(p1);
        sem.wait();
        assert_eq!(table::state_of(p1), ProcessState::Blocked);

        table::set_current_index(p2);
        sem.wait();
        assert_eq!(table::state_of(p2), ProcessState::Blocked);

        table::set_current_index(p3);
        sem.wait();
        assert_eq!(table::state_of(p3), ProcessState::Blocked);

        assert_eq!(sem.count(), 0);

        sem.signal();
        assert_eq!(table::state_of(p1), ProcessState::Ready);
        assert_eq!(table::state_of(p2), ProcessState::Blocked);
        assert_eq!(table::state_of(p3), ProcessState::Blocked);

        sem.signal();
        assert_eq!(table::state_of(p2), ProcessState::Ready);
        assert_eq!(table::state_of(p3), ProcessState::Blocked);

        sem.signal();
        assert_eq!(table::state_of(p3), ProcessState::Ready);

        // The slots never went through `count`, so it never moved.
        assert_eq!(sem.count(), 0);
    }
}
