//! Priority-with-aging scheduler and timekeeping (spec §4.5).

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::{
    arch::aarch64::context,
    process::{
        pcb::{BlockReason, ProcessState},
        table,
    },
};

/// Ticks a process runs before preemption, refilled each time it is
/// selected (spec §4.5).
pub const DEFAULT_QUANTUM: i32 = 5;

static TICKS: AtomicU64 = AtomicU64::new(0);
static NEED_RESCHEDULE: AtomicBool = AtomicBool::new(false);

/// Current value of the global monotonic tick counter.
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Whether the IRQ-return path must call [`schedule`] before resuming
/// the interrupted process.
pub fn need_reschedule() -> bool {
    NEED_RESCHEDULE.load(Ordering::Relaxed)
}

/// Called from the timer IRQ handler, after EOI and before returning
/// from the IRQ (spec §4.5). Never calls the scheduler directly --
/// only sets the flag the IRQ-return path consults.
pub fn timer_tick() {
    let now = TICKS.fetch_add(1, Ordering::Relaxed) + 1;

    let current = table::current_index();
    table::with_slot(current, |pcb| {
        if pcb.state == ProcessState::Running {
            pcb.cpu_time += 1;
            if pcb.pid > 0 {
                pcb.quantum -= 1;
                if pcb.quantum <= 0 {
                    NEED_RESCHEDULE.store(true, Ordering::Relaxed);
                }
            }
        }
    });

    table::for_each_live(|pcb| {
        if pcb.state == ProcessState::Blocked
            && pcb.block_reason == BlockReason::Sleep
            && pcb.wake_up_time <= now
        {
            pcb.state = ProcessState::Ready;
            pcb.block_reason = BlockReason::None;
        }
    });
}

/// Aging, selection, quantum refill, and context switch (spec §4.5).
/// Called voluntarily on yield/sleep/block, and on the IRQ-return path
/// when [`need_reschedule`] is set.
pub fn schedule() {
    NEED_RESCHEDULE.store(false, Ordering::Relaxed);

    let current = table::current_index();

    table::for_each_live(|pcb| {
        if pcb.state == ProcessState::Ready && pcb.pid != current {
            pcb.priority = (pcb.priority - 1).max(0);
        }
    });

    let mut chosen: Option<usize> = None;
    table::for_each_live(|pcb| {
        if pcb.state == ProcessState::Ready || pcb.state == ProcessState::Running {
            chosen = Some(match chosen {
                None => pcb.pid,
                Some(best) => {
                    let best_priority = table::with_slot(best, |b| b.priority);
                    if pcb.priority < best_priority
                        || (pcb.priority == best_priority && pcb.pid < best)
                    {
                        pcb.pid
                    } else {
                        best
                    }
                }
            });
        }
    });

    let chosen = chosen.unwrap_or_else(|| {
        table::with_slot(0, |pcb| {
            if pcb.state != ProcessState::Running {
                pcb.state = ProcessState::Ready;
            }
        });
        0
    });

    table::with_slot(chosen, |pcb| {
        if pcb.priority < 10 {
            pcb.priority += 2;
        }
        if pcb.pid > 0 {
            pcb.quantum = DEFAULT_QUANTUM;
        }
    });

    if chosen != current {
        table::with_slot(current, |pcb| {
            if pcb.state == ProcessState::Running {
                pcb.state = ProcessState::Ready;
            }
        });

        let old_ctx_ptr = table::with_slot(current, |pcb| &mut pcb.context as *mut _);
        let new_ctx_ptr = table::with_slot(chosen, |pcb| &pcb.context as *const _);

        table::with_slot(chosen, |pcb| pcb.state = ProcessState::Running);
        table::set_current_index(chosen);

        // SAFETY: `old_ctx_ptr`/`new_ctx_ptr` point at PCB slots in the
        // process table, which outlive this call; the table's lock is
        // not held across the switch (each `with_slot` above re-enters
        // and releases it), matching the spec's "IRQ-safety rule" that
        // the switch itself happens outside any lock.
        unsafe { context::context_switch(old_ctx_ptr, new_ctx_ptr) };
    }
}

/// Voluntary sleep: block the current process until `now + ticks`,
/// then invoke the scheduler (spec §4.5).
///
/// Interrupts must stay unmasked across the blocked section (the timer
/// is what wakes this process) but the mask in effect when the caller
/// entered is restored before returning (spec §9 open question (b)).
pub fn sleep(ticks_to_sleep: u64) {
    let _irq_guard = crate::raii::IrqGuard::save_and_enable();
    let current = table::current_index();
    let wake_at = ticks() + ticks_to_sleep;
    table::with_slot(current, |pcb| {
        pcb.wake_up_time = wake_at;
        pcb.state = ProcessState::Blocked;
        pcb.block_reason = BlockReason::Sleep;
    });
    schedule();
}
