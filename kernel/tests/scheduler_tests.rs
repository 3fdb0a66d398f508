//! Scheduler and timekeeping scenarios (spec §8 S1, S2, and invariant 7).
//!
//! Both scenarios share the global process table and tick counter, so
//! they run as one test to keep the tick sequence deterministic instead
//! of racing another test's `timer_tick` calls.

use kernel_core::{
    process::{pcb::ProcessState, table},
    sched,
};

fn leak_region(bytes: usize) -> (usize, usize) {
    let layout = std::alloc::Layout::from_size_align(bytes, 16).unwrap();
    // SAFETY: non-zero size, 16-byte alignment; leaked for the test.
    let ptr = unsafe { std::alloc::alloc(layout) };
    assert!(!ptr.is_null());
    (ptr as usize, ptr as usize + bytes)
}

#[test]
fn scheduler_scenarios() {
    let (start, end) = leak_region(256 * 1024);
    kernel_core::mm::heap::init(start, end);
    table::init_processes();
    sched::init();

    // S1 -- round-robin fairness between two equal-priority, never-
    // sleeping processes: after 10 quanta, their accumulated CPU time
    // differs by at most 2 ticks.
    let a = table::create_process(0x1000, 0, 5, "A") as usize;
    let b = table::create_process(0x2000, 0, 5, "B") as usize;

    let before_tick = sched::ticks();
    for _ in 0..(10 * sched::DEFAULT_QUANTUM) {
        sched::timer_tick();
        if sched::need_reschedule() {
            sched::schedule();
        }
    }
    // Invariant 7: the tick counter strictly increases on every call.
    assert!(sched::ticks() > before_tick);

    let cpu_a = table::cpu_time_of(a) as i64;
    let cpu_b = table::cpu_time_of(b) as i64;
    assert!(
        (cpu_a - cpu_b).abs() <= 2,
        "round-robin fairness violated: A={cpu_a} B={cpu_b}"
    );

    // S2 -- sleep wakes at the right tick. Whichever of A/B is current
    // puts itself to sleep for 20 ticks; it must go BLOCKED immediately
    // and only become READY once the tick counter reaches wake time.
    let sleeper = table::current_pid();
    let now = sched::ticks();
    sched::sleep(20);

    assert_eq!(table::state_of(sleeper), ProcessState::Blocked);
    assert_eq!(table::wake_up_time_of(sleeper), now + 20);

    let cpu_at_sleep = table::cpu_time_of(sleeper);
    while sched::ticks() < now + 20 {
        sched::timer_tick();
        if sched::need_reschedule() {
            sched::schedule();
        }
    }
    assert_eq!(table::state_of(sleeper), ProcessState::Ready);
    // cpu_time must not have advanced while BLOCKED.
    assert_eq!(table::cpu_time_of(sleeper), cpu_at_sleep);
}
