//! Scheduler and timekeeping (spec §4.5).

pub mod scheduler;

pub use scheduler::{need_reschedule, schedule, sleep, ticks, timer_tick, DEFAULT_QUANTUM};

/// Nothing to initialize beyond the process table's idle process and
/// the scheduler's static tick/flag state, both zeroed at link time.
pub fn init() {
    log::info!("scheduler initialized, quantum = {DEFAULT_QUANTUM} ticks");
}
