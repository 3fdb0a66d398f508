//! Process Table / PCB Manager (spec §4.4): a fixed-capacity array of
//! process control blocks, the current-process pointer, and process
//! creation/termination/reaping.

pub mod pcb;
pub mod table;

pub use pcb::{BlockReason, Pcb, ProcessState};

/// Fixed process table capacity. Not spec-mandated (the source used a
/// small fixed array for a teaching kernel); chosen generously enough
/// for the scheduler test scenarios in spec §8 while staying a small,
/// statically-sized table.
pub const MAX_PROCESSES: usize = 32;

/// Per-process kernel stack size, carved from the kernel heap.
pub const STACK_SIZE: usize = 4096;

/// Per-process user stack size for `create_user_process`.
pub const USER_STACK_SIZE: usize = 4096;

/// Lowest-urgency priority value, assigned to PID 0 (spec §4.4:
/// "lowest priority").
pub const IDLE_PRIORITY: i32 = i32::MAX;

/// Exit the current process. Never returns (spec §4.4: `exit()` ...
/// "must never return").
pub fn exit(code: i32) -> ! {
    table::exit(code)
}
