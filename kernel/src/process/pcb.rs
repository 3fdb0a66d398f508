//! Process Control Block definition.
//!
//! Fields are exactly the table in the spec's data model: a context
//! snapshot restricted to the callee-saved registers a cooperative
//! context switch must preserve, scheduling bookkeeping, and a single
//! intrusive `next` link reused by exactly one queue at a time (the
//! ready pool is not a queue the PCB itself links into -- only sleep
//! and semaphore waits do, and never both at once).

/// Maximum length of a process name, not counting the terminator.
pub const NAME_CAPACITY: usize = 15;

/// Lifecycle state of a process table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Unused,
    Running,
    Ready,
    Blocked,
    Zombie,
}

/// Why a `Blocked` process is blocked. `None` is the value for every
/// non-blocked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    None,
    Sleep,
    Wait,
}

/// Callee-saved register snapshot restored by the (external)
/// context-switch primitive: x19-x28, frame pointer, program counter,
/// stack pointer.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SavedContext {
    pub x: [u64; 10],
    pub fp: u64,
    pub pc: u64,
    pub sp: u64,
}

impl SavedContext {
    pub const fn empty() -> Self {
        Self {
            x: [0; 10],
            fp: 0,
            pc: 0,
            sp: 0,
        }
    }

    /// Seed a context so the first switch-in enters `entry` with `arg`
    /// in x0 (AArch64 calling convention: the first argument register),
    /// running on `stack_top`.
    pub fn seed(entry: usize, arg: usize, stack_top: usize) -> Self {
        let mut ctx = Self::empty();
        ctx.x[0] = arg as u64; // placeholder for x0; real switch restores x19-x28 only
        ctx.pc = entry as u64;
        ctx.sp = stack_top as u64;
        ctx.fp = stack_top as u64;
        ctx
    }
}

/// A process table slot.
pub struct Pcb {
    pub context: SavedContext,
    pub state: ProcessState,
    pub pid: usize,
    pub priority: i32,
    pub quantum: i32,
    pub wake_up_time: u64,
    pub block_reason: BlockReason,
    pub cpu_time: u64,
    pub exit_code: i32,
    pub stack_addr: usize,
    pub name: [u8; NAME_CAPACITY + 1],
    /// Intrusive link for the single wait queue this PCB may belong to
    /// at a time (sleep and semaphore waits do not use this field --
    /// sleep is tracked by `wake_up_time` scanned each tick; only
    /// semaphore FIFOs actually link through `next`). Stores a table
    /// index rather than a raw pointer, per the arena-plus-stable-index
    /// design this table uses throughout.
    pub next: Option<usize>,
    /// User-mode entry point for `create_user_process`'s trampoline.
    /// Zero for every process that never calls into EL0.
    pub user_entry: usize,
    /// Top of the separate user-mode stack `create_user_process`
    /// allocates. Zero for every process that never calls into EL0.
    pub user_stack_top: usize,
}

impl Pcb {
    pub const fn unused(pid: usize) -> Self {
        Self {
            context: SavedContext::empty(),
            state: ProcessState::Unused,
            pid,
            priority: 0,
            quantum: 0,
            wake_up_time: 0,
            block_reason: BlockReason::None,
            cpu_time: 0,
            exit_code: 0,
            stack_addr: 0,
            name: [0; NAME_CAPACITY + 1],
            next: None,
            user_entry: 0,
            user_stack_top: 0,
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = [0; NAME_CAPACITY + 1];
        for (dst, src) in self.name.iter_mut().zip(name.as_bytes().iter().take(NAME_CAPACITY)) {
            *dst = *src;
        }
    }

    pub fn name_str(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }
}
