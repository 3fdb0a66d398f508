//! Global process table: a fixed-size array of [`Pcb`] slots indexed by
//! PID, following the arena-plus-stable-index design spec §9 prefers
//! over a pointer graph.

use spin::Mutex;

use super::{
    pcb::{BlockReason, Pcb, ProcessState},
    IDLE_PRIORITY, MAX_PROCESSES, STACK_SIZE, USER_STACK_SIZE,
};
use crate::{error::KernelError, mm::heap, sync::once_lock::GlobalState};

pub(crate) struct Table {
    pub(crate) slots: [Pcb; MAX_PROCESSES],
    pub(crate) current: usize,
}

fn stack_top(stack_addr: usize, size: usize) -> usize {
    stack_addr + size
}

impl Table {
    fn new() -> Self {
        let slots = core::array::from_fn(Pcb::unused);
        let mut table = Self { slots, current: 0 };
        table.slots[0].state = ProcessState::Running;
        table.slots[0].priority = IDLE_PRIORITY;
        table.slots[0].set_name("Kernel");
        table
    }

    fn create_process(&mut self, entry_fn: usize, arg: usize, priority: i32, name: &str) -> i64 {
        let Some(pid) = (0..MAX_PROCESSES).find(|&i| self.slots[i].state == ProcessState::Unused)
        else {
            log::warn!("{}", KernelError::ProcessTableFull);
            return -1;
        };

        let stack = match heap::try_allocate(STACK_SIZE) {
            Ok(p) => p.as_ptr() as usize,
            Err(err) => {
                log::warn!("{err}");
                return -1;
            }
        };

        let slot = &mut self.slots[pid];
        slot.context = super::pcb::SavedContext::seed(entry_fn, arg, stack_top(stack, STACK_SIZE));
        slot.state = ProcessState::Ready;
        slot.priority = priority;
        slot.quantum = 0;
        slot.wake_up_time = 0;
        slot.block_reason = BlockReason::None;
        slot.cpu_time = 0;
        slot.exit_code = 0;
        slot.stack_addr = stack;
        slot.next = None;
        slot.user_entry = 0;
        slot.user_stack_top = 0;
        slot.set_name(name);

        pid as i64
    }

    fn create_user_process(&mut self, entry_fn: usize, name: &str) -> i64 {
        let pid = self.create_process(user_trampoline as usize, 0, 0, name);
        if pid < 0 {
            return pid;
        }

        let user_stack = match heap::try_allocate(USER_STACK_SIZE) {
            Ok(p) => p.as_ptr() as usize,
            Err(err) => {
                log::warn!("{err}");
                let pid = pid as usize;
                self.slots[pid] = Pcb::unused(pid);
                return -1;
            }
        };

        let slot = &mut self.slots[pid as usize];
        slot.user_entry = entry_fn;
        slot.user_stack_top = stack_top(user_stack, USER_STACK_SIZE);

        pid
    }

    fn exit_current(&mut self, code: i32) {
        let pid = self.current;
        let slot = &mut self.slots[pid];
        slot.exit_code = code;
        slot.state = ProcessState::Zombie;
    }

    fn reap_zombies(&mut self) {
        for slot in self.slots.iter_mut() {
            if slot.state == ProcessState::Zombie {
                if slot.stack_addr != 0 {
                    heap::free(slot.stack_addr as *mut u8);
                }
                let pid = slot.pid;
                *slot = Pcb::unused(pid);
            }
        }
    }
}

static PROCESS_TABLE: GlobalState<Mutex<Table>> = GlobalState::new();

/// Zero the table, install PID 0 as the running kernel/idle process,
/// and make it the current process (spec §4.4 `init_processes`).
pub fn init_processes() {
    PROCESS_TABLE
        .init(Mutex::new(Table::new()))
        .unwrap_or_else(|_| panic!("process table initialized twice"));
    log::info!("process table initialized, PID 0 = Kernel");
}

fn with_table<R>(f: impl FnOnce(&mut Table) -> R) -> R {
    PROCESS_TABLE
        .with_mut(|mtx| f(&mut mtx.lock()))
        .expect("process table used before init_processes")
}

/// Current process id.
pub fn current_pid() -> usize {
    with_table(|t| t.current)
}

/// Snapshot a PCB's scheduling state, for diagnostics and tests.
pub fn state_of(pid: usize) -> ProcessState {
    with_table(|table| table.slots[pid].state)
}

/// Snapshot a PCB's accumulated CPU time, for diagnostics and tests.
pub fn cpu_time_of(pid: usize) -> u64 {
    with_table(|table| table.slots[pid].cpu_time)
}

/// Snapshot a PCB's wake-up tick, for diagnostics and tests.
pub fn wake_up_time_of(pid: usize) -> u64 {
    with_table(|table| table.slots[pid].wake_up_time)
}

/// Create a new process (spec §4.4 `create_process`). Returns the new
/// PID, or -1 if the table is full or the heap is exhausted.
pub fn create_process(entry_fn: usize, arg: usize, priority: i32, name: &str) -> i64 {
    with_table(|table| table.create_process(entry_fn, arg, priority, name))
}

/// `create_thread(fn, priority, name)` is `create_process(fn, null, priority, name)`
/// (spec §4.4).
pub fn create_thread(entry_fn: usize, priority: i32, name: &str) -> i64 {
    create_process(entry_fn, 0, priority, name)
}

/// Allocate a separate user-mode stack, build a `{pc, sp}` context, and
/// create a process whose body transitions EL1->EL0 with that context
/// (spec §4.4 `create_user_process`).
pub fn create_user_process(entry_fn: usize, name: &str) -> i64 {
    with_table(|table| table.create_user_process(entry_fn, name))
}

/// Entry function every `create_user_process` PCB actually runs in
/// kernel mode; reads back the stashed user entry/stack and transitions
/// to EL0.
extern "C" fn user_trampoline(_arg: usize) -> ! {
    let (entry, sp) = with_table(|table| {
        let slot = &table.slots[table.current];
        (slot.user_entry, slot.user_stack_top)
    });
    // SAFETY: `entry`/`sp` were populated by `create_user_process` from
    // a heap allocation this process exclusively owns.
    unsafe { crate::arch::aarch64::usermode::enter_usermode(entry as u64, sp as u64) }
}

/// Terminate the current process: enable interrupts, mark it ZOMBIE
/// with `code`, and invoke the scheduler. Never returns (spec §4.4
/// `exit`: "enables interrupts, sets the current process state to
/// ZOMBIE, and calls the scheduler").
///
/// `exit` is reached from the SVC syscall path and the user-fault kill
/// path, both of which enter with IRQs auto-masked by AArch64
/// exception entry. Unlike `sched::sleep`/`sem::wait`, there is no
/// caller frame left to restore a saved mask into -- this function
/// never returns -- so interrupts are unmasked unconditionally rather
/// than through an `IrqGuard`.
pub fn exit(code: i32) -> ! {
    crate::raii::enable_interrupts();
    with_table(|table| table.exit_current(code));
    crate::sched::schedule();
    // The context switch above is the out-of-scope external primitive;
    // on real hardware this point is never reached again for this
    // process's stack.
    crate::arch::halt();
}

/// Reclaim every ZOMBIE slot's stack and return it to UNUSED (spec
/// §4.4 `reap_zombies`, called from the idle loop).
pub fn reap_zombies() {
    with_table(|table| table.reap_zombies());
}

/// Run `f` over every live (non-UNUSED) PCB, used by the scheduler's
/// selection/aging passes and the timer's sleep-wake scan.
pub(crate) fn for_each_live(mut f: impl FnMut(&mut Pcb)) {
    with_table(|table| {
        for slot in table.slots.iter_mut() {
            if slot.state != ProcessState::Unused {
                f(slot);
            }
        }
    });
}

/// Run `f(pid, state, cpu_time, name)` over every live (non-UNUSED)
/// process, for the shell's `ps` command.
pub fn for_each_pid(mut f: impl FnMut(usize, ProcessState, u64, &str)) {
    with_table(|table| {
        for (pid, slot) in table.slots.iter().enumerate() {
            if slot.state != ProcessState::Unused {
                f(pid, slot.state, slot.cpu_time, slot.name_str());
            }
        }
    });
}

pub(crate) fn current_index() -> usize {
    with_table(|table| table.current)
}

pub(crate) fn set_current_index(pid: usize) {
    with_table(|table| table.current = pid);
}

pub(crate) fn with_slot<R>(pid: usize, f: impl FnOnce(&mut Pcb) -> R) -> R {
    with_table(|table| f(&mut table.slots[pid]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_installs_idle_process() {
        let table = Table::new();
        assert_eq!(table.current, 0);
        assert_eq!(table.slots[0].state, ProcessState::Running);
        assert_eq!(table.slots[0].name_str(), "Kernel");
    }

    #[test]
    fn create_process_fills_first_unused_slot() {
        let (start, end) = heap_region();
        crate::mm::heap::init(start, end);
        let mut table = Table::new();
        let pid = table.create_process(0x1000, 0, 5, "worker");
        assert_eq!(pid, 1);
        assert_eq!(table.slots[1].state, ProcessState::Ready);
        assert_eq!(table.slots[1].priority, 5);
        assert_eq!(table.slots[1].name_str(), "worker");
        assert_ne!(table.slots[1].stack_addr, 0);
    }

    #[test]
    fn create_process_fails_when_heap_exhausted() {
        // A heap too small for even one 4 KiB stack.
        let (start, end) = leak_region(256);
        crate::mm::heap::init(start, end);
        let mut table = Table::new();
        assert_eq!(table.create_process(0x1000, 0, 5, "worker"), -1);
    }

    #[test]
    fn reap_zombies_frees_stack_and_frees_slot() {
        let (start, end) = heap_region();
        crate::mm::heap::init(start, end);
        let mut table = Table::new();
        let pid = table.create_process(0x1000, 0, 5, "worker") as usize;
        table.slots[pid].state = ProcessState::Zombie;
        table.slots[pid].exit_code = 7;
        table.reap_zombies();
        assert_eq!(table.slots[pid].state, ProcessState::Unused);
        assert_eq!(table.slots[pid].stack_addr, 0);
    }

    fn leak_region(bytes: usize) -> (usize, usize) {
        use alloc::alloc::{alloc, Layout};
        let layout = Layout::from_size_align(bytes, 16).unwrap();
        // SAFETY: non-zero size, valid alignment; leaked for the test.
        let ptr = unsafe { alloc(layout) };
        assert!(!ptr.is_null());
        (ptr as usize, ptr as usize + bytes)
    }

    fn heap_region() -> (usize, usize) {
        leak_region(64 * 1024)
    }
}
