//! Process table scenarios driven through the public API only (spec §8
//! S6). `process::exit` diverges (it halts the core on real hardware),
//! so it is exercised by `process::table`'s own internal unit tests
//! instead of here.
//!
//! `process::table::init_processes` succeeds only once per process, so
//! every scenario below runs inside a single test rather than as
//! separate `#[test]` functions that would race each other for it.

use kernel_core::process::{pcb::ProcessState, table, MAX_PROCESSES, STACK_SIZE};

fn leak_region(bytes: usize) -> (usize, usize) {
    let layout = std::alloc::Layout::from_size_align(bytes, 16).unwrap();
    // SAFETY: non-zero size, 16-byte alignment; leaked for the test.
    let ptr = unsafe { std::alloc::alloc(layout) };
    assert!(!ptr.is_null());
    (ptr as usize, ptr as usize + bytes)
}

#[test]
fn process_table_scenarios() {
    assert!(MAX_PROCESSES >= 2);
    table::init_processes();

    // S6 -- exhaustion: with just enough heap for one process stack, a
    // second `create_process` fails and leaves the first process's
    // state untouched.
    let (start, end) = leak_region(STACK_SIZE + 64);
    kernel_core::mm::heap::init(start, end);

    let first = table::create_process(0x1000, 0, 5, "first");
    assert!(first >= 0, "first process should fit in the heap");
    assert_eq!(table::state_of(first as usize), ProcessState::Ready);

    let second = table::create_process(0x2000, 0, 5, "second");
    assert_eq!(second, -1, "second process must fail: heap exhausted");
    assert_eq!(table::state_of(first as usize), ProcessState::Ready);
    assert_eq!(table::cpu_time_of(first as usize), 0);

    // `create_thread(f, priority, name)` is `create_process(f, 0, priority, name)`.
    let (start, end) = leak_region(4 * STACK_SIZE);
    kernel_core::mm::heap::init(start, end);

    let worker = table::create_thread(0x4000, 7, "worker");
    assert!(worker >= 0);
    assert_eq!(table::state_of(worker as usize), ProcessState::Ready);

    // `create_user_process` needs a second, separate stack allocation
    // (the user-mode stack) on top of the trampoline's own kernel
    // stack; it must fail cleanly when there's no room for that second
    // allocation.
    let (start, end) = leak_region(STACK_SIZE + 64);
    kernel_core::mm::heap::init(start, end);
    assert_eq!(table::create_user_process(0x8000, "user-init"), -1);

    // Reaping with no zombies present is a no-op.
    let (start, end) = leak_region(4 * STACK_SIZE);
    kernel_core::mm::heap::init(start, end);
    let alive = table::create_process(0x1000, 0, 5, "alive") as usize;
    table::reap_zombies();
    assert_eq!(table::state_of(alive), ProcessState::Ready);
}
