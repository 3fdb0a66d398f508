//! Kernel core: Physical Page Manager, Virtual Memory Manager, kernel heap,
//! process table, priority scheduler, and counting semaphores for a small
//! educational AArch64 kernel.
//!
//! The bare-metal binary (`main.rs`) and the host-side unit test harness
//! both link against this library; `#[cfg(test)]` modules throughout use
//! the standard Rust test harness rather than a custom bare-metal runner,
//! so they build and run on the host target.

#![no_std]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]

extern crate alloc;

#[macro_use]
pub mod print;

pub mod arch;
pub mod error;
pub mod fs;
pub mod irq;
pub mod logger;
pub mod mm;
pub mod process;
pub mod raii;
pub mod sched;
pub mod sem;
pub mod serial;
pub mod shell;
pub mod sync;
mod syscall;

#[cfg(target_os = "none")]
#[global_allocator]
static ALLOCATOR: mm::heap::KernelHeap = mm::heap::KernelHeap;

/// Run on the host target so unit tests (`Vec`, `String`, ...) have a
/// working allocator without pulling in the bare-metal heap.
#[cfg(not(target_os = "none"))]
extern crate std;
#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

/// Bring up every subsystem in dependency order and enter the idle loop.
///
/// Called from [`arch::aarch64::boot::_start_rust`] once BSS is zeroed.
/// Never returns.
#[cfg(target_os = "none")]
pub fn kernel_main() -> ! {
    serial::init();
    logger::init();
    log::info!("kernel core starting");

    // SAFETY: first and only call, before interrupts are unmasked.
    unsafe { mm::init() }.expect("memory management init failed");
    process::table::init_processes();
    sched::init();
    fs::init();

    arch::init().expect("architecture init failed");
    irq::enable_irq(irq::TIMER_IRQ).expect("failed to enable timer IRQ");
    irq::enable_irq(irq::UART_RX_IRQ).expect("failed to enable UART RX IRQ");

    raii::enable_interrupts();
    log::info!("kernel core initialized, entering idle loop");

    let mut shell = shell::Shell::new();
    shell.start();

    loop {
        process::table::reap_zombies();
        shell.poll();
        arch::halt();
    }
}

#[cfg(all(target_os = "none", not(test)))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    log::error!("panic: {info}");
    arch::halt();
}

/// Heap allocation failure is unrecoverable in a `no_std` kernel.
#[cfg(target_os = "none")]
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("allocation error: {layout:?}");
}
