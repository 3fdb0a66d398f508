//! AArch64 exception vector table.
//!
//! VBAR_EL1 points at a 2 KiB-aligned table of 16 entries (4 exception
//! classes -- synchronous, IRQ, FIQ, SError -- for each of 4 sources:
//! current EL with SP0, current EL with SPx, lower EL on AArch64, lower
//! EL on AArch32), each entry a 0x80-byte slot of raw assembly.
//!
//! This kernel only uses two sources in practice: current EL with SPx
//! (kernel-to-kernel exceptions, e.g. a bug) and lower EL AArch64
//! (EL0 user processes trapping into the kernel via IRQ or SVC). The
//! other slots still need valid entries -- an unexpected trap into an
//! unpopulated vector is undefined behavior, not a clean panic.

use core::arch::global_asm;

use crate::error::KernelResult;

global_asm!(
    r#"
.section .text.vectors, "ax"
.align 11
.global vector_table
vector_table:

// Current EL, SP0
.align 7
b default_trap
.align 7
b irq_from_kernel
.align 7
b default_trap
.align 7
b default_trap

// Current EL, SPx
.align 7
b sync_from_kernel
.align 7
b irq_from_kernel
.align 7
b default_trap
.align 7
b default_trap

// Lower EL, AArch64
.align 7
b sync_from_user
.align 7
b irq_from_user
.align 7
b default_trap
.align 7
b default_trap

// Lower EL, AArch32
.align 7
b default_trap
.align 7
b default_trap
.align 7
b default_trap
.align 7
b default_trap

.align 7
default_trap:
    mrs x0, ESR_EL1
    mrs x1, ELR_EL1
    bl trap_unhandled

sync_from_kernel:
    mrs x0, ESR_EL1
    mrs x1, FAR_EL1
    bl sync_exception_from_kernel
    eret

sync_from_user:
    sub sp, sp, #80
    stp x0, x1, [sp, #0]
    stp x2, x3, [sp, #16]
    stp x4, x5, [sp, #32]
    stp x6, x7, [sp, #48]
    stp x8, x9, [sp, #64]
    mrs x0, ESR_EL1
    mrs x1, FAR_EL1
    mov x2, sp
    bl sync_exception_from_user
    ldp x0, x1, [sp, #0]
    ldp x2, x3, [sp, #16]
    ldp x4, x5, [sp, #32]
    ldp x6, x7, [sp, #48]
    ldp x8, x9, [sp, #64]
    add sp, sp, #80
    eret

irq_from_kernel:
    bl irq_exception_from_kernel
    eret

irq_from_user:
    bl irq_exception_from_user
    eret
"#
);

#[no_mangle]
extern "C" fn trap_unhandled(esr: u64, elr: u64) -> ! {
    panic!("unhandled exception: ESR_EL1={esr:#x} ELR_EL1={elr:#x}");
}

/// ESR_EL1.EC values this kernel distinguishes (ARMv8 ARM D17.2.37).
mod ec {
    pub const DATA_ABORT_LOWER_EL: u64 = 0b100100;
    pub const DATA_ABORT_SAME_EL: u64 = 0b100101;
    pub const INSN_ABORT_LOWER_EL: u64 = 0b100000;
    pub const SVC_AARCH64: u64 = 0b010101;
}

fn exception_class(esr: u64) -> u64 {
    (esr >> 26) & 0x3f
}

#[no_mangle]
extern "C" fn sync_exception_from_kernel(esr: u64, far: u64) {
    let ec = exception_class(esr);
    if ec == ec::DATA_ABORT_SAME_EL {
        match crate::mm::page_fault::handle_fault(far as usize, false) {
            crate::mm::page_fault::FaultOutcome::Resolved => {}
            crate::mm::page_fault::FaultOutcome::Kill => {
                panic!("unrecoverable kernel data abort at {far:#x}");
            }
        }
        return;
    }
    panic!("unhandled kernel-mode synchronous exception: ESR_EL1={esr:#x} FAR_EL1={far:#x}");
}

#[no_mangle]
extern "C" fn sync_exception_from_user(esr: u64, far: u64, frame: *mut u64) {
    let ec = exception_class(esr);
    match ec {
        // SAFETY: `frame` is the 10-register block `sync_from_user`
        // just reserved and saved on the kernel stack.
        ec::SVC_AARCH64 => unsafe { crate::syscall::dispatch(frame) },
        ec::DATA_ABORT_LOWER_EL | ec::INSN_ABORT_LOWER_EL => {
            match crate::mm::page_fault::handle_fault(far as usize, true) {
                crate::mm::page_fault::FaultOutcome::Resolved => {}
                crate::mm::page_fault::FaultOutcome::Kill => crate::process::exit(1),
            }
        }
        _ => crate::process::exit(1),
    }
}

#[no_mangle]
extern "C" fn irq_exception_from_kernel() {
    if crate::irq::dispatch() {
        crate::sched::schedule();
    }
}

#[no_mangle]
extern "C" fn irq_exception_from_user() {
    if crate::irq::dispatch() {
        crate::sched::schedule();
    }
}

extern "C" {
    static vector_table: u8;
}

/// Install this table as the EL1 exception vector base.
///
/// # Safety
///
/// Must run before interrupts are unmasked, and the table must remain
/// mapped and unchanged for the life of the kernel.
pub unsafe fn init() -> KernelResult<()> {
    // SAFETY: `vector_table`'s address, not its contents, is read; VBAR_EL1
    // accepts any 2 KiB-aligned address of a valid vector table, which the
    // linked `.text.vectors` section is.
    unsafe {
        let addr = &vector_table as *const u8 as u64;
        core::arch::asm!("msr VBAR_EL1, {}", in(reg) addr);
        core::arch::asm!("isb");
    }
    log::info!("exception vectors installed");
    Ok(())
}
