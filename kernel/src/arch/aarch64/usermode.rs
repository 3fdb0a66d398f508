//! EL1 -> EL0 transition for AArch64.
//!
//! The actual jump to user mode, used by [`crate::process::table`]'s user
//! trampoline once a process's entry point and stack are known. Prerequisite
//! setup (TTBR0_EL1 user mappings, VBAR_EL1) happens once during boot via
//! [`crate::mm`] and [`super::vectors::init`], not per-transition.

use core::arch::asm;

/// Enter user mode via `eret`.
///
/// # Safety
/// - `entry_point` must be a valid user-space address with executable code
///   mapped.
/// - `user_stack` must be a valid user-space stack address, 16-byte aligned.
/// - TTBR0_EL1 must point to page tables with User-accessible mappings.
/// - VBAR_EL1 must be configured for EL0 exception handling.
pub unsafe fn enter_usermode(entry_point: u64, user_stack: u64) -> ! {
    // SAFETY: forwarded from this function's own contract.
    unsafe {
        asm!(
            // EL0t, all interrupts enabled
            "msr SPSR_EL1, {spsr}",
            "msr ELR_EL1, {entry}",
            "msr SP_EL0, {stack}",
            "isb",
            "eret",
            spsr = in(reg) 0u64,
            entry = in(reg) entry_point,
            stack = in(reg) user_stack,
            options(noreturn)
        );
    }
}
