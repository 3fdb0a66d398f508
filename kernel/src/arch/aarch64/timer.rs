//! ARM generic physical timer (CNTP), the source of the kernel's periodic
//! tick. Owns the reload register only -- `crate::sched` owns the tick
//! counter and all scheduling decisions driven by it.

use core::arch::asm;

/// Fixed reload value: ~104 ms at the QEMU `virt` default 19.2 MHz counter
/// frequency. Chosen by the platform, not computed from `CNTFRQ_EL0`, so
/// that `DEFAULT_QUANTUM` ticks have a predictable wall-clock meaning.
pub const TIMER_INTERVAL: u64 = 2_000_000;

/// Physical timer PPI on QEMU `virt`.
pub const TIMER_PPI: u32 = super::gic::TIMER_PPI;

/// Program the reload value, unmask the timer, and enable it.
fn set_tval(interval: u64) {
    // SAFETY: CNTP_TVAL_EL0/CNTP_CTL_EL0 are EL1-accessible system
    // registers on any AArch64 core; writing them only affects this
    // core's physical timer.
    unsafe {
        asm!("msr CNTP_TVAL_EL0, {}", in(reg) interval, options(nomem, nostack));
        asm!("msr CNTP_CTL_EL0, {}", in(reg) 1u64, options(nomem, nostack));
    }
}

/// Enable the timer at [`TIMER_INTERVAL`] and unmask its IRQ at the GIC.
///
/// Must run after [`crate::arch::aarch64::gic::init`].
pub fn init() -> crate::error::KernelResult<()> {
    set_tval(TIMER_INTERVAL);
    crate::irq::enable_irq(TIMER_PPI)?;
    log::info!("generic timer armed at {TIMER_INTERVAL} ticks/interval");
    Ok(())
}

/// Reload the timer for the next interval. Called from the IRQ handler
/// after acknowledging the current interrupt, before invoking
/// `sched::timer_tick`.
pub fn reload() {
    set_tval(TIMER_INTERVAL);
}
