//! IRQ dispatch for the two interrupt sources this kernel drives: the
//! generic timer (PPI 30) and the PL011 RX line (SPI 33).
//!
//! The vector table's IRQ entry (external, see `arch::aarch64::boot.S`)
//! calls [`dispatch`] after acknowledging the interrupt at the GIC CPU
//! interface. `dispatch` never runs the scheduler itself -- it only ever
//! sets state or flags, preserving the IRQ-safety rule that context
//! switches happen solely on the IRQ-return path.

use crate::arch::aarch64::gic;

/// Generic timer PPI on QEMU `virt`.
pub const TIMER_IRQ: u32 = 30;
/// PL011 RX SPI on QEMU `virt`.
pub const UART_RX_IRQ: u32 = crate::serial::UART_RX_IRQ;

/// Enable an IRQ line at the GIC distributor.
pub fn enable_irq(irq: u32) -> crate::error::KernelResult<()> {
    gic::enable_irq(irq)
}

/// Acknowledge the highest-priority pending interrupt, dispatch it to the
/// owning subsystem, and signal end-of-interrupt.
///
/// Called from the IRQ vector entry with interrupts masked. Returns
/// whether a reschedule is needed on return (i.e. whether the timer path
/// set the scheduler's deferred-reschedule flag).
pub fn dispatch() -> bool {
    let Some(irq) = gic::handle_irq() else {
        return false;
    };

    let reschedule = match irq {
        TIMER_IRQ => {
            crate::arch::aarch64::timer::reload();
            crate::sched::timer_tick();
            crate::sched::need_reschedule()
        }
        UART_RX_IRQ => {
            crate::serial::handle_rx_interrupt();
            false
        }
        _ => false,
    };

    gic::eoi(irq);
    reschedule
}
