//! Demand-paging fault handler (spec §4.7).
//!
//! The exception vector's synchronous-exception path (external
//! collaborator) decodes a data/instruction abort and calls
//! [`handle_fault`] with the faulting virtual address and the id of the
//! process that caused it.

use crate::{
    arch::barriers,
    error::KernelError,
    mm::{self, page_table::flags, DEMAND_REGION},
};

/// Outcome the caller must act on.
pub enum FaultOutcome {
    /// The fault was resolved by mapping a fresh page; re-execute the
    /// faulting instruction.
    Resolved,
    /// The fault was outside the demand region, or the PPM was
    /// exhausted; the caller must terminate the faulting process.
    Kill,
}

/// Handle a data/instruction abort interpreted as demand paging.
///
/// If `addr` lies in [`DEMAND_REGION`], obtain a free frame from the
/// PPM, install a mapping via the VMM, invalidate the TLB, and signal
/// [`FaultOutcome::Resolved`] so the instruction re-executes. Otherwise,
/// or on PPM exhaustion, signal [`FaultOutcome::Kill`] (spec §4.7 and
/// §7: "User faults ... Policy: terminate the offending process").
pub fn handle_fault(addr: usize, user: bool) -> FaultOutcome {
    if !DEMAND_REGION.contains(&addr) {
        log::warn!("{}, killing process", KernelError::InvalidAddress { addr });
        return FaultOutcome::Kill;
    }

    let phys = match crate::mm::frame_allocator::try_get_free_page() {
        Ok(phys) => phys,
        Err(KernelError::OutOfMemory) => {
            log::error!("fault at {addr:#x}: PPM exhausted, killing process");
            return FaultOutcome::Kill;
        }
        Err(_) => return FaultOutcome::Kill,
    };

    let page_virt = addr & !0xfff;
    let mut attrs = flags::RW | flags::SH_INNER | flags::ATTR_NORMAL;
    if user {
        attrs |= flags::USER;
    }

    if mm::map_page(page_virt, phys, attrs).is_err() {
        crate::mm::frame_allocator::free_page(phys);
        return FaultOutcome::Kill;
    }

    barriers::tlb_invalidate_all();
    FaultOutcome::Resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_demand_region_kills() {
        assert!(matches!(handle_fault(0x1000, false), FaultOutcome::Kill));
    }
}
