//! Virtual Memory Manager: builds and mutates three-level page tables,
//! allocating intermediate tables from the Physical Page Manager.
//!
//! `map_page` is the single public operation the spec names; `translate`
//! and `unmap_page` are ambient additions a complete VMM needs (the
//! demand-paging fault handler calls `map_page`, and a later read needs
//! `translate` to confirm a mapping stuck -- see `SPEC_FULL.md` §4.2).

use crate::{
    error::{KernelError, KernelResult},
    mm::{
        frame_allocator,
        page_table::{self, PageTable},
    },
};

/// Establish a mapping of the 4 KiB virtual page containing `virt` to
/// `phys`, with `flags` merged into the final leaf descriptor.
///
/// Intermediate L1/L2 tables are allocated from the PPM on demand.
/// Overwriting an existing L3 entry is permitted and replaces the
/// mapping; TLB invalidation is the caller's responsibility
/// (`arch::barriers::tlb_invalidate_all`).
pub fn map_page(root: &mut PageTable, virt: usize, phys: usize, flags: u64) -> KernelResult<()> {
    let l1 = page_table::l1_index(virt);
    let l2_table = ensure_next_level(root, l1)?;
    let l2 = page_table::l2_index(virt);
    let l3_table = ensure_next_level(l2_table, l2)?;
    let l3 = page_table::l3_index(virt);
    l3_table.set_page_descriptor(l3, phys, flags);
    Ok(())
}

/// Remove the mapping for the 4 KiB page containing `virt`, if present.
/// Absent intermediate tables are treated as "already unmapped", not an
/// error. Does not free the leaf frame -- callers that own the frame
/// return it to the PPM themselves.
pub fn unmap_page(root: &mut PageTable, virt: usize) {
    let l1 = page_table::l1_index(virt);
    if !root.is_valid(l1) {
        return;
    }
    // SAFETY: the L1 entry is valid and was only ever written by
    // `ensure_next_level` below, which always points at a PPM frame cast
    // to `*mut PageTable`.
    let l2_table = unsafe { &mut *(root.next_table_addr(l1) as *mut PageTable) };

    let l2 = page_table::l2_index(virt);
    if !l2_table.is_valid(l2) {
        return;
    }
    // SAFETY: same invariant as above, one level down.
    let l3_table = unsafe { &mut *(l2_table.next_table_addr(l2) as *mut PageTable) };

    let l3 = page_table::l3_index(virt);
    l3_table.clear(l3);
}

/// Walk the page tables and return the physical address `virt` currently
/// maps to, if any.
pub fn translate(root: &PageTable, virt: usize) -> Option<usize> {
    let l1 = page_table::l1_index(virt);
    if !root.is_valid(l1) {
        return None;
    }
    // SAFETY: see `unmap_page`.
    let l2_table = unsafe { &*(root.next_table_addr(l1) as *const PageTable) };

    let l2 = page_table::l2_index(virt);
    if !l2_table.is_valid(l2) {
        return None;
    }
    // SAFETY: see `unmap_page`.
    let l3_table = unsafe { &*(l2_table.next_table_addr(l2) as *const PageTable) };

    let l3 = page_table::l3_index(virt);
    if !l3_table.is_valid(l3) {
        return None;
    }
    let desc = l3_table.entry(l3);
    Some((desc as usize & 0x0000_ffff_ffff_f000) | page_table::page_offset(virt))
}

/// Ensure `table.entries[index]` points at a valid next-level table,
/// allocating one from the PPM if it doesn't yet. Returns a mutable
/// reference to that next-level table.
///
/// On PPM exhaustion, logs and returns [`KernelError::OutOfMemory`]
/// without mutating `table` further -- the caller must treat the
/// mapping as not having happened (spec §4.2 edge case).
fn ensure_next_level(table: &mut PageTable, index: usize) -> KernelResult<&mut PageTable> {
    if !table.is_valid(index) {
        let phys = frame_allocator::try_get_free_page().inspect_err(|_| {
            log::error!("VMM: PPM exhausted allocating intermediate table");
        })?;
        table.set_table_descriptor(index, phys);
    }
    let addr = table.next_table_addr(index);
    // SAFETY: `addr` is either a frame this call just allocated and wrote
    // a zeroed `PageTable`-sized region into (via the PPM's zero-on-alloc
    // guarantee), or an existing table previously installed the same
    // way. The frame is exclusively owned by this table slot.
    Ok(unsafe { &mut *(addr as *mut PageTable) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::page_table::flags;

    fn leaked_table() -> &'static mut PageTable {
        use alloc::boxed::Box;
        Box::leak(Box::new(PageTable::empty()))
    }

    #[test]
    fn translate_before_map_is_none() {
        let root = leaked_table();
        assert_eq!(translate(root, 0x1000), None);
    }

    #[test]
    fn map_then_translate_returns_same_page() {
        // Without a real PPM-backed identity map, intermediate tables
        // can't be allocated from the real frame allocator on a host
        // test, so this test drives the three levels directly instead
        // of through `map_page`'s PPM-allocating path.
        let root = leaked_table();
        let l2 = leaked_table();
        let l3 = leaked_table();

        let virt = 0x1234_5000usize;
        root.set_table_descriptor(page_table::l1_index(virt), l2 as *const _ as usize);
        l2.set_table_descriptor(page_table::l2_index(virt), l3 as *const _ as usize);
        l3.set_page_descriptor(
            page_table::l3_index(virt),
            0x9000_0000,
            flags::RW | flags::ATTR_NORMAL,
        );

        assert_eq!(translate(root, virt), Some(0x9000_0000));

        unmap_page(root, virt);
        assert_eq!(translate(root, virt), None);
    }
}
