//! Memory management: Physical Page Manager, Virtual Memory Manager, and
//! the kernel heap.

pub mod frame_allocator;
pub mod heap;
pub mod page_fault;
pub mod page_table;
pub mod vmm;

use spin::Mutex;

use crate::{error::KernelResult, sync::once_lock::GlobalState};
use page_table::{flags, PageTable};

/// Base of the RAM region QEMU's `virt` machine exposes.
pub const RAM_BASE: usize = 0x4000_0000;
/// Size of the RAM region the PPM manages (spec §4.2: "the full managed
/// RAM range (128 MiB starting at the RAM base)").
pub const RAM_SIZE: usize = 128 * 1024 * 1024;

/// GIC distributor + CPU interface MMIO window, identity-mapped as
/// device memory at boot.
const GIC_MMIO_BASE: usize = 0x0800_0000;
const GIC_MMIO_SIZE: usize = 0x0002_0000;
/// PL011 UART MMIO window.
const UART_MMIO_BASE: usize = 0x0900_0000;
const UART_MMIO_SIZE: usize = 0x1000;

/// Heap carved out of kernel RAM immediately above the kernel image.
/// `__kernel_end` is a linker symbol; this constant is the fallback used
/// by tests and documentation, not by the real boot path.
const HEAP_SIZE: usize = 16 * 1024 * 1024;

/// Demand-paging region (spec §9 open question (c), resolved explicitly
/// here rather than left implicit): the only VA range the fault handler
/// treats as a lazily-mappable "heap-like" region. Any other unmapped
/// access is an illegal access and kills the faulting process.
pub const DEMAND_REGION: core::ops::Range<usize> = 0x5000_0000..0x6000_0000;

/// Physical address of the kernel's own root page table (no per-process
/// address spaces -- spec's non-goal -- so this single table serves
/// every process). Stored as an address rather than `&'static mut
/// PageTable` so the global can live behind a plain `Mutex<usize>`
/// instead of a mutex-of-mutable-reference.
static KERNEL_ROOT: GlobalState<Mutex<usize>> = GlobalState::new();

/// Reconstruct the live root table reference from its physical address.
///
/// # Safety
///
/// Caller must hold the `KERNEL_ROOT` lock for the duration of use.
unsafe fn root_table(phys: usize) -> &'static mut PageTable {
    // SAFETY: `phys` is only ever set in `init` from a frame this module
    // exclusively owns and has formatted as a `PageTable`.
    unsafe { &mut *(phys as *mut PageTable) }
}

/// Bring up the PPM, the kernel root page table with its boot-time
/// identity map, the MMU, and the kernel heap, in that order (spec §2
/// dependency order: PPM before VMM before heap).
///
/// # Safety
///
/// Must be called exactly once, early in boot, before any other
/// `mm::*` function and before interrupts are unmasked.
pub unsafe fn init() -> KernelResult<()> {
    frame_allocator::init(RAM_BASE, RAM_SIZE);

    let root_phys = frame_allocator::try_get_free_page()?;
    // SAFETY: `root_phys` is a frame this call just exclusively
    // allocated and zeroed; reinterpreting it as a `PageTable` is valid
    // because `PageTable` is `repr(C)` over an all-zero-valid `[u64; 512]`.
    let root: &'static mut PageTable = unsafe { &mut *(root_phys as *mut PageTable) };

    identity_map_device(root, GIC_MMIO_BASE, GIC_MMIO_SIZE)?;
    identity_map_device(root, UART_MMIO_BASE, UART_MMIO_SIZE)?;
    identity_map_ram(root, RAM_BASE, RAM_SIZE)?;

    KERNEL_ROOT
        .init(Mutex::new(root_phys))
        .map_err(|_| crate::error::KernelError::AlreadyExists { resource: "KERNEL_ROOT" })?;

    enable_mmu(root_phys);

    heap::init(heap_start(), heap_start() + HEAP_SIZE);

    Ok(())
}

fn heap_start() -> usize {
    extern "C" {
        static __kernel_end: u8;
    }
    // SAFETY: `__kernel_end` is a linker-provided symbol; only its
    // address is read, never dereferenced.
    unsafe { &__kernel_end as *const u8 as usize }
}

fn identity_map_device(root: &mut PageTable, base: usize, size: usize) -> KernelResult<()> {
    let attrs = flags::RW | flags::SH_INNER | flags::ATTR_DEVICE | flags::PXN | flags::UXN;
    map_region(root, base, size, attrs)
}

fn identity_map_ram(root: &mut PageTable, base: usize, size: usize) -> KernelResult<()> {
    let attrs = flags::RW | flags::SH_INNER | flags::ATTR_NORMAL;
    map_region(root, base, size, attrs)
}

fn map_region(root: &mut PageTable, base: usize, size: usize, attrs: u64) -> KernelResult<()> {
    let mut va = base;
    let end = base + size;
    while va < end {
        vmm::map_page(root, va, va, attrs)?;
        va += frame_allocator::FRAME_SIZE;
    }
    Ok(())
}

/// Load `root_phys` into both translation base registers and enable the
/// MMU and caches.
///
/// # Safety
///
/// `root_phys` must be a fully populated, live root table covering every
/// address this code will execute or access after the MMU is enabled.
unsafe fn enable_mmu(root_phys: usize) {
    use core::arch::asm;

    // MAIR_EL1: index 0 = device-nGnRnE, index 1 = normal write-back.
    let mair: u64 = 0x00 | (0xffu64 << 8);
    // TCR_EL1: 4 KiB granule, 48-bit VA/PA, identical T0SZ/T1SZ.
    let tcr: u64 = (16u64) | (16u64 << 16) | (0b01 << 12) | (0b10 << 30);

    // SAFETY: this function's own contract requires a fully populated
    // root table; the register writes are the documented AArch64
    // sequence for enabling stage-1 translation at EL1.
    unsafe {
        asm!("msr MAIR_EL1, {}", in(reg) mair);
        asm!("msr TCR_EL1, {}", in(reg) tcr);
        asm!("msr TTBR0_EL1, {}", in(reg) root_phys as u64);
        asm!("msr TTBR1_EL1, {}", in(reg) root_phys as u64);
        asm!("isb");

        let mut sctlr: u64;
        asm!("mrs {}, SCTLR_EL1", out(reg) sctlr);
        sctlr |= 1 << 0; // M: MMU enable
        sctlr |= 1 << 2; // C: data cache enable
        sctlr |= 1 << 12; // I: instruction cache enable
        asm!("msr SCTLR_EL1, {}", in(reg) sctlr);
        asm!("isb");
    }
}

/// Map a page in the kernel's root table. Used by the demand-paging
/// fault handler and any future per-process mapping request (there are
/// none -- spec's non-goal of per-process address spaces).
pub fn map_page(virt: usize, phys: usize, attrs: u64) -> KernelResult<()> {
    KERNEL_ROOT
        .with(|mtx| {
            let root_phys = *mtx.lock();
            // SAFETY: the lock is held for the duration of this call.
            let root = unsafe { root_table(root_phys) };
            vmm::map_page(root, virt, phys, attrs)
        })
        .unwrap_or(Err(crate::error::KernelError::NotInitialized {
            subsystem: "VMM",
        }))
}

pub fn translate(virt: usize) -> Option<usize> {
    KERNEL_ROOT
        .with(|mtx| {
            let root_phys = *mtx.lock();
            // SAFETY: the lock is held for the duration of this call.
            let root = unsafe { root_table(root_phys) };
            vmm::translate(root, virt)
        })
        .flatten()
}
