//! Physical Page Manager: a bitmap-based frame allocator over a fixed
//! region of physical RAM.
//!
//! Grounded on the teacher's GIC driver pattern of a `GlobalState`-backed
//! singleton initialized once during boot (`arch::aarch64::gic::GIC`),
//! adapted here to own a bitmap instead of MMIO base addresses.

use spin::Mutex;

use crate::{
    error::{KernelError, KernelResult},
    sync::once_lock::GlobalState,
};

/// Frame size, fixed at the AArch64 base page granule.
pub const FRAME_SIZE: usize = 4096;

/// Upper bound on managed RAM: 128 MiB, matching the VMM's boot-time
/// identity map of the full RAM range (spec §4.2).
const MAX_MANAGED_BYTES: usize = 128 * 1024 * 1024;
const MAX_FRAMES: usize = MAX_MANAGED_BYTES / FRAME_SIZE;
const BITMAP_WORDS: usize = MAX_FRAMES.div_ceil(64);

struct FrameBitmap {
    base: usize,
    frame_count: usize,
    bits: [u64; BITMAP_WORDS],
}

impl FrameBitmap {
    const fn new() -> Self {
        Self {
            base: 0,
            frame_count: 0,
            bits: [0; BITMAP_WORDS],
        }
    }

    fn is_set(&self, idx: usize) -> bool {
        self.bits[idx / 64] & (1 << (idx % 64)) != 0
    }

    fn set(&mut self, idx: usize) {
        self.bits[idx / 64] |= 1 << (idx % 64);
    }

    fn clear(&mut self, idx: usize) {
        self.bits[idx / 64] &= !(1 << (idx % 64));
    }

    /// First-fit scan for a free frame.
    fn find_free(&self) -> Option<usize> {
        (0..self.frame_count).find(|&idx| !self.is_set(idx))
    }
}

static PPM: GlobalState<Mutex<FrameBitmap>> = GlobalState::new();

/// Initialize the physical page manager over `[base, base + size)`.
///
/// # Panics
///
/// Panics (per spec §4.1, a kernel bootstrap invariant violation) if
/// `size` is not a multiple of [`FRAME_SIZE`] or exceeds the compiled
/// bitmap capacity ([`MAX_MANAGED_BYTES`]).
pub fn init(base: usize, size: usize) {
    assert!(
        size % FRAME_SIZE == 0,
        "PPM::init: size {size:#x} is not a multiple of the frame size"
    );
    assert!(
        size <= MAX_MANAGED_BYTES,
        "PPM::init: size {size:#x} exceeds compiled bitmap capacity {MAX_MANAGED_BYTES:#x}"
    );

    let bitmap = FrameBitmap {
        base,
        frame_count: size / FRAME_SIZE,
        bits: [0; BITMAP_WORDS],
    };

    PPM.init(Mutex::new(bitmap))
        .unwrap_or_else(|_| panic!("PPM::init called twice"));

    log::info!("PPM initialized: base={base:#x} frames={}", size / FRAME_SIZE);
}

/// Allocate one zeroed frame. Returns 0 on exhaustion (per spec §4.1; the
/// physical base of frame 0 is never handed out to a caller since it
/// always lies below `base`).
pub fn get_free_page() -> usize {
    PPM.with_mut(|mtx| {
        let mut bm = mtx.lock();
        let Some(idx) = bm.find_free() else {
            log::warn!("PPM: Out of Memory");
            return 0;
        };
        bm.set(idx);
        let phys = bm.base + idx * FRAME_SIZE;
        // SAFETY: `phys` is the base of a frame this allocator just
        // marked allocated and has not handed out to anyone else; it is
        // within the managed RAM region passed to `init` and mapped
        // identity at boot, so a raw write is valid and exclusive.
        unsafe {
            core::ptr::write_bytes(phys as *mut u8, 0, FRAME_SIZE);
        }
        phys
    })
    .unwrap_or(0)
}

/// Same as [`get_free_page`] but surfaces exhaustion as a [`KernelError`]
/// instead of the sentinel `0` return, for callers that propagate with
/// `?` (e.g. the demand-paging fault handler).
pub fn try_get_free_page() -> KernelResult<usize> {
    match get_free_page() {
        0 => Err(KernelError::OutOfMemory),
        phys => Ok(phys),
    }
}

/// Return a frame to the pool. Out-of-range addresses are silently
/// ignored -- guards against spurious frees (spec §4.1). Does not zero
/// on free; the next `get_free_page` will.
pub fn free_page(phys_addr: usize) {
    PPM.with_mut(|mtx| {
        let mut bm = mtx.lock();
        if phys_addr < bm.base || (phys_addr - bm.base) % FRAME_SIZE != 0 {
            return;
        }
        let idx = (phys_addr - bm.base) / FRAME_SIZE;
        if idx >= bm.frame_count {
            return;
        }
        bm.clear(idx);
    });
}

/// Count of currently allocated frames (diagnostic use only).
pub fn allocated_count() -> usize {
    PPM.with(|mtx| {
        let bm = mtx.lock();
        (0..bm.frame_count).filter(|&i| bm.is_set(i)).count()
    })
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The public API is a process-wide singleton, so unit tests exercise
    // `FrameBitmap` directly rather than racing each other through `PPM`
    // (the std test harness runs tests in parallel threads of one process).

    fn region(frames: usize) -> FrameBitmap {
        use alloc::alloc::{alloc, Layout};
        let layout = Layout::from_size_align(frames * FRAME_SIZE, FRAME_SIZE).unwrap();
        // SAFETY: layout has non-zero size and valid alignment; the
        // allocation is leaked for the test's duration, which is fine for
        // a short-lived unit test.
        let ptr = unsafe { alloc(layout) };
        assert!(!ptr.is_null());
        FrameBitmap {
            base: ptr as usize,
            frame_count: frames,
            bits: [0; BITMAP_WORDS],
        }
    }

    fn alloc_frame(bm: &mut FrameBitmap) -> Option<usize> {
        let idx = bm.find_free()?;
        bm.set(idx);
        Some(bm.base + idx * FRAME_SIZE)
    }

    fn free_frame(bm: &mut FrameBitmap, phys: usize) {
        if phys < bm.base || (phys - bm.base) % FRAME_SIZE != 0 {
            return;
        }
        let idx = (phys - bm.base) / FRAME_SIZE;
        if idx < bm.frame_count {
            bm.clear(idx);
        }
    }

    fn allocated(bm: &FrameBitmap) -> usize {
        (0..bm.frame_count).filter(|&i| bm.is_set(i)).count()
    }

    #[test]
    fn alloc_then_free_is_inverse_on_bitmap() {
        let mut bm = region(16);
        let p = alloc_frame(&mut bm).unwrap();
        assert_eq!(allocated(&bm), 1);
        free_frame(&mut bm, p);
        assert_eq!(allocated(&bm), 0);
    }

    #[test]
    fn free_of_out_of_range_address_is_ignored() {
        let mut bm = region(16);
        free_frame(&mut bm, 0xdead_beef);
        assert_eq!(allocated(&bm), 0);
    }

    #[test]
    fn exhaustion_returns_none() {
        let mut bm = region(4);
        for _ in 0..4 {
            assert!(alloc_frame(&mut bm).is_some());
        }
        assert!(alloc_frame(&mut bm).is_none());
    }

    #[test]
    fn first_fit_picks_lowest_free_index() {
        let mut bm = region(4);
        let a = alloc_frame(&mut bm).unwrap();
        let b = alloc_frame(&mut bm).unwrap();
        free_frame(&mut bm, a);
        let c = alloc_frame(&mut bm).unwrap();
        assert_eq!(a, c, "first-fit should reuse the lowest freed frame");
        let _ = b;
    }
}
