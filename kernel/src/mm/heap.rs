//! Kernel heap: a single intrusive free-list allocator, first-fit with
//! splitting and forward-only coalescing, serving a contiguous region of
//! kernel RAM. Wired as the crate's `#[global_allocator]`.

use core::{
    alloc::{GlobalAlloc, Layout},
    ptr::NonNull,
};

use spin::Mutex;

use crate::error::{KernelError, KernelResult};

const ALIGN: usize = 16;

/// Block header, immediately preceding every payload. Free and used
/// blocks share this layout; `next` links the singly-linked list in
/// address order (not just among free blocks -- see `free`'s coalescing
/// walk, which must see the immediately following block regardless of
/// its state).
#[repr(C)]
struct BlockHeader {
    size: usize,
    next: *mut BlockHeader,
    free: bool,
    /// Explicit padding so `HEADER_SIZE` is a multiple of 16 -- without
    /// it the struct's natural size (17 bytes rounded to 8-byte
    /// alignment = 24) leaves every payload permanently offset 8 mod 16
    /// from the 16-byte-aligned heap start.
    _pad: [u8; 15],
}

const HEADER_SIZE: usize = core::mem::size_of::<BlockHeader>();
const _: () = assert!(HEADER_SIZE % ALIGN == 0);

fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

struct FreeListHeap {
    head: *mut BlockHeader,
}

// SAFETY: the heap is only ever reached through `HEAP_LOCK`, which
// serializes all access.
unsafe impl Send for FreeListHeap {}

impl FreeListHeap {
    const fn empty() -> Self {
        Self {
            head: core::ptr::null_mut(),
        }
    }

    fn init(&mut self, start: usize, end: usize) {
        let aligned_start = align_up(start, ALIGN);
        assert!(
            aligned_start + HEADER_SIZE < end,
            "heap region too small to hold a single header"
        );
        let block = aligned_start as *mut BlockHeader;
        let payload_size = end - aligned_start - HEADER_SIZE;
        // SAFETY: `aligned_start` is within the caller-supplied RAM
        // region and large enough for one `BlockHeader`.
        unsafe {
            (*block).size = payload_size;
            (*block).next = core::ptr::null_mut();
            (*block).free = true;
        }
        self.head = block;
    }

    fn allocate(&mut self, size: usize) -> *mut u8 {
        let size = align_up(size.max(1), ALIGN);

        let mut cursor = self.head;
        while !cursor.is_null() {
            // SAFETY: `cursor` is a live block header in this heap's
            // list, either the initial block from `init` or one written
            // by a prior `allocate`/`free` call.
            let block = unsafe { &mut *cursor };
            if block.free && block.size >= size {
                self.split_and_take(cursor, size);
                let payload = unsafe { (cursor as *mut u8).add(HEADER_SIZE) };
                // SAFETY: `payload` is `block.size` (>= `size`) bytes of
                // memory this allocator now owns exclusively.
                unsafe {
                    core::ptr::write_bytes(payload, 0, size);
                }
                return payload;
            }
            cursor = block.next;
        }
        core::ptr::null_mut()
    }

    /// Mark `block` used, splitting off a trailing free block if the
    /// residue can hold a header plus at least 16 payload bytes.
    fn split_and_take(&mut self, block_ptr: *mut BlockHeader, size: usize) {
        // SAFETY: caller (`allocate`) guarantees `block_ptr` is a live
        // free block with `size_free >= size`.
        let block = unsafe { &mut *block_ptr };
        let remainder = block.size - size;

        if remainder >= HEADER_SIZE + ALIGN {
            let new_block_addr = unsafe { (block_ptr as *mut u8).add(HEADER_SIZE + size) };
            let new_block = new_block_addr as *mut BlockHeader;
            // SAFETY: `new_block_addr` lies within the original block's
            // payload region, which this allocator exclusively owns.
            unsafe {
                (*new_block).size = remainder - HEADER_SIZE;
                (*new_block).next = block.next;
                (*new_block).free = true;
            }
            block.size = size;
            block.next = new_block;
        }
        block.free = false;
    }

    fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        // SAFETY: `ptr` was returned by a prior `allocate` on this heap,
        // so the header immediately precedes it.
        let block_ptr = unsafe { ptr.sub(HEADER_SIZE) } as *mut BlockHeader;
        // SAFETY: see above.
        unsafe { (*block_ptr).free = true };

        // Forward-only coalescing, swept over the whole list so that a
        // chain of blocks freed out of address order (as in the spec's
        // "split + coalesce" scenario: free(b); free(a); free(c)) still
        // ends up fully merged -- no two adjacent free blocks survive a
        // completed `free` call.
        let mut cursor = self.head;
        while !cursor.is_null() {
            // SAFETY: list traversal invariant, see `allocate`.
            let block = unsafe { &mut *cursor };
            while block.free {
                let next_ptr = block.next;
                if next_ptr.is_null() {
                    break;
                }
                // SAFETY: `next_ptr` is a live block header.
                let next = unsafe { &*next_ptr };
                if !next.free {
                    break;
                }
                block.size += HEADER_SIZE + next.size;
                block.next = next.next;
            }
            cursor = block.next;
        }
    }
}

static HEAP: Mutex<FreeListHeap> = Mutex::new(FreeListHeap::empty());

/// Initialize the kernel heap over `[start, end)`. `start` is aligned
/// upward to 16 bytes; a single free block spans the aligned region.
pub fn init(start: usize, end: usize) {
    HEAP.lock().init(start, end);
    log::info!("kernel heap initialized: {:#x}..{:#x}", start, end);
}

/// Allocate `size` bytes, zeroed, 16-byte aligned. Returns a null pointer
/// on exhaustion.
pub fn allocate(size: usize) -> *mut u8 {
    HEAP.lock().allocate(size)
}

/// Same as [`allocate`] but surfaces exhaustion as a [`KernelError`].
pub fn try_allocate(size: usize) -> KernelResult<NonNull<u8>> {
    NonNull::new(allocate(size)).ok_or(KernelError::HeapExhausted { requested: size })
}

/// Free a previously allocated pointer. `free(null)` is a no-op.
pub fn free(ptr: *mut u8) {
    HEAP.lock().free(ptr)
}

/// Sum of free-block payload sizes, for the round-trip accounting law in
/// spec §8 (and exercised by `tests/heap_tests.rs`).
pub fn free_bytes() -> usize {
    let heap = HEAP.lock();
    let mut total = 0;
    let mut cursor = heap.head;
    while !cursor.is_null() {
        // SAFETY: list traversal invariant as in `allocate`.
        let block = unsafe { &*cursor };
        if block.free {
            total += block.size;
        }
        cursor = block.next;
    }
    total
}

/// The kernel's `#[global_allocator]`. `GlobalAlloc::alloc` ignores
/// `Layout`'s alignment beyond [`ALIGN`] -- the heap only ever serves
/// 16-byte-aligned requests, matching every allocation this kernel makes
/// (process stacks, page tables via the PPM bypass this allocator
/// entirely).
pub struct KernelHeap;

// SAFETY: `allocate`/`free` are implemented to satisfy `GlobalAlloc`'s
// contract: `alloc` returns either null or a pointer to at least
// `layout.size()` usable, suitably aligned bytes; `dealloc` is only ever
// called with a pointer previously returned by `alloc` on this allocator.
unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        assert!(
            layout.align() <= ALIGN,
            "kernel heap cannot satisfy alignment > {ALIGN}"
        );
        allocate(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        free(ptr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_heap(bytes: usize) -> FreeListHeap {
        use alloc::alloc::{alloc, Layout};
        let layout = Layout::from_size_align(bytes, ALIGN).unwrap();
        // SAFETY: non-zero size, valid alignment; leaked for the test.
        let ptr = unsafe { alloc(layout) };
        assert!(!ptr.is_null());
        let mut heap = FreeListHeap::empty();
        heap.init(ptr as usize, ptr as usize + bytes);
        heap
    }

    #[test]
    fn single_alloc_is_zeroed_and_sized() {
        let mut heap = fresh_heap(4096);
        let p = heap.allocate(100);
        assert!(!p.is_null());
        // SAFETY: p is valid for 100 bytes, just allocated.
        let slice = unsafe { core::slice::from_raw_parts(p, 100) };
        assert!(slice.iter().all(|&b| b == 0));
    }

    #[test]
    fn free_then_alloc_round_trip_conserves_total() {
        let mut heap = fresh_heap(64 * 1024);
        let total_free = |h: &FreeListHeap| {
            let mut cursor = h.head;
            let mut free_total = 0usize;
            let mut used_total = 0usize;
            while !cursor.is_null() {
                let block = unsafe { &*cursor };
                if block.free {
                    free_total += block.size;
                } else {
                    used_total += block.size;
                }
                cursor = block.next;
            }
            (free_total, used_total)
        };

        let (before_free, _) = total_free(&heap);
        let p = heap.allocate(200);
        heap.free(p);
        let (after_free, after_used) = total_free(&heap);
        assert_eq!(after_used, 0);
        // Forward coalescing reclaims the full region (allocate from the
        // sole block then free leaves it the sole block again).
        assert_eq!(before_free, after_free);
    }

    #[test]
    fn free_null_is_noop() {
        let mut heap = fresh_heap(4096);
        heap.free(core::ptr::null_mut());
    }

    #[test]
    fn s4_split_then_coalesce_scenario() {
        // spec S4: a = allocate(100); b = allocate(200); c = allocate(100);
        // free(b); free(a); free(c); -> single free block of original size.
        let mut heap = fresh_heap(64 * 1024);
        let initial_free = {
            let block = unsafe { &*heap.head };
            block.size
        };

        let a = heap.allocate(100);
        let b = heap.allocate(200);
        let c = heap.allocate(100);
        heap.free(b);
        heap.free(a);
        heap.free(c);

        // Exactly one free block remains, and forward coalescing folded
        // the three adjacent used-then-freed blocks back together.
        let mut count = 0;
        let mut cursor = heap.head;
        let mut final_size = 0;
        while !cursor.is_null() {
            let block = unsafe { &*cursor };
            assert!(block.free, "all blocks must be free after S4");
            count += 1;
            final_size = block.size;
            cursor = block.next;
        }
        assert_eq!(count, 1);
        assert_eq!(final_size, initial_free);
    }

    #[test]
    fn allocation_exhaustion_returns_null() {
        let mut heap = fresh_heap(256);
        // First allocation takes nearly the whole region (minus header),
        // a second of meaningful size should fail.
        let p = heap.allocate(4096);
        assert!(p.is_null());
    }
}
