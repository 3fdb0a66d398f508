//! Black-box kernel heap scenario (spec §8 S4 and the round-trip law).
//!
//! All tests in this file drive the one process-wide `HEAP` static, so
//! they share a mutex to run strictly one at a time rather than racing
//! each other's `init` calls.

use std::sync::Mutex;

static SERIAL: Mutex<()> = Mutex::new(());

fn leak_region(bytes: usize) -> (usize, usize) {
    let layout = std::alloc::Layout::from_size_align(bytes, 16).unwrap();
    // SAFETY: non-zero size, 16-byte alignment; leaked for the test's
    // lifetime, matching the kernel's own "RAM carved out at boot" model.
    let ptr = unsafe { std::alloc::alloc(layout) };
    assert!(!ptr.is_null());
    (ptr as usize, ptr as usize + bytes)
}

/// S4 -- Heap split + coalesce: allocate a, b, c; free out of order
/// (b, a, c); the heap must fully re-merge into one free block equal to
/// the original payload size.
#[test]
fn s4_split_and_coalesce() {
    let _guard = SERIAL.lock().unwrap();
    let (start, end) = leak_region(64 * 1024);
    kernel_core::mm::heap::init(start, end);

    let initial_free = kernel_core::mm::heap::free_bytes();

    let a = kernel_core::mm::heap::allocate(100);
    let b = kernel_core::mm::heap::allocate(200);
    let c = kernel_core::mm::heap::allocate(100);
    assert!(!a.is_null() && !b.is_null() && !c.is_null());

    kernel_core::mm::heap::free(b);
    kernel_core::mm::heap::free(a);
    kernel_core::mm::heap::free(c);

    assert_eq!(kernel_core::mm::heap::free_bytes(), initial_free);
}

/// Round-trip law: `allocate` then `free` conserves total free bytes,
/// and `free(null)` is a no-op.
#[test]
fn allocate_free_round_trip_and_null_is_noop() {
    let _guard = SERIAL.lock().unwrap();
    let (start, end) = leak_region(16 * 1024);
    kernel_core::mm::heap::init(start, end);

    let before = kernel_core::mm::heap::free_bytes();
    let p = kernel_core::mm::heap::allocate(64);
    assert!(!p.is_null());
    assert!(kernel_core::mm::heap::free_bytes() < before);
    kernel_core::mm::heap::free(p);
    assert_eq!(kernel_core::mm::heap::free_bytes(), before);

    kernel_core::mm::heap::free(core::ptr::null_mut());
    assert_eq!(kernel_core::mm::heap::free_bytes(), before);
}

/// Exhaustion: a request larger than the whole region returns null and
/// `try_allocate` surfaces it as `HeapExhausted`.
#[test]
fn exhaustion_returns_null_and_error() {
    let _guard = SERIAL.lock().unwrap();
    let (start, end) = leak_region(256);
    kernel_core::mm::heap::init(start, end);

    assert!(kernel_core::mm::heap::allocate(4096).is_null());
    assert!(matches!(
        kernel_core::mm::heap::try_allocate(4096),
        Err(kernel_core::error::KernelError::HeapExhausted { requested: 4096 })
    ));
}
