//! Rust-side boot continuation, reached from `boot.S` (external trampoline:
//! selects core 0, sets the stack, branches here -- BSS zeroing is also
//! done here since the linker symbols are more naturally named from Rust).

#[no_mangle]
#[link_section = ".text.boot"]
pub extern "C" fn _start_rust() -> ! {
    extern "C" {
        static mut __bss_start: u8;
        static mut __bss_end: u8;
    }

    // SAFETY: __bss_start/__bss_end are linker-provided symbols bounding
    // the BSS section reserved in link.ld; zeroing it before any static
    // with interior mutability is touched is required by the ABI the rest
    // of the kernel assumes.
    unsafe {
        let bss_start = &raw mut __bss_start;
        let bss_end = &raw const __bss_end;
        let bss_size = bss_end as usize - bss_start as usize;
        core::ptr::write_bytes(bss_start, 0, bss_size);
    }

    crate::kernel_main()
}
