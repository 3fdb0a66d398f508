//! Bare-metal entry binary. All real logic lives in the `kernel_core`
//! library; this crate only needs to exist so the linker has a binary
//! target to produce, and so `_start_rust`'s `#[no_mangle]` definition
//! in the library is actually linked in.

#![no_std]
#![no_main]

use kernel_core as _;
