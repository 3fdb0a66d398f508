//! AArch64 context-switch primitive.
//!
//! The real register save/restore sequence is one of the spec's
//! out-of-scope external collaborators (assembly that saves x19-x28,
//! the frame pointer, and the link register onto the outgoing stack
//! and restores the incoming set). This is the interface the scheduler
//! calls; like the rest of this module's register-level code, it's a
//! placeholder until that assembly exists.

use crate::process::pcb::SavedContext;

/// Switch from `current`'s saved context to `next`'s.
///
/// # Safety
/// Caller must hold no other references into either context and must
/// call this with interrupts disabled.
pub unsafe fn context_switch(current: *mut SavedContext, next: *const SavedContext) {
    // Note: a real implementation saves x19-x28/fp/pc/sp into `current`
    // and restores `next`'s into the live registers before returning
    // into the new process. This placeholder only moves the record.
    // SAFETY: forwarded from this function's own contract.
    unsafe {
        core::ptr::copy_nonoverlapping(next, current, 1);
    }
}
