//! SVC syscall dispatch (spec §4.7, §6).
//!
//! The syscall number arrives in the conventional number register (x8);
//! arguments in x0-x2. The exception vector's `sync_from_user` trap
//! saves x0-x9 to the stack before calling [`dispatch`] and restores
//! them afterward, so a return value is communicated back by writing
//! into the saved x0 slot.

pub const SYS_WRITE: u64 = 0;
pub const SYS_EXIT: u64 = 1;
pub const SYS_OPEN: u64 = 2;
pub const SYS_READ: u64 = 3;

/// Dispatch one trapped SVC. `frame` points at 10 saved `u64` registers
/// x0..x9, laid out by the vector table's trampoline.
///
/// # Safety
/// `frame` must point at exactly 10 valid, writable `u64` slots.
pub unsafe fn dispatch(frame: *mut u64) {
    // SAFETY: forwarded from this function's own contract.
    let regs = unsafe { core::slice::from_raw_parts_mut(frame, 10) };
    let number = regs[8];
    let arg0 = regs[0];
    let arg1 = regs[1];

    let ret = match number {
        SYS_WRITE => sys_write(arg0 as *const u8, arg1 as usize),
        SYS_EXIT => crate::process::exit(arg0 as i32),
        SYS_OPEN => sys_open(),
        SYS_READ => sys_read(arg0 as *mut u8, arg1 as usize),
        other => {
            log::warn!("unknown syscall number {other}");
            -1
        }
    };
    regs[0] = ret as u64;
}

fn sys_write(buf: *const u8, len: usize) -> i64 {
    if buf.is_null() {
        return -1;
    }
    // SAFETY: trusts the caller-supplied user pointer/length, matching
    // the spec's syscall contract ("arguments come from a conventional
    // argument register") -- no per-process address space to validate
    // the range against (spec's non-goal).
    let bytes = unsafe { core::slice::from_raw_parts(buf, len) };
    for &b in bytes {
        crate::serial::write_byte(b);
    }
    len as i64
}

fn sys_open() -> i64 {
    log::warn!("OPEN: no filesystem backing in this build");
    -1
}

fn sys_read(_buf: *mut u8, _len: usize) -> i64 {
    log::warn!("READ: no filesystem backing in this build");
    -1
}
