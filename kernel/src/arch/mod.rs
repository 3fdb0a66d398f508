//! Architecture support. AArch64 only -- see `DESIGN.md` for why the
//! teacher's x86_64/RISC-V ports were dropped.

pub mod aarch64;
pub mod barriers;

pub use aarch64::halt;

/// Bring up the platform: exception vectors, GIC, generic timer.
///
/// Must run after [`crate::serial::init`] and [`crate::logger::init`] (so
/// early failures are visible) and before interrupts are unmasked -- the
/// vector table must be installed before the GIC/timer can safely fire.
pub fn init() -> crate::error::KernelResult<()> {
    // SAFETY: called once during boot, before interrupts are unmasked.
    unsafe { aarch64::vectors::init()? };
    aarch64::gic::init()?;
    aarch64::timer::init()?;
    Ok(())
}
