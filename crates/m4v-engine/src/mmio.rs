//! Memory-mapped device access.
//!
//! Every peripheral register access goes through a [`DeviceBus`] so the
//! engine never touches raw addresses directly. The hardware implementation
//! ([`MmioBus`]) uses volatile loads and stores - the compiler may not
//! reorder or elide them - and follows every store with a bounded busy-wait,
//! because the dual-timer and LCD blocks need a register-write settle period
//! before the next access is guaranteed to observe the new value.

/// CPU core clock of the target handheld, in Hz.
pub const CPU_HZ: u32 = 396_000_000;

/// 32-bit register access at byte offsets from a device's base address.
pub trait DeviceBus {
    /// Reads the register at `offset`.
    fn read32(&self, offset: usize) -> u32;

    /// Writes the register at `offset`, then waits out the device's
    /// register-write settle period.
    fn write32(&mut self, offset: usize, value: u32);
}

/// Number of settle spins needed after a register write on a peripheral
/// clocked at `device_hz`: one device clock expressed in CPU cycles.
pub fn settle_spins(device_hz: u32) -> u32 {
    CPU_HZ / device_hz.max(1)
}

/// Volatile MMIO implementation of [`DeviceBus`].
pub struct MmioBus {
    base: *mut u8,
    settle_spins: u32,
}

impl MmioBus {
    /// Maps a device at the given physical base address.
    ///
    /// # Safety
    ///
    /// `base` must be the mapped base of a device whose registers are valid
    /// 32-bit cells at every offset this bus is used with, and no other code
    /// may access the device while this bus exists.
    pub unsafe fn new(base: usize, settle_spins: u32) -> Self {
        Self {
            base: base as *mut u8,
            settle_spins,
        }
    }

    fn settle(&self) {
        for i in 0..self.settle_spins {
            std::hint::black_box(i);
            std::hint::spin_loop();
        }
    }
}

impl DeviceBus for MmioBus {
    fn read32(&self, offset: usize) -> u32 {
        // SAFETY: construction contract - `base + offset` is a valid register.
        unsafe { (self.base.add(offset) as *const u32).read_volatile() }
    }

    fn write32(&mut self, offset: usize, value: u32) {
        // SAFETY: construction contract - `base + offset` is a valid register.
        unsafe { (self.base.add(offset) as *mut u32).write_volatile(value) };
        self.settle();
    }
}
