//! On-chip SRAM scratch handling.
//!
//! The decoder keeps its hot lookup tables in a 128 KiB window of on-chip
//! SRAM that is ordinarily in use by the host environment. The engine
//! therefore treats it as a scoped resource: snapshot the window to SDRAM
//! at construction and copy it back unconditionally when the engine goes
//! away, on every exit path. No other component may allocate from the
//! window while the engine is alive.

/// A raw window of on-chip SRAM.
pub struct SramRegion {
    base: *mut u8,
    len: usize,
}

impl SramRegion {
    /// Wraps a raw SRAM window.
    ///
    /// # Safety
    ///
    /// `base..base+len` must be mapped, readable and writable for the life
    /// of the region, and nothing else may access it while the engine holds
    /// the region.
    pub unsafe fn from_raw(base: *mut u8, len: usize) -> Self {
        Self { base, len }
    }

    /// Size of the window in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the window has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base address of the window.
    pub fn base_addr(&self) -> usize {
        self.base as usize
    }

    /// The window's bytes.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: construction contract of `from_raw`.
        unsafe { std::slice::from_raw_parts(self.base, self.len) }
    }

    /// The window's bytes, writable.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: construction contract of `from_raw`; `&mut self` gives
        // unique access through this handle.
        unsafe { std::slice::from_raw_parts_mut(self.base, self.len) }
    }
}

impl std::fmt::Debug for SramRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SramRegion")
            .field("base", &format_args!("{:#x}", self.base as usize))
            .field("len", &self.len)
            .finish()
    }
}

/// Scoped shadow of an SRAM window: captures the contents on construction
/// and restores them on drop.
#[derive(Debug)]
pub struct SramShadow {
    region: SramRegion,
    snapshot: Vec<u8>,
}

impl SramShadow {
    /// Snapshots `region` to the heap and takes ownership of it until drop.
    pub fn capture(region: SramRegion) -> Self {
        let snapshot = region.as_slice().to_vec();
        Self { region, snapshot }
    }

    /// The shadowed window, free for the decoder to scribble on.
    pub fn region_mut(&mut self) -> &mut SramRegion {
        &mut self.region
    }

    /// The shadowed window, read-only.
    pub fn region(&self) -> &SramRegion {
        &self.region
    }
}

impl Drop for SramShadow {
    fn drop(&mut self) {
        self.region.as_mut_slice().copy_from_slice(&self.snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_contents_on_drop() {
        let mut backing = vec![0xA5u8; 1024].into_boxed_slice();
        let base = backing.as_mut_ptr();
        {
            // SAFETY: `backing` outlives the shadow and is not otherwise
            // touched while the shadow is alive.
            let region = unsafe { SramRegion::from_raw(base, backing.len()) };
            let mut shadow = SramShadow::capture(region);
            shadow.region_mut().as_mut_slice().fill(0x00);
            assert!(shadow.region().as_slice().iter().all(|&b| b == 0x00));
        }
        assert!(backing.iter().all(|&b| b == 0xA5));
    }

    #[test]
    fn region_reports_geometry() {
        let mut backing = [0u8; 64];
        // SAFETY: `backing` outlives the region.
        let region = unsafe { SramRegion::from_raw(backing.as_mut_ptr(), backing.len()) };
        assert_eq!(region.len(), 64);
        assert!(!region.is_empty());
        assert_eq!(region.base_addr(), backing.as_ptr() as usize);
    }
}
