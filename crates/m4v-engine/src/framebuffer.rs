//! Frame-buffer storage variants.
//!
//! A frame buffer is a fixed-size pixel region matching the LCD geometry.
//! Two storage variants exist, selected once at configuration time:
//!
//! - **Magic**: a fixed physical region the LCD controller scans directly.
//!   Writing decoded pixels there *is* presentation.
//! - **Owned**: a cache-line-aligned heap buffer of `W·H·bpp` bytes that a
//!   later blit (or a scan-out base-pointer swap) makes visible.
//!
//! The presenter picks its code path from configuration, never per frame.

use crate::aligned::{AlignedBuf, AllocError};

/// LCD width in landscape orientation, in pixels.
pub const SCREEN_WIDTH: usize = 320;
/// LCD height in landscape orientation, in pixels.
pub const SCREEN_HEIGHT: usize = 240;
/// Pixels per full frame.
pub const FRAME_TOTAL_PIXELS: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// Pixel storage format of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 16-bit RGB565.
    Rgb565,
    /// 24-bit RGB stored in 32-bit cells.
    Rgb888,
}

impl PixelLayout {
    /// Bytes per pixel as stored.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb565 => 2,
            PixelLayout::Rgb888 => 4,
        }
    }
}

/// One frame buffer of the swap chain.
pub enum FrameBuffer {
    /// Direct scan-out region at a fixed physical address. Always RGB565.
    Magic { base: usize, len: usize },
    /// Heap-allocated pixels, cache-line aligned.
    Owned { pixels: AlignedBuf, layout: PixelLayout },
}

impl FrameBuffer {
    /// Wraps the LCD's own scan-out region.
    ///
    /// # Safety
    ///
    /// `base` must point to a mapped, writable region of at least
    /// `FRAME_TOTAL_PIXELS * 2` bytes that stays valid for the life of the
    /// buffer, and nothing else may access it while the engine runs.
    pub unsafe fn magic(base: usize) -> Self {
        FrameBuffer::Magic {
            base,
            len: FRAME_TOTAL_PIXELS * PixelLayout::Rgb565.bytes_per_pixel(),
        }
    }

    /// Allocates an owned frame buffer for the given pixel layout.
    pub fn owned(layout: PixelLayout) -> Result<Self, AllocError> {
        let pixels = AlignedBuf::cache_aligned(FRAME_TOTAL_PIXELS * layout.bytes_per_pixel())?;
        Ok(FrameBuffer::Owned { pixels, layout })
    }

    /// Base address of the pixel storage.
    pub fn base_addr(&self) -> usize {
        match self {
            FrameBuffer::Magic { base, .. } => *base,
            FrameBuffer::Owned { pixels, .. } => pixels.addr(),
        }
    }

    /// Size of the pixel storage in bytes.
    pub fn len(&self) -> usize {
        match self {
            FrameBuffer::Magic { len, .. } => *len,
            FrameBuffer::Owned { pixels, .. } => pixels.len(),
        }
    }

    /// Never true; both variants hold a full frame.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The pixel bytes, read-only.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            // SAFETY: construction contract of `magic` - the region is mapped,
            // sized `len`, and exclusively ours.
            FrameBuffer::Magic { base, len } => unsafe {
                std::slice::from_raw_parts(*base as *const u8, *len)
            },
            FrameBuffer::Owned { pixels, .. } => pixels,
        }
    }

    /// The pixel bytes, writable (decode target).
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            // SAFETY: construction contract of `magic`, plus `&mut self`
            // guarantees unique access through this handle.
            FrameBuffer::Magic { base, len } => unsafe {
                std::slice::from_raw_parts_mut(*base as *mut u8, *len)
            },
            FrameBuffer::Owned { pixels, .. } => pixels,
        }
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameBuffer::Magic { base, len } => f
                .debug_struct("Magic")
                .field("base", &format_args!("{base:#x}"))
                .field("len", len)
                .finish(),
            FrameBuffer::Owned { pixels, layout } => f
                .debug_struct("Owned")
                .field("addr", &format_args!("{:#x}", pixels.addr()))
                .field("len", &pixels.len())
                .field("layout", layout)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_sizes_match_layout() {
        let fb = FrameBuffer::owned(PixelLayout::Rgb565).unwrap();
        assert_eq!(fb.len(), FRAME_TOTAL_PIXELS * 2);
        let fb = FrameBuffer::owned(PixelLayout::Rgb888).unwrap();
        assert_eq!(fb.len(), FRAME_TOTAL_PIXELS * 4);
    }

    #[test]
    fn owned_is_writable_and_cache_aligned() {
        let mut fb = FrameBuffer::owned(PixelLayout::Rgb565).unwrap();
        assert_eq!(fb.base_addr() % crate::aligned::CACHE_LINE_SIZE, 0);
        fb.as_mut_slice()[0] = 0x5A;
        assert_eq!(fb.as_slice()[0], 0x5A);
    }

    #[test]
    fn magic_reports_scanout_geometry() {
        let backing = vec![0u8; FRAME_TOTAL_PIXELS * 2].leak();
        // SAFETY: `backing` is leaked and exactly frame-sized.
        let fb = unsafe { FrameBuffer::magic(backing.as_ptr() as usize) };
        assert_eq!(fb.base_addr(), backing.as_ptr() as usize);
        assert_eq!(fb.len(), FRAME_TOTAL_PIXELS * 2);
    }
}
