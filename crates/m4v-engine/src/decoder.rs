//! Contract of the external MPEG-4 decoder.
//!
//! The decoder itself is an external collaborator: the engine hands it a
//! window of bitstream bytes and an output plane, and gets back the number
//! of bytes consumed plus the kind of unit that was decoded. The engine
//! interprets three consumption shapes:
//!
//! - `bytes_consumed == 0` - the window held no complete unit; refill and
//!   retry.
//! - `bytes_consumed > window.len()` - the decoder read past the supplied
//!   window (the coded frame is larger than the window); treated exactly
//!   like insufficient data.
//! - otherwise - a unit was decoded; the engine advances its read head.
//!
//! The decoder keeps its hot lookup tables in an on-chip SRAM scratch
//! window that the engine lends it before the first decode.

use std::fmt;

use crate::sram::SramRegion;

/// Kind of bitstream unit reported by the decoder, with its wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Intra-coded picture.
    IVop,
    /// Predicted picture.
    PVop,
    /// Bidirectionally predicted picture.
    BVop,
    /// Sprite/GMC picture.
    SVop,
    /// Video Object Layer header.
    Vol,
    /// Decoder-internal tag for an empty/skipped picture.
    NVop,
    /// Anything else the decoder may report.
    Other(i32),
}

impl UnitKind {
    /// The decoder's numeric tag for this unit kind.
    pub fn code(self) -> i32 {
        match self {
            UnitKind::Vol => -1,
            UnitKind::IVop => 1,
            UnitKind::PVop => 2,
            UnitKind::BVop => 3,
            UnitKind::SVop => 4,
            UnitKind::NVop => 5,
            UnitKind::Other(code) => code,
        }
    }

    /// True for the four picture kinds that fill a frame buffer.
    pub fn is_picture(self) -> bool {
        matches!(
            self,
            UnitKind::IVop | UnitKind::PVop | UnitKind::BVop | UnitKind::SVop
        )
    }
}

/// Per-call decoder switches, mapped from the engine's options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeFlags {
    /// Trade decode quality for speed.
    pub fast: bool,
    /// Low-delay mode; disables B-frames.
    pub low_delay: bool,
    pub deblock_luma: bool,
    pub deblock_chroma: bool,
    pub dering_luma: bool,
    pub dering_chroma: bool,
    /// The input window is not contiguous with the previous call's bytes;
    /// forces a reference-frame resync.
    pub discontinuity: bool,
}

/// Requested output colourspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputColorspace {
    /// 16-bit RGB565, the LCD's native format.
    Rgb565,
    /// 24-bit RGB stored in 32-bit cells.
    Rgb888,
    /// Leave the frame in the decoder's internal YUV planes - used to
    /// measure pure decode speed without colour conversion.
    Internal,
    /// No pixel output at all (header probing).
    Null,
}

/// Destination for decoded pixels.
#[derive(Debug)]
pub struct OutputPlane<'a> {
    /// Pixel storage; the decoder writes one full frame.
    pub pixels: &'a mut [u8],
    /// Bytes per output row.
    pub stride: usize,
}

/// One decode call's inputs.
#[derive(Debug)]
pub struct DecodeRequest<'a> {
    /// Unread bitstream bytes, starting at the engine's read head.
    pub bitstream: &'a [u8],
    /// Where to put pixels; `None` when probing headers.
    pub output: Option<OutputPlane<'a>>,
    pub colorspace: OutputColorspace,
    pub flags: DecodeFlags,
}

/// One decode call's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeReport {
    /// Bytes of input consumed; see the module docs for the 0 and over-read
    /// shapes.
    pub bytes_consumed: usize,
    /// Kind of unit decoded.
    pub kind: UnitKind,
    /// VOP time base, in whole timing periods.
    pub time_base: i64,
    /// VOP time increment within the current period, in timing ticks.
    pub time_increment: i64,
    /// Coded width, as carried by the most recent VOL.
    pub width: u32,
    /// Coded height, as carried by the most recent VOL.
    pub height: u32,
}

/// Fatal decoder failures (a negative return in the native interface).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderError {
    /// Generic failure.
    Failure,
    /// The decoder could not allocate working memory.
    Memory,
    /// The bitstream is not valid MPEG-4 Part 2.
    Format,
    /// Library/interface version mismatch.
    Version,
    /// The decoder reports a hard end of stream.
    EndOfStream,
    /// An error code outside the documented set.
    Other(i32),
}

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderError::Failure => write!(f, "generic decoder failure"),
            DecoderError::Memory => write!(f, "decoder allocation failed"),
            DecoderError::Format => write!(f, "invalid bitstream format"),
            DecoderError::Version => write!(f, "decoder version mismatch"),
            DecoderError::EndOfStream => write!(f, "end of stream reached"),
            DecoderError::Other(code) => write!(f, "unknown decoder error {code}"),
        }
    }
}

impl std::error::Error for DecoderError {}

/// The external MPEG-4 Part 2 decoder.
pub trait MpegDecoder {
    /// Global-init hook: lends the decoder the on-chip SRAM scratch window
    /// for its hot lookup tables. Called once, before any decode.
    fn load_tables(&mut self, scratch: &mut SramRegion) -> Result<(), DecoderError>;

    /// Decodes the next unit from `request.bitstream`.
    fn decode(&mut self, request: DecodeRequest<'_>) -> Result<DecodeReport, DecoderError>;
}
