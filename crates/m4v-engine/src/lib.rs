//! m4v-engine: software MPEG-4 Part 2 playback for a small ARM handheld.
//!
//! The target is a single-core ≈396 MHz machine with a 320×240 LCD, 128 KiB
//! of on-chip SRAM, no OS threads, and a memory-mapped dual-timer for
//! cooperative timing. The engine decodes an `.m4v` elementary stream from
//! a file and presents each frame at the timing encoded in the bitstream,
//! under hard memory and throughput budgets.
//!
//! The moving parts:
//!
//! - [`file_buffer`] - bounded input buffer with compact-and-refill
//! - [`swapchain`] / [`ring`] - frame-buffer pool and in-flight queue that
//!   decouple decoding from presentation
//! - [`vol`] - bespoke VOL-header parser for the timing fields the decoder
//!   does not expose
//! - [`timer`] / [`mmio`] - SP804 free-running counter behind a volatile
//!   device bus
//! - [`lcd`] - mode/power control, rotation blits, base-pointer swaps
//! - [`player`] / [`pump`] - the pacing loop and the decode pump
//! - [`stats`] - per-frame profiling vectors and five-number summaries
//!
//! The MPEG-4 decoder itself is an external collaborator behind
//! [`decoder::MpegDecoder`]; the calling shell (command dispatch, file
//! association) is out of scope.
//!
//! Everything is strictly single-threaded and cooperative: no locks, no
//! atomics, no interrupts. The only suspension points are the pacing sleep
//! and the file read.

pub mod aligned;
pub mod decoder;
pub mod file_buffer;
pub mod framebuffer;
pub mod lcd;
pub mod mmio;
pub mod platform;
pub mod player;
pub mod pump;
pub mod ring;
pub mod sram;
pub mod stats;
pub mod swapchain;
pub mod timer;
pub mod vol;

pub use decoder::{
    DecodeFlags, DecodeReport, DecodeRequest, DecoderError, MpegDecoder, OutputColorspace,
    OutputPlane, UnitKind,
};
pub use player::{
    Board, FrameInFlight, PlayOptions, PlayerEngine, PlayerError, VideoTiming, TIMER_START_VALUE,
};
pub use timer::{Sp804Timer, TickSource, TICKS_PER_SECOND};
