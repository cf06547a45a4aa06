//! Bounded file-input buffer with compact-and-refill.
//!
//! The decoder consumes bytes from a single contiguous window `[head,
//! head + avail)` inside a fixed buffer of `FILE_BUFFER_SIZE` bytes. A
//! refill first compacts the unread tail to the front of the buffer, then
//! reads from the file into the free space behind it. A 32-byte zeroed pad
//! trails the primary region as a safety margin for decoders that read a
//! few bytes past the end of a unit.
//!
//! Invariant after every public operation: `head + avail <= FILE_BUFFER_SIZE`,
//! and `head == 0` after any refill.
//!
//! Both refill phases are timed against the hardware tick counter; the most
//! recent per-phase rates feed [`FileInputBuffer::estimate_read_budget`],
//! which the pacing loop uses to exploit slack before a frame deadline.

use std::io::Read;

use crate::aligned::{AlignedBuf, AllocError};
use crate::stats::RefillSample;
use crate::timer::{elapsed, TickSource};

/// Trailing zero pad behind the primary region, in bytes.
pub const FILE_BUFFER_PADDING: usize = 32;
/// Size of the primary (decoder-visible) region, in bytes.
pub const FILE_BUFFER_SIZE: usize = 131_072 - FILE_BUFFER_PADDING;

/// Result of one refill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOutcome {
    /// True when more file data may still be available. False means the
    /// read came up short - treated as end of file.
    pub more_available: bool,
    /// Timing record for the profiling vectors.
    pub sample: RefillSample,
}

/// Compact-and-refill byte buffer feeding the decoder.
#[derive(Debug)]
pub struct FileInputBuffer {
    storage: AlignedBuf,
    head: usize,
    avail: usize,
    last_memmove_ticks: u32,
    last_memmove_bytes: u32,
    last_read_ticks: u32,
    last_read_bytes: u32,
}

impl FileInputBuffer {
    /// Allocates the buffer (primary region plus pad) cache-line aligned
    /// and zeroed; the pad stays zero for the buffer's lifetime.
    pub fn new() -> Result<Self, AllocError> {
        let storage = AlignedBuf::cache_aligned(FILE_BUFFER_SIZE + FILE_BUFFER_PADDING)?;
        Ok(Self {
            storage,
            head: FILE_BUFFER_SIZE,
            avail: 0,
            last_memmove_ticks: 0,
            last_memmove_bytes: 0,
            last_read_ticks: 0,
            last_read_bytes: 0,
        })
    }

    /// Index of the next unread byte.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Number of unread bytes.
    pub fn available(&self) -> usize {
        self.avail
    }

    /// True when the primary region holds no free space.
    pub fn is_full(&self) -> bool {
        self.avail == FILE_BUFFER_SIZE
    }

    /// The unread bytes, `[head, head + avail)`.
    pub fn window(&self) -> &[u8] {
        &self.storage[self.head..self.head + self.avail]
    }

    /// Compacts the unread tail to the front, then reads up to `requested`
    /// bytes (bounded by free space) from `reader`.
    ///
    /// Returns `more_available = true` when the buffer was already full
    /// (nothing to read - not EOF) or the read delivered everything asked
    /// for; a short read is reported as end of file. I/O failures
    /// propagate.
    pub fn fill(
        &mut self,
        reader: &mut dyn Read,
        requested: usize,
        clock: &dyn TickSource,
    ) -> std::io::Result<FillOutcome> {
        let memmove_start = clock.ticks();
        if self.head > 0 && self.avail > 0 {
            self.storage.copy_within(self.head..self.head + self.avail, 0);
        }
        self.head = 0;
        let memmove_end = clock.ticks();

        let free = FILE_BUFFER_SIZE - self.avail;
        let to_read = requested.min(free);

        let read_start = memmove_end;
        let mut bytes_read = 0;
        while bytes_read < to_read {
            let n = reader.read(&mut self.storage[self.avail + bytes_read..self.avail + to_read])?;
            if n == 0 {
                break;
            }
            bytes_read += n;
        }
        self.avail += bytes_read;
        let read_end = clock.ticks();

        self.last_memmove_ticks = elapsed(memmove_start, memmove_end);
        self.last_memmove_bytes = (self.avail - bytes_read) as u32;
        self.last_read_ticks = elapsed(read_start, read_end);
        self.last_read_bytes = bytes_read as u32;

        let sample = RefillSample {
            memmove_ticks: self.last_memmove_ticks,
            memmove_bytes: self.last_memmove_bytes,
            read_ticks: self.last_read_ticks,
            read_bytes: self.last_read_bytes,
        };
        let more_available = if to_read == 0 {
            // Buffer full; not EOF.
            true
        } else {
            bytes_read == to_read
        };
        Ok(FillOutcome {
            more_available,
            sample,
        })
    }

    /// Consumes `n` bytes after a successful decode step.
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.avail);
        self.head += n;
        self.avail -= n;
    }

    /// Discards every unread byte. Used once EOF is reached but the decoder
    /// still demands more data, so the pump cannot loop on a truncated tail.
    pub fn drop_remaining(&mut self) {
        self.head += self.avail;
        self.avail = 0;
    }

    /// Estimates how many bytes a refill could read within `budget_ticks`,
    /// based on the most recent per-phase rates. Returns 0 when the
    /// compaction alone would eat the budget.
    pub fn estimate_read_budget(&self, budget_ticks: u32) -> usize {
        let memmove_rate = self.last_memmove_bytes / self.last_memmove_ticks.max(1);
        let read_rate = self.last_read_bytes / self.last_read_ticks.max(1);

        let estimated_memmove_ticks = self.avail as u32 / memmove_rate.max(1);
        if estimated_memmove_ticks >= budget_ticks {
            return 0;
        }
        ((budget_ticks - estimated_memmove_ticks) * read_rate) as usize
    }
}
