//! Playback profiling vectors and summary statistics.
//!
//! Every frame appends tick counts to append-only vectors: decode time per
//! VOP type, wasted decode attempts, blit time, buffer-refill phases, signed
//! pacing waits, and whole-frame totals. `dump_state` condenses each vector
//! into a five-number summary.

use crate::decoder::UnitKind;

/// Timing record for one compact-and-refill of the file input buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefillSample {
    /// Ticks spent compacting unread bytes to the front of the buffer.
    pub memmove_ticks: u32,
    /// Bytes moved by the compaction.
    pub memmove_bytes: u32,
    /// Ticks spent in the file read.
    pub read_ticks: u32,
    /// Bytes delivered by the file read.
    pub read_bytes: u32,
}

impl RefillSample {
    /// Compaction throughput in bytes per tick (integer, floor).
    pub fn memmove_bytes_per_tick(&self) -> u32 {
        self.memmove_bytes / self.memmove_ticks.max(1)
    }

    /// Read throughput in bytes per tick (integer, floor).
    pub fn read_bytes_per_tick(&self) -> u32 {
        self.read_bytes / self.read_ticks.max(1)
    }
}

/// Per-session profiling vectors, all in hardware timer ticks.
#[derive(Debug, Default)]
pub struct ProfilingInfo {
    pub i_vop_decode_ticks: Vec<u32>,
    pub p_vop_decode_ticks: Vec<u32>,
    pub b_vop_decode_ticks: Vec<u32>,
    pub s_vop_decode_ticks: Vec<u32>,
    /// Decode attempts that produced no frame (insufficient data, over-read).
    pub wasted_decode_ticks: Vec<u32>,
    pub blit_ticks: Vec<u32>,
    pub refills: Vec<RefillSample>,
    /// Signed: negative means the frame was late.
    pub pacing_wait_ticks: Vec<i32>,
    pub frame_total_ticks: Vec<u32>,
}

impl ProfilingInfo {
    /// Appends a decode-time sample to the vector for `kind`.
    ///
    /// Only picture kinds carry a vector; anything else is a caller bug.
    pub fn record_decode(&mut self, kind: UnitKind, ticks: u32) {
        match kind {
            UnitKind::IVop => self.i_vop_decode_ticks.push(ticks),
            UnitKind::PVop => self.p_vop_decode_ticks.push(ticks),
            UnitKind::BVop => self.b_vop_decode_ticks.push(ticks),
            UnitKind::SVop => self.s_vop_decode_ticks.push(ticks),
            other => debug_assert!(false, "no decode-time vector for {other:?}"),
        }
    }

    /// Number of frames that missed their deadline.
    pub fn late_frame_count(&self) -> usize {
        self.pacing_wait_ticks.iter().filter(|&&w| w < 0).count()
    }

    /// Average presented frame rate: frame count over summed frame time.
    pub fn average_fps(&self, ticks_per_second: u32) -> f64 {
        let total_ticks: u64 = self.frame_total_ticks.iter().map(|&t| u64::from(t)).sum();
        if total_ticks == 0 {
            return 0.0;
        }
        let total_seconds = total_ticks as f64 / f64::from(ticks_per_second);
        self.frame_total_ticks.len() as f64 / total_seconds
    }
}

/// Five-number summary plus mean: `min/Q1/med/Q3/max u=MEAN n=COUNT`.
///
/// Quartiles use Tukey hinges - the median of each half, excluding the
/// overall median element when the count is odd. With integral input the
/// hinges are integral or end in .5; they print as integers when integral,
/// otherwise with one decimal place. The mean always prints with two
/// decimals. An empty slice renders `n=0`.
pub fn short_stats<T>(data: &[T]) -> String
where
    T: Copy + Into<i64>,
{
    if data.is_empty() {
        return "n=0".to_string();
    }

    let mut v: Vec<i64> = data.iter().map(|&x| x.into()).collect();
    v.sort_unstable();

    let n = v.len();
    let med = median_of(&v[..]);
    let half = n / 2;
    let q1 = median_of(&v[..half]);
    let q3 = median_of(&v[if n % 2 == 0 { half } else { half + 1 }..]);
    let mean = v.iter().map(|&x| x as f64).sum::<f64>() / n as f64;

    format!(
        "{}/{}/{}/{}/{} u={:.2} n={}",
        v[0],
        fmt_quartile(q1),
        fmt_quartile(med),
        fmt_quartile(q3),
        v[n - 1],
        mean,
        n
    )
}

fn median_of(sorted: &[i64]) -> f64 {
    let len = sorted.len();
    if len == 0 {
        return 0.0;
    }
    let mid = len / 2;
    if len % 2 == 1 {
        sorted[mid] as f64
    } else {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    }
}

fn fmt_quartile(x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() < 1e-9 {
        format!("{}", rounded as i64)
    } else {
        format!("{x:.1}")
    }
}
