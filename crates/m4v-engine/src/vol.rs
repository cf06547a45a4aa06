//! Video Object Layer header parsing.
//!
//! The external decoder does not expose `vop_time_increment_resolution` or
//! `fixed_vop_time_increment`, both of which the pacing loop needs, so the
//! engine carries its own minimal VOL parser: locate the VOL start code
//! (`00 00 01 2x`), then walk the header MSB-first until the timing fields.
//!
//! The parser is deliberately tolerant: marker bits are consumed but not
//! checked (some encoders emit zeros), and any truncation - running out of
//! bits at any point before the timing fields are complete - yields a parse
//! failure rather than a partial result.

/// MSB-first bit reader over a byte slice, with a 64-bit refill cache.
pub struct BitReader<'a> {
    data: &'a [u8],
    cache: u64,
    bits: u32,
}

impl<'a> BitReader<'a> {
    /// Starts reading at the first byte of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            cache: 0,
            bits: 0,
        }
    }

    fn refill(&mut self) {
        while self.bits <= 56 && !self.data.is_empty() {
            self.cache = (self.cache << 8) | u64::from(self.data[0]);
            self.data = &self.data[1..];
            self.bits += 8;
        }
    }

    /// True when at least `n` more bits can be read. Refills the cache.
    pub fn need(&mut self, n: u32) -> bool {
        self.refill();
        self.bits >= n
    }

    /// Reads `n` bits (1 ≤ n ≤ 32). Caller must have checked `need(n)`.
    pub fn take(&mut self, n: u32) -> u32 {
        debug_assert!(n >= 1 && n <= 32 && self.bits >= n);
        let shift = self.bits - n;
        let value = if n == 32 {
            (self.cache >> shift) as u32
        } else {
            ((self.cache >> shift) & ((1u64 << n) - 1)) as u32
        };
        self.bits -= n;
        value
    }

    /// Consumes a marker bit. Returns false only when no bit is available;
    /// the bit's value is not enforced.
    pub fn marker(&mut self) -> bool {
        if !self.need(1) {
            return false;
        }
        let _ = self.take(1);
        true
    }
}

/// Timing (and optional geometry) extracted from a VOL header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolTiming {
    /// `vop_time_increment_resolution`: timing ticks per second. Non-zero
    /// in any successfully parsed header.
    pub resolution: u16,
    /// `fixed_vop_rate`.
    pub fixed_rate: bool,
    /// `fixed_vop_time_increment`: ticks between VOPs when `fixed_rate`.
    pub fixed_increment: u16,
    /// Width of the `vop_time_increment` field in later VOP headers.
    pub increment_bits: u8,
    /// Coded width; only filled when geometry parsing was requested.
    pub width: u16,
    /// Coded height; only filled when geometry parsing was requested.
    pub height: u16,
}

/// Bits needed to represent `[0, resolution - 1]`, minimum 1.
pub fn time_increment_bits(resolution: u16) -> u8 {
    if resolution <= 1 {
        return 1;
    }
    let bits = 16 - (resolution - 1).leading_zeros() as u8;
    bits.max(1)
}

/// Finds the offset of a VOL start code (`00 00 01 2x`, x in 0..=F) in
/// `data`, or `None`.
pub fn find_vol_start_code(data: &[u8]) -> Option<usize> {
    if data.len() < 4 {
        return None;
    }
    (0..data.len() - 3).find(|&i| {
        data[i] == 0x00
            && data[i + 1] == 0x00
            && data[i + 2] == 0x01
            && (0x20..=0x2F).contains(&data[i + 3])
    })
}

/// Parses the VOL header payload that starts immediately *after* the four
/// start-code bytes. Returns `None` on truncation at any field boundary or
/// when the parsed resolution is zero.
///
/// `parse_geometry` additionally reads the 13-bit width/height fields of a
/// rectangular (shape 0) layer.
pub fn parse_vol_timing(payload: &[u8], parse_geometry: bool) -> Option<VolTiming> {
    let mut br = BitReader::new(payload);
    let mut out = VolTiming::default();

    // random_accessible_vol (1)
    if !br.need(1) {
        return None;
    }
    let _ = br.take(1);

    // video_object_type_indication (8)
    if !br.need(8) {
        return None;
    }
    let _ = br.take(8);

    // is_object_layer_identifier (1); verid defaults to 1 when absent
    if !br.need(1) {
        return None;
    }
    let mut verid = 1;
    if br.take(1) != 0 {
        if !br.need(4) {
            return None;
        }
        verid = br.take(4);
        if !br.need(3) {
            return None;
        }
        let _ = br.take(3); // video_object_layer_priority
    }

    // aspect_ratio_info (4); 15 = extended PAR with 8+8 bits
    if !br.need(4) {
        return None;
    }
    if br.take(4) == 15 {
        if !br.need(16) {
            return None;
        }
        let _ = br.take(16);
    }

    // vol_control_parameters (1)
    if !br.need(1) {
        return None;
    }
    if br.take(1) != 0 {
        // chroma_format (2), low_delay (1)
        if !br.need(3) {
            return None;
        }
        let _ = br.take(3);

        // vbv_parameters (1)
        if !br.need(1) {
            return None;
        }
        if br.take(1) != 0 {
            // Six fixed-width VBV fields, each followed by a marker bit.
            for width in [15u32, 15, 15, 3, 11, 15] {
                if !br.need(width) {
                    return None;
                }
                let _ = br.take(width);
                if !br.marker() {
                    return None;
                }
            }
        }
    }

    // video_object_layer_shape (2)
    if !br.need(2) {
        return None;
    }
    let shape = br.take(2);

    // shape extension (4) only for grayscale shape with verid != 1
    if shape == 3 && verid != 1 {
        if !br.need(4) {
            return None;
        }
        let _ = br.take(4);
    }

    if !br.marker() {
        return None;
    }

    // vop_time_increment_resolution (16)
    if !br.need(16) {
        return None;
    }
    out.resolution = br.take(16) as u16;
    out.increment_bits = time_increment_bits(out.resolution);

    if !br.marker() {
        return None;
    }

    // fixed_vop_rate (1), then fixed_vop_time_increment (increment_bits)
    if !br.need(1) {
        return None;
    }
    out.fixed_rate = br.take(1) != 0;
    if out.fixed_rate {
        if !br.need(u32::from(out.increment_bits)) {
            return None;
        }
        out.fixed_increment = br.take(u32::from(out.increment_bits)) as u16;
    }

    if parse_geometry && shape == 0 {
        if !br.marker() {
            return None;
        }
        if !br.need(13) {
            return None;
        }
        out.width = br.take(13) as u16;
        if !br.marker() {
            return None;
        }
        if !br.need(13) {
            return None;
        }
        out.height = br.take(13) as u16;
        if !br.marker() {
            return None;
        }
    }

    if out.resolution == 0 {
        return None;
    }
    Some(out)
}
