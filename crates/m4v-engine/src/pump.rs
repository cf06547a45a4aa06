//! Decode pump: drives the external decoder until the in-flight queue is
//! full.
//!
//! The pump runs synchronously, either to refill in-flight capacity before
//! presentation or opportunistically during pacing waits. Each iteration
//! acquires a frame buffer, offers the decoder the unread window of the
//! input buffer, and sorts the outcome:
//!
//! - a picture VOP goes into the in-flight queue with its stream time,
//! - a VOL triggers a timing re-parse,
//! - an N-VOP is skipped,
//! - zero consumption and over-reads release the buffer, refill, and retry
//!   (a full buffer with no progress is a stall; EOF drains the session),
//! - anything else is fatal.

use crate::decoder::{DecodeRequest, OutputColorspace, OutputPlane, UnitKind};
use crate::file_buffer::FILE_BUFFER_SIZE;
use crate::framebuffer::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::player::{FrameInFlight, PlayerEngine, PlayerError, VideoTiming};
use crate::timer::elapsed;
use crate::vol::{find_vol_start_code, parse_vol_timing};

/// Where the pump goes after an unproductive decode attempt.
enum PumpStep {
    /// More data was read; try the decoder again.
    Retry,
    /// End of file; the pump is done for good.
    EndOfFile,
}

impl PlayerEngine {
    /// Decodes until the in-flight queue is full or the stream runs out.
    pub(crate) fn fill_in_flight_queue(&mut self) -> Result<(), PlayerError> {
        let mut had_discontinuity = false;

        while !self.in_flight.is_full() && self.swapchain.available_count() > 0 {
            let decode_start = self.timer.current_value();

            let Some(slot) = self.swapchain.acquire() else {
                return Err(PlayerError::Presentation(
                    "Failed to get frame buffer from swap chain".into(),
                ));
            };

            let stride = if self.options.pre_rotated_video {
                SCREEN_HEIGHT
            } else {
                SCREEN_WIDTH
            } * self.frame_bytes_per_pixel();

            let colorspace = if self.options.benchmark && !self.options.blit_during_benchmark {
                // Skip colour conversion to measure pure decode speed.
                OutputColorspace::Internal
            } else if self.options.use_24bit_rgb {
                OutputColorspace::Rgb888
            } else {
                OutputColorspace::Rgb565
            };

            let flags = self.decode_flags(had_discontinuity);
            let report = self.decoder.decode(DecodeRequest {
                bitstream: self.input.window(),
                output: Some(OutputPlane {
                    pixels: self.swapchain.buffer_mut(slot).as_mut_slice(),
                    stride,
                }),
                colorspace,
                flags,
            });
            let report = match report {
                Ok(report) => report,
                Err(e) => return Err(PlayerError::Decode(e.to_string())),
            };

            if report.bytes_consumed == 0 {
                match self.handle_insufficient_data(
                    decode_start,
                    slot,
                    &mut had_discontinuity,
                    "no bytes consumed with full input buffer",
                    false,
                )? {
                    PumpStep::EndOfFile => return Ok(()),
                    PumpStep::Retry => continue,
                }
            }

            if report.kind.is_picture() {
                // An over-read means the coded frame did not fit the window;
                // do not advance the head, read more and decode it again.
                if report.bytes_consumed > self.input.available() {
                    match self.handle_insufficient_data(
                        decode_start,
                        slot,
                        &mut had_discontinuity,
                        "read beyond available data with full input buffer, \
                         the file read buffer may be too small",
                        false,
                    )? {
                        PumpStep::EndOfFile => return Ok(()),
                        PumpStep::Retry => continue,
                    }
                }

                let timing_ticks = (report.time_base
                    * i64::from(self.timing.resolution)
                    + report.time_increment) as u64;
                let pushed = self.in_flight.push(FrameInFlight { timing_ticks, slot });
                debug_assert!(pushed, "in-flight queue full despite loop guard");

                self.profiling
                    .record_decode(report.kind, elapsed(decode_start, self.timer.current_value()));
                self.input.advance(report.bytes_consumed);
                had_discontinuity = false;
                continue;
            }

            match report.kind {
                UnitKind::Vol => {
                    // A VOL mid-stream can change the timing parameters;
                    // re-run the header read over the current window (it
                    // advances the head itself).
                    self.read_vol_header()?;
                    self.swapchain.release(slot);
                    had_discontinuity = false;
                }
                UnitKind::NVop => {
                    if report.bytes_consumed > self.input.available() {
                        match self.handle_insufficient_data(
                            decode_start,
                            slot,
                            &mut had_discontinuity,
                            "read beyond available data with full input buffer, \
                             the file read buffer may be too small",
                            false,
                        )? {
                            PumpStep::EndOfFile => return Ok(()),
                            PumpStep::Retry => continue,
                        }
                    }
                    // Empty picture: nothing to present.
                    self.swapchain.release(slot);
                    self.input.advance(report.bytes_consumed);
                    had_discontinuity = false;
                }
                other => {
                    return Err(PlayerError::Bitstream(format!(
                        "Expected video frame, got different data type: {}",
                        other.code()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Shared tail for the unproductive decode outcomes: record the wasted
    /// attempt, give the buffer back, and either refill, report a stall, or
    /// wind down at EOF.
    fn handle_insufficient_data(
        &mut self,
        decode_start: u32,
        slot: usize,
        had_discontinuity: &mut bool,
        context: &str,
        require_discontinuity: bool,
    ) -> Result<PumpStep, PlayerError> {
        self.profiling
            .wasted_decode_ticks
            .push(elapsed(decode_start, self.timer.current_value()));

        // The buffer is only kept when a decoded frame was queued.
        self.swapchain.release(slot);

        if self.input.is_full() {
            return Err(PlayerError::Stall(context.to_string()));
        }

        if !self.file_end_reached {
            let more = self.refill(FILE_BUFFER_SIZE)?;
            self.file_end_reached = !more;
        }

        if self.file_end_reached {
            if self.input.available() == 0 {
                return Ok(PumpStep::EndOfFile);
            }
            // EOF but the decoder still wants more: drop the truncated tail
            // so the pump cannot loop on it forever.
            tracing::debug!(
                trailing = self.input.available(),
                "dropping trailing bytes after end of stream"
            );
            self.input.drop_remaining();
            return Ok(PumpStep::EndOfFile);
        }

        if require_discontinuity {
            *had_discontinuity = true;
        }
        Ok(PumpStep::Retry)
    }

    /// Bootstraps (or refreshes) timing from a VOL header at the read head.
    ///
    /// The decoder is driven once with a null output plane to verify the
    /// unit type and obtain the coded dimensions; the bespoke parser then
    /// extracts the timing fields the decoder does not expose. Advances the
    /// read head past the header.
    pub(crate) fn read_vol_header(&mut self) -> Result<(), PlayerError> {
        let flags = {
            // The window is (or may be) discontiguous with whatever the
            // decoder saw before; post filters are irrelevant without output.
            let mut flags = self.decode_flags(true);
            flags.deblock_luma = false;
            flags.deblock_chroma = false;
            flags.dering_luma = false;
            flags.dering_chroma = false;
            flags
        };
        let report = self.decoder.decode(DecodeRequest {
            bitstream: self.input.window(),
            output: None,
            colorspace: OutputColorspace::Null,
            flags,
        });
        let report = match report {
            Ok(report) => report,
            Err(e) => {
                return Err(PlayerError::Bitstream(format!(
                    "Failed to decode VOL header: {e}"
                )))
            }
        };
        if report.bytes_consumed == 0 {
            return Err(PlayerError::Bitstream(
                "Insufficient data to decode VOL header".into(),
            ));
        }
        if report.kind != UnitKind::Vol {
            tracing::debug!("{}", self.dump_state());
            tracing::debug!(
                "Bitstream (hex): {}",
                hex_prefix(self.input.window(), 256)
            );
            return Err(PlayerError::Bitstream(format!(
                "Expected VOL header, got different data type: {}",
                report.kind.code()
            )));
        }

        let window = self.input.window();
        let start = find_vol_start_code(window)
            .filter(|&pos| pos + 4 < window.len())
            .ok_or_else(|| {
                PlayerError::Bitstream("Failed to find VOL start code in bitstream".into())
            })?;
        let timing = parse_vol_timing(&window[start + 4..], false).ok_or_else(|| {
            PlayerError::Bitstream("Failed to parse VOL timing information".into())
        })?;

        self.video_width = report.width;
        self.video_height = report.height;
        self.timing = VideoTiming {
            resolution: timing.resolution,
            fixed_rate: timing.fixed_rate,
            fixed_increment: timing.fixed_increment,
        };
        self.input.advance(report.bytes_consumed);

        tracing::debug!(
            resolution = timing.resolution,
            fixed_rate = timing.fixed_rate,
            fixed_increment = timing.fixed_increment,
            width = report.width,
            height = report.height,
            "VOL header parsed"
        );
        Ok(())
    }
}

fn hex_prefix(data: &[u8], max: usize) -> String {
    use std::fmt::Write as _;

    let take = max.min(data.len());
    let mut out = String::with_capacity(2 * take);
    for byte in &data[..take] {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
