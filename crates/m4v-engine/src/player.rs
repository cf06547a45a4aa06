//! Playback engine: configuration, lifecycle, pacing, presentation.
//!
//! [`PlayerEngine`] owns every resource of a playback session - the video
//! file, the decoder handle, the file-input buffer, the frame-buffer swap
//! chain and in-flight queue, the hardware timer, the LCD, and the SRAM
//! scratch shadow. Control flow is one cooperative loop: pop the oldest
//! decoded frame, wait until its stream time, present it, top the in-flight
//! queue back up, release the buffer. The decode pump (see [`crate::pump`])
//! runs synchronously inside that loop.
//!
//! Everything is single-threaded; the only suspension points are the pacing
//! sleep and the file read.

use std::fmt::Write as _;
use std::fs::File;
use std::fmt;

use crate::aligned::AlignedBuf;
use crate::aligned::CACHE_LINE_SIZE;
use crate::decoder::{DecodeFlags, MpegDecoder};
use crate::file_buffer::{FileInputBuffer, FILE_BUFFER_SIZE};
use crate::framebuffer::{FrameBuffer, PixelLayout, FRAME_TOTAL_PIXELS, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::lcd::{
    rotate_blit, set_mode, set_power, LcdDevice, PresentPath, LCD_MODE_RGB565, LCD_MODE_RGB888,
};
use crate::platform::HostHooks;
use crate::ring::RingBuffer;
use crate::sram::{SramRegion, SramShadow};
use crate::stats::{short_stats, ProfilingInfo};
use crate::swapchain::SwapChain;
use crate::timer::{
    CounterSize, Prescale, Sp804Timer, TimerConfig, TimerMode, TimerState, WrapMode,
    TICKS_PER_SECOND,
};

/// Initial load value of the free-running down-counter.
pub const TIMER_START_VALUE: u32 = 0xFFFF_FFFF;

/// Pacing slack (≈1 ms) kept in reserve when stealing wait time for reads.
const PACING_MARGIN_TICKS: i32 = (TICKS_PER_SECOND / 1000) as i32;

/// Opportunistic refill kicks in below this buffer occupancy.
const REFILL_THRESHOLD: usize = FILE_BUFFER_SIZE / 4;

/// Playback options. Field names track the shell's flags; the shell itself
/// is out of scope here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayOptions {
    /// Skip pacing sleeps; measure raw throughput.
    pub benchmark: bool,
    /// Keep blitting even in benchmark mode, to measure blit cost.
    pub blit_during_benchmark: bool,
    /// Decoder "fast" flag.
    pub fast_decode: bool,
    /// Decoder low-delay flag; disables B-frames.
    pub low_delay: bool,
    pub deblock_luma: bool,
    pub deblock_chroma: bool,
    pub dering_luma: bool,
    pub dering_chroma: bool,
    /// Decode straight into the LCD's scan-out region.
    pub magic_framebuffer: bool,
    /// 24-bit RGB888 surface instead of RGB565.
    pub use_24bit_rgb: bool,
    /// Present through the host blit primitive.
    pub lcd_blit_api: bool,
    /// The stream is portrait-native; present by base-pointer swap.
    pub pre_rotated_video: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            benchmark: false,
            blit_during_benchmark: false,
            fast_decode: true,
            low_delay: true,
            deblock_luma: false,
            deblock_chroma: false,
            dering_luma: false,
            dering_chroma: false,
            magic_framebuffer: true,
            use_24bit_rgb: false,
            lcd_blit_api: false,
            pre_rotated_video: false,
        }
    }
}

/// Timing parameters extracted from the stream's VOL header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoTiming {
    /// Bitstream timing ticks per second. Never 0 for a valid stream.
    pub resolution: u16,
    /// Whether the stream advertises a fixed VOP rate.
    pub fixed_rate: bool,
    /// Ticks between consecutive VOPs when `fixed_rate`.
    pub fixed_increment: u16,
}

/// A decoded frame waiting for its presentation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInFlight {
    /// Stream time of the frame, in bitstream timing ticks.
    pub timing_ticks: u64,
    /// Swap-chain slot holding the pixels.
    pub slot: usize,
}

/// Everything that can end a playback session early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// Incompatible option combination, rejected at construction.
    Config(String),
    /// An allocation failed.
    Allocation(String),
    /// File open or read failed.
    Io(String),
    /// The bitstream made no sense (VOL missing/unparseable, unexpected
    /// unit type, decoder rejected the stream).
    Bitstream(String),
    /// The decoder reported a fatal error mid-stream.
    Decode(String),
    /// The decoder consumed nothing from a full input buffer.
    Stall(String),
    /// Coded dimensions disagree with the screen/rotation configuration.
    Geometry(String),
    /// Swap-chain or queue accounting failed; a programming error.
    Presentation(String),
    /// The in-flight queue ran dry without EOF signalling.
    NoMoreFrames,
    /// The user pressed escape.
    Cancelled,
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::Config(msg) => write!(f, "Incompatible options: {msg}"),
            PlayerError::Allocation(what) => write!(f, "Failed to allocate {what}"),
            PlayerError::Io(msg) => write!(f, "{msg}"),
            PlayerError::Bitstream(msg) => write!(f, "{msg}"),
            PlayerError::Decode(msg) => write!(f, "Failed to decode frame: {msg}"),
            PlayerError::Stall(context) => write!(f, "Decoder stalled: {context}"),
            PlayerError::Geometry(msg) => write!(f, "Invalid video dimensions: {msg}"),
            PlayerError::Presentation(msg) => write!(f, "{msg}"),
            PlayerError::NoMoreFrames => {
                write!(f, "No more frames to display, video may have ended")
            }
            PlayerError::Cancelled => write!(f, "Playback aborted by user"),
        }
    }
}

impl std::error::Error for PlayerError {}

/// The hardware a playback session runs on. Addresses are data, not
/// constants: the caller maps the devices and hands them over.
pub struct Board {
    /// Bus of the SP804 dual-timer block (timer 1 is used).
    pub timer: Sp804Timer,
    /// The LCD controller, plus the host blit primitive if one exists.
    pub lcd: Box<dyn LcdDevice>,
    /// Sleep and keypad services.
    pub host: Box<dyn HostHooks>,
    /// The 128 KiB on-chip scratch window lent to the decoder.
    pub sram: SramRegion,
    /// Base of the fixed scan-out region used by the magic-framebuffer path.
    pub magic_framebuffer_base: usize,
}

/// The playback engine. See the module docs.
pub struct PlayerEngine {
    pub(crate) options: PlayOptions,
    pub(crate) file: Option<File>,
    pub(crate) file_end_reached: bool,
    pub(crate) decoder: Box<dyn MpegDecoder>,
    pub(crate) input: FileInputBuffer,
    pub(crate) swapchain: SwapChain,
    pub(crate) in_flight: RingBuffer<FrameInFlight>,
    pub(crate) video_width: u32,
    pub(crate) video_height: u32,
    pub(crate) timer: Sp804Timer,
    lcd: Box<dyn LcdDevice>,
    host: Box<dyn HostHooks>,
    present_path: PresentPath,
    pub(crate) timing: VideoTiming,
    last_blit_ticks: u32,
    rotation_buffer: Option<AlignedBuf>,
    pub(crate) profiling: ProfilingInfo,
    failed: bool,
    status: String,
    saved_timer_state: TimerState,
    // Declared after the decoder so the decoder drops first and the shadow
    // restores SRAM last.
    _sram_shadow: SramShadow,
}

fn validate_options(options: &PlayOptions) -> Result<(), PlayerError> {
    if options.magic_framebuffer && options.use_24bit_rgb {
        return Err(PlayerError::Config(
            "magic framebuffer and 24-bit RGB cannot both be enabled".into(),
        ));
    }
    if options.magic_framebuffer && options.lcd_blit_api {
        return Err(PlayerError::Config(
            "magic framebuffer and the LCD blit API cannot both be enabled".into(),
        ));
    }
    if options.use_24bit_rgb && options.lcd_blit_api {
        return Err(PlayerError::Config(
            "24-bit RGB and the LCD blit API cannot both be enabled".into(),
        ));
    }
    if options.pre_rotated_video && (options.magic_framebuffer || options.lcd_blit_api) {
        return Err(PlayerError::Config(
            "pre-rotated video cannot be combined with the magic framebuffer or the LCD blit API"
                .into(),
        ));
    }
    Ok(())
}

fn select_present_path(options: &PlayOptions) -> PresentPath {
    if options.magic_framebuffer {
        PresentPath::Magic
    } else if options.lcd_blit_api {
        PresentPath::BlitApi
    } else if options.pre_rotated_video {
        PresentPath::PreRotated
    } else {
        PresentPath::RotatedBlit
    }
}

impl PlayerEngine {
    /// Builds a playback session for the stream at `path`.
    ///
    /// Validates the option set, brings up the timer, opens the file, lends
    /// the decoder its SRAM tables, allocates the buffers, reads the VOL
    /// header, checks geometry, and pre-fills the in-flight queue. On error
    /// every resource acquired so far is released (the SRAM shadow restores
    /// on drop).
    pub fn new(
        path: &str,
        options: PlayOptions,
        mut decoder: Box<dyn MpegDecoder>,
        board: Board,
    ) -> Result<Self, PlayerError> {
        validate_options(&options)?;

        let Board {
            mut timer,
            lcd,
            host,
            sram,
            magic_framebuffer_base,
        } = board;

        // Timer bring-up: free-running wrapping 32-bit down-counter, ÷256,
        // IRQ off. Started here and never stopped during playback.
        let saved_timer_state = timer.record_state();
        timer.stop();
        timer.clear_irq();
        timer.configure(TimerConfig {
            mode: TimerMode::FreeRunning,
            wrap: WrapMode::Wrapping,
            prescale: Prescale::Div256,
            size: CounterSize::Bits32,
            irq_enabled: false,
            enabled: false,
        });
        timer.set_load(TIMER_START_VALUE);
        timer.start();

        // Anything that fails past this point must hand the timer back.
        let parts = Self::open_resources(path, &options, &mut decoder, sram, magic_framebuffer_base);
        let (file, sram_shadow, input, buffers) = match parts {
            Ok(parts) => parts,
            Err(e) => {
                timer.restore_state(saved_timer_state);
                return Err(e);
            }
        };
        let depth = buffers.len();

        let present_path = select_present_path(&options);
        let mut engine = Self {
            options,
            file: Some(file),
            file_end_reached: false,
            decoder,
            input,
            swapchain: SwapChain::new(buffers),
            in_flight: RingBuffer::new(depth),
            video_width: 0,
            video_height: 0,
            timer,
            lcd,
            host,
            present_path,
            timing: VideoTiming::default(),
            last_blit_ticks: 0,
            rotation_buffer: None,
            profiling: ProfilingInfo::default(),
            failed: false,
            status: "Incomplete initialization".to_string(),
            saved_timer_state,
            _sram_shadow: sram_shadow,
        };

        match engine.initialize() {
            Ok(()) => {
                engine.status = "Successful initialization".to_string();
                tracing::info!(
                    width = engine.video_width,
                    height = engine.video_height,
                    resolution = engine.timing.resolution,
                    fixed_rate = engine.timing.fixed_rate,
                    path = ?engine.present_path,
                    "playback engine initialized"
                );
                Ok(engine)
            }
            Err(e) => {
                engine.failed = true;
                engine.status = e.to_string();
                Err(e)
            }
        }
    }

    /// Fallible resource acquisition that precedes engine assembly: the
    /// video file, the SRAM shadow (captured before the decoder scribbles
    /// tables into the window), the input buffer, and the frame buffers.
    fn open_resources(
        path: &str,
        options: &PlayOptions,
        decoder: &mut Box<dyn MpegDecoder>,
        sram: SramRegion,
        magic_framebuffer_base: usize,
    ) -> Result<(File, SramShadow, FileInputBuffer, Vec<FrameBuffer>), PlayerError> {
        let file = File::open(path)
            .map_err(|e| PlayerError::Io(format!("Failed to open video file {path}: {e}")))?;

        let mut sram_shadow = SramShadow::capture(sram);
        decoder
            .load_tables(sram_shadow.region_mut())
            .map_err(|e| PlayerError::Decode(format!("decoder initialization failed: {e}")))?;

        let input = FileInputBuffer::new()
            .map_err(|_| PlayerError::Allocation("file read buffer".into()))?;

        // Pre-rotated presentation swaps the scan-out pointer between
        // buffers, so the on-screen frame must never be the decode target.
        let depth = if options.pre_rotated_video { 2 } else { 1 };
        let mut buffers = Vec::with_capacity(depth);
        for _ in 0..depth {
            let buffer = if options.magic_framebuffer {
                // SAFETY: board contract - `magic_framebuffer_base` maps a
                // full RGB565 frame that is ours while the engine lives.
                unsafe { FrameBuffer::magic(magic_framebuffer_base) }
            } else {
                let layout = if options.use_24bit_rgb {
                    PixelLayout::Rgb888
                } else {
                    PixelLayout::Rgb565
                };
                FrameBuffer::owned(layout)
                    .map_err(|_| PlayerError::Allocation("frame buffer".into()))?
            };
            buffers.push(buffer);
        }
        Ok((file, sram_shadow, input, buffers))
    }

    /// Construction steps that need the assembled engine: prime the input
    /// buffer, bootstrap timing from the VOL header, verify geometry,
    /// pre-fill the in-flight queue, and set up the presentation surface.
    fn initialize(&mut self) -> Result<(), PlayerError> {
        // Prime the read buffer; EOF latching starts with the pump.
        let _ = self.refill(FILE_BUFFER_SIZE)?;

        self.read_vol_header()?;
        self.check_geometry()?;
        self.fill_in_flight_queue()?;

        if self.options.benchmark && !self.options.blit_during_benchmark {
            // No presentation surface needed.
        } else if self.options.lcd_blit_api {
            if !self.lcd.init_blit() {
                return Err(PlayerError::Presentation("Failed to initialize LCD".into()));
            }
        } else if self.options.magic_framebuffer || self.options.pre_rotated_video {
            // Scan-out comes straight from the frame buffers.
        } else {
            // Rotated blit: a dedicated buffer is the scan-out surface.
            let bytes = FRAME_TOTAL_PIXELS * self.frame_bytes_per_pixel();
            let buffer = AlignedBuf::zeroed(CACHE_LINE_SIZE, bytes)
                .map_err(|_| PlayerError::Allocation("rotation buffer".into()))?;
            self.rotation_buffer = Some(buffer);
        }
        Ok(())
    }

    fn check_geometry(&self) -> Result<(), PlayerError> {
        let (expected_w, expected_h) = if self.options.pre_rotated_video {
            (SCREEN_HEIGHT as u32, SCREEN_WIDTH as u32)
        } else {
            (SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32)
        };
        if self.video_width != expected_w || self.video_height != expected_h {
            return Err(PlayerError::Geometry(format!(
                "Got {}x{}, expected {}x{}",
                self.video_width, self.video_height, expected_w, expected_h
            )));
        }
        Ok(())
    }

    /// Bytes per pixel of the decode surface.
    pub(crate) fn frame_bytes_per_pixel(&self) -> usize {
        if self.options.use_24bit_rgb {
            4
        } else {
            2
        }
    }

    /// Refills the input buffer and records the timing sample. Returns
    /// whether more file data may still be available.
    pub(crate) fn refill(&mut self, requested: usize) -> Result<bool, PlayerError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| PlayerError::Io("video file is not open".into()))?;
        let outcome = self
            .input
            .fill(file, requested, &self.timer)
            .map_err(|e| PlayerError::Io(format!("Failed to read video file: {e}")))?;
        self.profiling.refills.push(outcome.sample);
        Ok(outcome.more_available)
    }

    /// Plays the stream to completion (or error). The LCD is set up on
    /// entry and restored on every exit path.
    pub fn play(&mut self) -> Result<(), PlayerError> {
        let previous_scanout = self.init_lcd();
        let outcome = self.playback_loop();
        self.cleanup_lcd(previous_scanout);
        if let Err(e) = &outcome {
            self.failed = true;
            self.status = e.to_string();
            tracing::warn!(error = %e, "playback ended with error");
        }
        outcome
    }

    fn playback_loop(&mut self) -> Result<(), PlayerError> {
        let playback_start = self.timer.current_value();
        let mut presented: u64 = 0;

        loop {
            let frame_start = self.timer.current_value();

            if self.host.any_key_pressed() && self.host.escape_pressed() {
                return Err(PlayerError::Cancelled);
            }

            // Refill in-flight capacity before presentation. With a single
            // buffer the previous iteration's pump ran while that buffer was
            // still held, so this is where the pipeline actually advances.
            if self.in_flight.is_empty() {
                self.fill_in_flight_queue()?;
            }
            if self.in_flight.is_empty() {
                if self.file_end_reached && self.input.available() == 0 {
                    tracing::debug!(frames = presented, "stream drained, playback complete");
                    return Ok(());
                }
                return Err(PlayerError::NoMoreFrames);
            }

            let mut frame = self.in_flight.pop().ok_or_else(|| {
                PlayerError::Presentation("Failed to get frame from frames in flight queue".into())
            })?;

            // Lock output to the advertised nominal rate when the stream
            // claims one.
            if self.timing.fixed_rate {
                frame.timing_ticks = presented * u64::from(self.timing.fixed_increment);
            }

            self.wait_for_next_frame(frame.timing_ticks, playback_start)?;

            let before_blit = self.timer.current_value();
            if !self.options.benchmark || self.options.blit_during_benchmark {
                self.present_frame(frame.slot)?;
                presented += 1;
            }
            let after_blit = self.timer.current_value();
            self.last_blit_ticks = before_blit.wrapping_sub(after_blit);
            self.profiling.blit_ticks.push(self.last_blit_ticks);

            // Top the queue back up before releasing, so the decoder can
            // never observe an empty swap chain.
            self.fill_in_flight_queue()?;

            if !self.swapchain.release(frame.slot) {
                return Err(PlayerError::Presentation(
                    "Failed to release frame buffer back to swapchain".into(),
                ));
            }

            self.profiling
                .frame_total_ticks
                .push(frame_start.wrapping_sub(self.timer.current_value()));
        }
    }

    /// Waits until `timing_ticks` of stream time have elapsed since
    /// `playback_start`, spending any slack on an opportunistic refill.
    fn wait_for_next_frame(
        &mut self,
        timing_ticks: u64,
        playback_start: u32,
    ) -> Result<(), PlayerError> {
        debug_assert!(self.timing.resolution != 0);
        let resolution = u64::from(self.timing.resolution);
        let target_elapsed =
            (timing_ticks * u64::from(TICKS_PER_SECOND) + resolution / 2) / resolution;

        // The counter decrements, so the deadline is below the start value.
        // Biasing by the last blit time schedules the wait to end just
        // before the blit is expected to complete.
        let target_counter = playback_start
            .wrapping_sub(target_elapsed as u32)
            .wrapping_add(self.last_blit_ticks);
        let mut ticks_to_wait = self.timer.current_value().wrapping_sub(target_counter) as i32;

        if !self.file_end_reached
            && ticks_to_wait > PACING_MARGIN_TICKS
            && self.input.available() < REFILL_THRESHOLD
        {
            let read_start = self.timer.current_value();
            let budget = self
                .input
                .estimate_read_budget((ticks_to_wait - PACING_MARGIN_TICKS) as u32);
            if budget > 0 {
                let more = self.refill(budget)?;
                self.file_end_reached = !more;
                let read_end = self.timer.current_value();
                ticks_to_wait -= read_start.wrapping_sub(read_end) as i32;
            }
        }

        self.profiling.pacing_wait_ticks.push(ticks_to_wait);
        if ticks_to_wait > 0 {
            let sleep_ms = (ticks_to_wait as u64 * 1000 / u64::from(TICKS_PER_SECOND)) as u32;
            if sleep_ms > 1 && !self.options.benchmark {
                self.host.sleep_ms(sleep_ms);
            }
        }
        // Late frames are counted (negative wait), not acted upon.
        Ok(())
    }

    /// Shows the frame in `slot` through the configured presentation path.
    fn present_frame(&mut self, slot: usize) -> Result<(), PlayerError> {
        match self.present_path {
            PresentPath::Magic => {
                // The decode already wrote into the scan-out region.
            }
            PresentPath::BlitApi => {
                let pixels = self.swapchain.buffer(slot).as_slice();
                self.lcd.blit(pixels);
            }
            PresentPath::PreRotated => {
                let base = self.swapchain.buffer(slot).base_addr();
                self.lcd.set_scanout_base(base);
            }
            PresentPath::RotatedBlit => {
                let rotation = self.rotation_buffer.as_mut().ok_or_else(|| {
                    PlayerError::Presentation("rotation buffer missing on rotated-blit path".into())
                })?;
                let src = self.swapchain.buffer(slot).as_slice();
                if self.options.use_24bit_rgb {
                    // SAFETY: both buffers are cache-line aligned and whole
                    // multiples of the element size.
                    let (_, src_px, _) = unsafe { src.align_to::<u32>() };
                    let (_, dst_px, _) = unsafe { rotation.align_to_mut::<u32>() };
                    rotate_blit(src_px, dst_px, SCREEN_WIDTH, SCREEN_HEIGHT);
                } else {
                    // SAFETY: as above.
                    let (_, src_px, _) = unsafe { src.align_to::<u16>() };
                    let (_, dst_px, _) = unsafe { rotation.align_to_mut::<u16>() };
                    rotate_blit(src_px, dst_px, SCREEN_WIDTH, SCREEN_HEIGHT);
                }
            }
        }
        Ok(())
    }

    /// Points the LCD at the session's scan-out surface. Returns the
    /// previous base address for the cleanup path, or `None` when the
    /// benchmark configuration leaves the LCD alone.
    fn init_lcd(&mut self) -> Option<usize> {
        if self.options.benchmark && !self.options.blit_during_benchmark {
            return None;
        }

        let previous = self.lcd.scanout_base();
        match self.present_path {
            // The host blit primitive and the magic region leave the
            // controller's registers as they are.
            PresentPath::Magic | PresentPath::BlitApi => return Some(previous),
            PresentPath::PreRotated | PresentPath::RotatedBlit => {}
        }

        let new_base = match &self.rotation_buffer {
            Some(rotation) => rotation.addr(),
            None => self.swapchain.buffer(0).base_addr(),
        };

        if self.options.use_24bit_rgb {
            // A 24-bit mode change requires a power cycle around it.
            set_power(&mut *self.lcd, false);
            set_mode(&mut *self.lcd, LCD_MODE_RGB888);
            self.lcd.set_scanout_base(new_base);
            set_power(&mut *self.lcd, true);
        } else {
            set_mode(&mut *self.lcd, LCD_MODE_RGB565);
            self.lcd.set_scanout_base(new_base);
        }
        Some(previous)
    }

    /// Restores the LCD to its pre-playback mode and base address.
    fn cleanup_lcd(&mut self, previous_scanout: Option<usize>) {
        let Some(previous) = previous_scanout else {
            return;
        };
        set_power(&mut *self.lcd, false);
        set_mode(&mut *self.lcd, LCD_MODE_RGB565);
        self.lcd.set_scanout_base(previous);
        set_power(&mut *self.lcd, true);
    }

    /// Maps the option set onto per-call decoder flags.
    pub(crate) fn decode_flags(&self, discontinuity: bool) -> DecodeFlags {
        DecodeFlags {
            fast: self.options.fast_decode,
            low_delay: self.options.low_delay,
            deblock_luma: self.options.deblock_luma,
            deblock_chroma: self.options.deblock_chroma,
            dering_luma: self.options.dering_luma,
            dering_chroma: self.options.dering_chroma,
            discontinuity,
        }
    }

    /// True when a construction or playback error has been recorded.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// The current status / error message.
    pub fn error_message(&self) -> &str {
        &self.status
    }

    /// The coded dimensions reported by the decoder.
    pub fn video_dimensions(&self) -> (u32, u32) {
        (self.video_width, self.video_height)
    }

    /// Timing parameters extracted from the VOL header.
    pub fn timing(&self) -> VideoTiming {
        self.timing
    }

    /// The session's profiling vectors.
    pub fn profiling(&self) -> &ProfilingInfo {
        &self.profiling
    }

    /// Full diagnostic report: resource states, timing parameters, and a
    /// five-number summary of every profiling vector.
    pub fn dump_state(&self) -> String {
        let p = &self.profiling;
        let memmove_rates: Vec<u32> = p
            .refills
            .iter()
            .map(|s| s.memmove_bytes_per_tick())
            .collect();
        let read_rates: Vec<u32> = p.refills.iter().map(|s| s.read_bytes_per_tick()).collect();

        let mut out = String::new();
        out.push_str("VideoPlayer State Dump:\n");
        out.push_str("-----------------------\n");
        let _ = writeln!(
            out,
            "Video File: {}",
            if self.file.is_some() { "Open" } else { "Closed" }
        );
        let _ = writeln!(out, "Decoder Read Head: {}", self.input.head());
        let _ = writeln!(out, "Decoder Read Available: {}", self.input.available());
        let _ = writeln!(
            out,
            "Decoded Frames Swapchain Available Count: {}",
            self.swapchain.available_count()
        );
        let _ = writeln!(
            out,
            "Frames In Flight Queue Size: {}",
            self.in_flight.len()
        );
        let _ = writeln!(
            out,
            "Video Dimensions: {}x{}",
            self.video_width, self.video_height
        );
        out.push_str("Video Timing Info:\n");
        let _ = writeln!(
            out,
            "  Time Increment Resolution: {}",
            self.timing.resolution
        );
        let _ = writeln!(
            out,
            "  Fixed VOP Rate: {}",
            if self.timing.fixed_rate { "Yes" } else { "No" }
        );
        let _ = writeln!(
            out,
            "  Fixed VOP Time Increment: {}",
            self.timing.fixed_increment
        );
        let _ = writeln!(out, "Last Frame Blit Time (ticks): {}", self.last_blit_ticks);
        let _ = writeln!(
            out,
            "Failed Flag: {}",
            if self.failed { "True" } else { "False" }
        );
        let _ = writeln!(out, "Error Message: {}", self.status);
        out.push_str("-----------------------\n");
        out.push_str("Profiling Info Summary (ticks):\n");
        let _ = writeln!(out, "I dec: {}", short_stats(&p.i_vop_decode_ticks));
        let _ = writeln!(out, "P dec: {}", short_stats(&p.p_vop_decode_ticks));
        let _ = writeln!(out, "B dec: {}", short_stats(&p.b_vop_decode_ticks));
        let _ = writeln!(out, "S dec: {}", short_stats(&p.s_vop_decode_ticks));
        let _ = writeln!(out, "Wasted dec: {}", short_stats(&p.wasted_decode_ticks));
        let _ = writeln!(out, "Blit: {}", short_stats(&p.blit_ticks));
        let _ = writeln!(
            out,
            "Memmove times (bytes/tick): {}",
            short_stats(&memmove_rates)
        );
        let _ = writeln!(
            out,
            "File Read Times (bytes/tick): {}",
            short_stats(&read_rates)
        );
        let _ = writeln!(
            out,
            "Pacing Wait Times: {}",
            short_stats(&p.pacing_wait_ticks)
        );
        let _ = writeln!(out, "Frame too late count: {}", p.late_frame_count());
        let _ = writeln!(
            out,
            "Total Frame Times: {}",
            short_stats(&p.frame_total_ticks)
        );
        let _ = writeln!(
            out,
            "Average FPS: {:.2}",
            p.average_fps(TICKS_PER_SECOND)
        );
        out
    }
}

impl Drop for PlayerEngine {
    fn drop(&mut self) {
        // Hand the timer back exactly as the host left it. The SRAM shadow
        // field restores the scratch window after the decoder is gone.
        self.timer.restore_state(self.saved_timer_state);
    }
}
