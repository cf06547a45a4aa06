//! End-to-end playback scenarios.
//!
//! These tests drive the whole engine - construction, the pacing loop, the
//! decode pump, presentation, and teardown - over scripted hardware: a
//! simulated down-counting timer, a recording LCD, a keypad/sleep host
//! whose sleeps advance the simulated clock, and a scripted decoder that
//! consumes byte windows the way the real one does (including the
//! zero-consumption "need more data" shape at window boundaries).

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use m4v_engine::decoder::{
    DecodeReport, DecodeRequest, DecoderError, MpegDecoder, UnitKind,
};
use m4v_engine::file_buffer::FILE_BUFFER_SIZE;
use m4v_engine::framebuffer::FRAME_TOTAL_PIXELS;
use m4v_engine::lcd::{LcdDevice, LCD_MODE_RGB565};
use m4v_engine::mmio::DeviceBus;
use m4v_engine::platform::HostHooks;
use m4v_engine::player::{Board, PlayOptions, PlayerEngine, PlayerError};
use m4v_engine::sram::SramRegion;
use m4v_engine::timer::{Sp804Timer, TICKS_PER_SECOND};

const SRAM_LEN: usize = 0x20000;
const FRAME_BYTES: usize = FRAME_TOTAL_PIXELS * 2;
const DECODE_COST_TICKS: u32 = 200;

// ============================================================================
// Simulated clock and devices
// ============================================================================

/// Shared down-counting tick counter. Time passes only when something
/// spends it (decoding, sleeping), keeping the scenarios deterministic.
#[derive(Clone)]
struct SimClock(Rc<Cell<u32>>);

impl SimClock {
    fn new(value: u32) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    fn value(&self) -> u32 {
        self.0.get()
    }

    fn set(&self, value: u32) {
        self.0.set(value);
    }

    fn advance(&self, ticks: u32) {
        self.0.set(self.0.get().wrapping_sub(ticks));
    }
}

/// SP804 register file whose VALUE register is the simulated clock.
struct SimTimerBus {
    clock: SimClock,
    regs: RefCell<[u32; 8]>,
}

impl SimTimerBus {
    fn new(clock: SimClock) -> Self {
        Self {
            clock,
            regs: RefCell::new([0; 8]),
        }
    }
}

impl DeviceBus for SimTimerBus {
    fn read32(&self, offset: usize) -> u32 {
        match offset {
            0x04 => self.clock.value(),
            _ => self.regs.borrow()[offset / 4],
        }
    }

    fn write32(&mut self, offset: usize, value: u32) {
        let mut regs = self.regs.borrow_mut();
        match offset {
            // LOAD reloads the counter; BGLOAD updates LOAD only.
            0x00 => {
                regs[0] = value;
                self.clock.set(value);
            }
            0x18 => {
                regs[6] = value;
                regs[0] = value;
            }
            _ => regs[offset / 4] = value,
        }
    }
}

#[derive(Default)]
struct LcdState {
    control: Cell<u32>,
    base: Cell<usize>,
    base_history: RefCell<Vec<usize>>,
    blits: RefCell<Vec<usize>>,
    blit_supported: Cell<bool>,
    control_writes: Cell<u32>,
}

struct SimLcd(Rc<LcdState>);

impl LcdDevice for SimLcd {
    fn control(&self) -> u32 {
        self.0.control.get()
    }

    fn set_control(&mut self, value: u32) {
        self.0.control_writes.set(self.0.control_writes.get() + 1);
        self.0.control.set(value);
    }

    fn scanout_base(&self) -> usize {
        self.0.base.get()
    }

    fn set_scanout_base(&mut self, base: usize) {
        self.0.base_history.borrow_mut().push(base);
        self.0.base.set(base);
    }

    fn init_blit(&mut self) -> bool {
        self.0.blit_supported.get()
    }

    fn blit(&mut self, pixels: &[u8]) {
        self.0.blits.borrow_mut().push(pixels.len());
    }
}

#[derive(Default)]
struct HostState {
    sleep_calls: Cell<u32>,
    polls: Cell<u32>,
    escape_after: Cell<Option<u32>>,
}

struct SimHost {
    clock: SimClock,
    state: Rc<HostState>,
}

impl HostHooks for SimHost {
    fn sleep_ms(&self, ms: u32) {
        self.state.sleep_calls.set(self.state.sleep_calls.get() + 1);
        self.clock
            .advance((u64::from(ms) * u64::from(TICKS_PER_SECOND) / 1000) as u32);
    }

    fn any_key_pressed(&self) -> bool {
        let polls = self.state.polls.get() + 1;
        self.state.polls.set(polls);
        match self.state.escape_after.get() {
            Some(after) => polls > after,
            None => false,
        }
    }

    fn escape_pressed(&self) -> bool {
        true
    }
}

// ============================================================================
// Scripted decoder
// ============================================================================

enum Step {
    Unit {
        consume: usize,
        kind: UnitKind,
        time_base: i64,
        time_increment: i64,
        width: u32,
        height: u32,
    },
    Fail(DecoderError),
}

struct ScriptedDecoder {
    clock: SimClock,
    steps: VecDeque<Step>,
    tables_loaded: Rc<Cell<bool>>,
}

impl ScriptedDecoder {
    fn new(clock: SimClock, steps: Vec<Step>, tables_loaded: Rc<Cell<bool>>) -> Self {
        Self {
            clock,
            steps: steps.into(),
            tables_loaded,
        }
    }

    fn starved() -> DecodeReport {
        DecodeReport {
            bytes_consumed: 0,
            kind: UnitKind::Other(0),
            time_base: 0,
            time_increment: 0,
            width: 0,
            height: 0,
        }
    }
}

impl MpegDecoder for ScriptedDecoder {
    fn load_tables(&mut self, scratch: &mut SramRegion) -> Result<(), DecoderError> {
        self.tables_loaded.set(true);
        scratch.as_mut_slice()[..64].fill(0x5C);
        Ok(())
    }

    fn decode(&mut self, request: DecodeRequest<'_>) -> Result<DecodeReport, DecoderError> {
        self.clock.advance(DECODE_COST_TICKS);

        let needs = match self.steps.front() {
            None => return Ok(Self::starved()),
            Some(Step::Fail(_)) => 0,
            Some(Step::Unit { consume, .. }) => *consume,
        };
        if request.bitstream.len() < needs {
            return Ok(Self::starved());
        }

        let DecodeRequest { mut output, .. } = request;
        match self.steps.pop_front().expect("front checked above") {
            Step::Fail(e) => Err(e),
            Step::Unit {
                consume,
                kind,
                time_base,
                time_increment,
                width,
                height,
            } => {
                if kind.is_picture() {
                    if let Some(plane) = output.as_mut() {
                        plane.pixels[..4].copy_from_slice(&[0xDE, 0xC0, 0xDE, 0xD0]);
                    }
                }
                Ok(DecodeReport {
                    bytes_consumed: consume,
                    kind,
                    time_base,
                    time_increment,
                    width,
                    height,
                })
            }
        }
    }
}

// ============================================================================
// Stream construction
// ============================================================================

/// MSB-first bit assembler for VOL payloads.
struct BitWriter {
    bytes: Vec<u8>,
    acc: u8,
    used: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            acc: 0,
            used: 0,
        }
    }

    fn put(&mut self, value: u32, n: u32) {
        for i in (0..n).rev() {
            self.acc = (self.acc << 1) | ((value >> i) & 1) as u8;
            self.used += 1;
            if self.used == 8 {
                self.bytes.push(self.acc);
                self.acc = 0;
                self.used = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.used > 0 {
            self.bytes.push(self.acc << (8 - self.used));
        }
        self.bytes
    }
}

fn increment_bits(resolution: u16) -> u32 {
    if resolution <= 1 {
        return 1;
    }
    (16 - (resolution - 1).leading_zeros() as u32).max(1)
}

/// A complete VOL unit: start code plus a minimal rectangular header.
fn vol_unit(resolution: u16, fixed: bool, increment: u16) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.put(0, 1); // random_accessible_vol
    w.put(1, 8); // video_object_type_indication
    w.put(0, 1); // is_object_layer_identifier
    w.put(1, 4); // aspect_ratio_info: square
    w.put(0, 1); // vol_control_parameters
    w.put(0, 2); // shape: rectangular
    w.put(1, 1); // marker
    w.put(u32::from(resolution), 16);
    w.put(1, 1); // marker
    w.put(u32::from(fixed), 1);
    if fixed {
        w.put(u32::from(increment), increment_bits(resolution));
    }
    let mut unit = vec![0x00, 0x00, 0x01, 0x20];
    unit.extend(w.finish());
    unit
}

const FRAME_UNIT_BYTES: usize = 1000;

/// Script steps for `count` picture frames at `resolution` ticks/second,
/// one timing tick apart, alternating I- and P-VOPs.
fn frame_steps(count: usize, resolution: u16, width: u32, height: u32) -> Vec<Step> {
    (0..count)
        .map(|k| Step::Unit {
            consume: FRAME_UNIT_BYTES,
            kind: if k % 12 == 0 {
                UnitKind::IVop
            } else {
                UnitKind::PVop
            },
            time_base: k as i64 / i64::from(resolution),
            time_increment: k as i64 % i64::from(resolution),
            width,
            height,
        })
        .collect()
}

fn vol_step(unit_len: usize, width: u32, height: u32) -> Step {
    Step::Unit {
        consume: unit_len,
        kind: UnitKind::Vol,
        time_base: 0,
        time_increment: 0,
        width,
        height,
    }
}

fn write_stream(name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("m4v-engine-{}-{}", std::process::id(), name));
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Stream bytes: one VOL unit followed by `frames` fixed-size frame units.
fn stream_bytes(vol: &[u8], frames: usize) -> Vec<u8> {
    let mut bytes = vol.to_vec();
    for k in 0..frames {
        bytes.extend(std::iter::repeat((k % 251) as u8 | 0x80).take(FRAME_UNIT_BYTES));
    }
    bytes
}

// ============================================================================
// Harness
// ============================================================================

struct Rig {
    clock: SimClock,
    lcd: Rc<LcdState>,
    host: Rc<HostState>,
    tables_loaded: Rc<Cell<bool>>,
    sram_base: usize,
    magic_base: usize,
}

impl Rig {
    fn new() -> Self {
        let lcd = Rc::new(LcdState::default());
        lcd.control.set((LCD_MODE_RGB565 << 1) | 1);
        lcd.base.set(0x00CA_FE00);
        Self {
            clock: SimClock::new(0x8000_0000),
            lcd,
            host: Rc::new(HostState::default()),
            tables_loaded: Rc::new(Cell::new(false)),
            sram_base: vec![0xA5u8; SRAM_LEN].leak().as_mut_ptr() as usize,
            magic_base: vec![0u8; FRAME_BYTES].leak().as_mut_ptr() as usize,
        }
    }

    fn board(&self) -> Board {
        Board {
            timer: Sp804Timer::new(Box::new(SimTimerBus::new(self.clock.clone()))),
            lcd: Box::new(SimLcd(Rc::clone(&self.lcd))),
            host: Box::new(SimHost {
                clock: self.clock.clone(),
                state: Rc::clone(&self.host),
            }),
            // SAFETY: the backing allocation is leaked and test-exclusive.
            sram: unsafe { SramRegion::from_raw(self.sram_base as *mut u8, SRAM_LEN) },
            magic_framebuffer_base: self.magic_base,
        }
    }

    fn decoder(&self, steps: Vec<Step>) -> Box<dyn MpegDecoder> {
        Box::new(ScriptedDecoder::new(
            self.clock.clone(),
            steps,
            Rc::clone(&self.tables_loaded),
        ))
    }

    fn sram_contents(&self) -> &[u8] {
        // SAFETY: leaked backing; only called once the engine is gone.
        unsafe { std::slice::from_raw_parts(self.sram_base as *const u8, SRAM_LEN) }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

/// Happy path on the magic framebuffer: 60 frames at a fixed 30 fps play to
/// completion, on time, and drain cleanly.
#[test]
fn happy_path_magic_framebuffer_at_nominal_rate() {
    let vol = vol_unit(30, true, 1);
    let path = write_stream("happy", &stream_bytes(&vol, 60));

    let rig = Rig::new();
    let mut steps = vec![vol_step(vol.len(), 320, 240)];
    steps.extend(frame_steps(60, 30, 320, 240));
    let mut engine = PlayerEngine::new(
        path.to_str().unwrap(),
        PlayOptions::default(),
        rig.decoder(steps),
        rig.board(),
    )
    .unwrap();

    assert_eq!(engine.error_message(), "Successful initialization");
    engine.play().unwrap();
    assert!(!engine.failed());

    let profiling = engine.profiling();
    assert_eq!(profiling.blit_ticks.len(), 60);
    assert_eq!(profiling.late_frame_count(), 0);
    let fps = profiling.average_fps(TICKS_PER_SECOND);
    assert!((27.0..=33.0).contains(&fps), "average fps {fps}");

    let dump = engine.dump_state();
    assert!(dump.contains("Frames In Flight Queue Size: 0"), "{dump}");
    assert!(dump.contains("Frame too late count: 0"), "{dump}");
    assert!(dump.contains("Video Dimensions: 320x240"), "{dump}");
}

/// A variable-rate stream paces from the decoder-reported stream time
/// instead of the frame counter.
#[test]
fn variable_rate_paces_from_stream_time() {
    let vol = vol_unit(30, false, 0);
    let path = write_stream("variable", &stream_bytes(&vol, 45));

    let rig = Rig::new();
    let mut steps = vec![vol_step(vol.len(), 320, 240)];
    steps.extend(frame_steps(45, 30, 320, 240));
    let mut engine = PlayerEngine::new(
        path.to_str().unwrap(),
        PlayOptions::default(),
        rig.decoder(steps),
        rig.board(),
    )
    .unwrap();

    assert!(!engine.timing().fixed_rate);
    engine.play().unwrap();
    let fps = engine.profiling().average_fps(TICKS_PER_SECOND);
    assert!((27.0..=33.0).contains(&fps), "average fps {fps}");
}

/// A stream truncated mid-frame ends playback cleanly after the last
/// complete frame: EOF is not an error.
#[test]
fn truncated_stream_ends_cleanly() {
    let vol = vol_unit(30, true, 1);
    let mut bytes = stream_bytes(&vol, 3);
    bytes.extend(std::iter::repeat(0x99u8).take(FRAME_UNIT_BYTES / 2));
    let path = write_stream("truncated", &bytes);

    let rig = Rig::new();
    let mut steps = vec![vol_step(vol.len(), 320, 240)];
    steps.extend(frame_steps(4, 30, 320, 240));
    let mut engine = PlayerEngine::new(
        path.to_str().unwrap(),
        PlayOptions::default(),
        rig.decoder(steps),
        rig.board(),
    )
    .unwrap();

    engine.play().unwrap();
    assert!(!engine.failed());
    assert_eq!(engine.error_message(), "Successful initialization");
    assert_eq!(engine.profiling().blit_ticks.len(), 3);
    // The truncated tail shows up as wasted decode attempts, not failures.
    assert!(!engine.profiling().wasted_decode_ticks.is_empty());
}

/// A decoder that consumes nothing from a full input buffer is a stall.
#[test]
fn decoder_stall_is_fatal() {
    let vol = vol_unit(30, true, 1);
    let mut bytes = vol.clone();
    bytes.extend(std::iter::repeat(0x42u8).take(FILE_BUFFER_SIZE));
    let path = write_stream("stall", &bytes);

    let rig = Rig::new();
    let steps = vec![vol_step(vol.len(), 320, 240)];
    let err = PlayerEngine::new(
        path.to_str().unwrap(),
        PlayOptions::default(),
        rig.decoder(steps),
        rig.board(),
    )
    .map(|_| ())
    .unwrap_err();

    assert!(matches!(err, PlayerError::Stall(_)), "{err:?}");
    assert!(err.to_string().contains("stalled"), "{err}");
}

/// Coded dimensions that disagree with the panel are a startup error.
#[test]
fn geometry_mismatch_rejected() {
    let vol = vol_unit(30, true, 1);
    let path = write_stream("geometry", &stream_bytes(&vol, 2));

    let rig = Rig::new();
    let mut steps = vec![vol_step(vol.len(), 640, 480)];
    steps.extend(frame_steps(2, 30, 640, 480));
    let err = PlayerEngine::new(
        path.to_str().unwrap(),
        PlayOptions::default(),
        rig.decoder(steps),
        rig.board(),
    )
    .map(|_| ())
    .unwrap_err();

    assert!(matches!(err, PlayerError::Geometry(_)), "{err:?}");
    assert!(err.to_string().contains("640x480"), "{err}");
}

/// Escape aborts playback; the LCD still gets restored.
#[test]
fn user_escape_cancels_playback() {
    let vol = vol_unit(30, true, 1);
    let path = write_stream("escape", &stream_bytes(&vol, 60));

    let rig = Rig::new();
    rig.host.escape_after.set(Some(5));
    let mut steps = vec![vol_step(vol.len(), 320, 240)];
    steps.extend(frame_steps(60, 30, 320, 240));
    let mut engine = PlayerEngine::new(
        path.to_str().unwrap(),
        PlayOptions::default(),
        rig.decoder(steps),
        rig.board(),
    )
    .unwrap();

    let err = engine.play().unwrap_err();
    assert_eq!(err, PlayerError::Cancelled);
    assert!(engine.failed());
    assert_eq!(engine.error_message(), "Playback aborted by user");

    // Cleanup ran: RGB565 mode, power on, original scan-out base.
    assert_eq!((rig.lcd.control.get() >> 1) & 0b111, LCD_MODE_RGB565);
    assert_eq!(rig.lcd.control.get() & 1, 1);
    assert_eq!(rig.lcd.base.get(), 0x00CA_FE00);
}

/// The SRAM scratch window is restored bit-for-bit when the engine drops,
/// even though the decoder scribbled tables into it.
#[test]
fn sram_scratch_restored_on_drop() {
    let vol = vol_unit(30, true, 1);
    let path = write_stream("sram", &stream_bytes(&vol, 2));

    let rig = Rig::new();
    let mut steps = vec![vol_step(vol.len(), 320, 240)];
    steps.extend(frame_steps(2, 30, 320, 240));
    {
        let mut engine = PlayerEngine::new(
            path.to_str().unwrap(),
            PlayOptions::default(),
            rig.decoder(steps),
            rig.board(),
        )
        .unwrap();
        assert!(rig.tables_loaded.get());
        engine.play().unwrap();
    }
    assert!(rig.sram_contents().iter().all(|&b| b == 0xA5));
    // Dropping the engine also restored the timer to its recorded state:
    // the counter goes back to where the host left it.
    assert_eq!(rig.clock.value(), 0x8000_0000);
}

/// Rotated-blit playback drives the scan-out from the rotation buffer and
/// restores mode and base afterwards.
#[test]
fn lcd_restored_after_rotated_playback() {
    let vol = vol_unit(30, true, 1);
    let path = write_stream("rotated", &stream_bytes(&vol, 5));

    let rig = Rig::new();
    let mut steps = vec![vol_step(vol.len(), 320, 240)];
    steps.extend(frame_steps(5, 30, 320, 240));
    let options = PlayOptions {
        magic_framebuffer: false,
        ..PlayOptions::default()
    };
    let mut engine = PlayerEngine::new(
        path.to_str().unwrap(),
        options,
        rig.decoder(steps),
        rig.board(),
    )
    .unwrap();

    engine.play().unwrap();
    drop(engine);

    // During playback the base pointed at the rotation buffer, not the
    // host's framebuffer; afterwards everything is back.
    let history = rig.lcd.base_history.borrow();
    assert!(history.len() >= 2);
    assert_ne!(history[0], 0x00CA_FE00);
    assert_eq!(*history.last().unwrap(), 0x00CA_FE00);
    assert_eq!((rig.lcd.control.get() >> 1) & 0b111, LCD_MODE_RGB565);
    assert_eq!(rig.lcd.control.get() & 1, 1);
}

/// The blit-API path pushes every frame through the host primitive.
#[test]
fn blit_api_presents_every_frame() {
    let vol = vol_unit(30, true, 1);
    let path = write_stream("blit", &stream_bytes(&vol, 4));

    let rig = Rig::new();
    rig.lcd.blit_supported.set(true);
    let mut steps = vec![vol_step(vol.len(), 320, 240)];
    steps.extend(frame_steps(4, 30, 320, 240));
    let options = PlayOptions {
        magic_framebuffer: false,
        lcd_blit_api: true,
        ..PlayOptions::default()
    };
    let mut engine = PlayerEngine::new(
        path.to_str().unwrap(),
        options,
        rig.decoder(steps),
        rig.board(),
    )
    .unwrap();

    engine.play().unwrap();
    let blits = rig.lcd.blits.borrow();
    assert_eq!(blits.len(), 4);
    assert!(blits.iter().all(|&len| len == FRAME_BYTES));
    // The blit path never swaps scan-out mid-playback; the only base write
    // is the cleanup restore.
    assert_eq!(*rig.lcd.base_history.borrow(), vec![0x00CA_FE00]);
}

/// A host without the blit primitive fails construction on the blit path.
#[test]
fn blit_api_requires_host_support() {
    let vol = vol_unit(30, true, 1);
    let path = write_stream("noblit", &stream_bytes(&vol, 2));

    let rig = Rig::new();
    let mut steps = vec![vol_step(vol.len(), 320, 240)];
    steps.extend(frame_steps(2, 30, 320, 240));
    let options = PlayOptions {
        magic_framebuffer: false,
        lcd_blit_api: true,
        ..PlayOptions::default()
    };
    let err = PlayerEngine::new(
        path.to_str().unwrap(),
        options,
        rig.decoder(steps),
        rig.board(),
    )
    .map(|_| ())
    .unwrap_err();
    assert_eq!(err.to_string(), "Failed to initialize LCD");
}

/// Pre-rotated portrait video presents by swapping the scan-out base
/// between the two swap-chain buffers.
#[test]
fn pre_rotated_swaps_scanout_base() {
    let vol = vol_unit(30, true, 1);
    let path = write_stream("prerot", &stream_bytes(&vol, 6));

    let rig = Rig::new();
    let mut steps = vec![vol_step(vol.len(), 240, 320)];
    steps.extend(frame_steps(6, 30, 240, 320));
    let options = PlayOptions {
        magic_framebuffer: false,
        pre_rotated_video: true,
        ..PlayOptions::default()
    };
    let mut engine = PlayerEngine::new(
        path.to_str().unwrap(),
        options,
        rig.decoder(steps),
        rig.board(),
    )
    .unwrap();

    engine.play().unwrap();
    assert_eq!(engine.video_dimensions(), (240, 320));

    let history = rig.lcd.base_history.borrow();
    // Initial surface + one swap per presented frame + restore.
    assert!(history.len() >= 8, "history: {history:?}");
    let presented = &history[1..history.len() - 1];
    let distinct: std::collections::BTreeSet<usize> = presented.iter().copied().collect();
    assert_eq!(distinct.len(), 2, "two buffers alternate: {presented:?}");
    assert_eq!(*history.last().unwrap(), 0x00CA_FE00);
}

/// Benchmark mode never sleeps and never touches the LCD.
#[test]
fn benchmark_skips_sleep_and_lcd() {
    let vol = vol_unit(30, true, 1);
    let path = write_stream("bench", &stream_bytes(&vol, 10));

    let rig = Rig::new();
    let control_before = rig.lcd.control.get();
    let mut steps = vec![vol_step(vol.len(), 320, 240)];
    steps.extend(frame_steps(10, 30, 320, 240));
    let options = PlayOptions {
        benchmark: true,
        ..PlayOptions::default()
    };
    let mut engine = PlayerEngine::new(
        path.to_str().unwrap(),
        options,
        rig.decoder(steps),
        rig.board(),
    )
    .unwrap();

    engine.play().unwrap();
    assert_eq!(rig.host.sleep_calls.get(), 0);
    assert_eq!(rig.lcd.control_writes.get(), 0);
    assert_eq!(rig.lcd.control.get(), control_before);
    assert!(rig.lcd.base_history.borrow().is_empty());
}

/// Invalid option combinations fail before any resource is touched.
#[test]
fn config_error_reported_before_decoder_touched() {
    let rig = Rig::new();
    let options = PlayOptions {
        magic_framebuffer: true,
        use_24bit_rgb: true,
        ..PlayOptions::default()
    };
    let err = PlayerEngine::new(
        "/nonexistent/never-opened.m4v",
        options,
        rig.decoder(Vec::new()),
        rig.board(),
    )
    .map(|_| ())
    .unwrap_err();

    assert!(matches!(err, PlayerError::Config(_)), "{err:?}");
    assert!(!rig.tables_loaded.get());
}

/// A mid-stream decoder failure surfaces with the decoder's message.
#[test]
fn decoder_error_mid_stream_is_fatal() {
    let vol = vol_unit(30, true, 1);
    let path = write_stream("decerr", &stream_bytes(&vol, 3));

    let rig = Rig::new();
    let mut steps = vec![vol_step(vol.len(), 320, 240)];
    steps.extend(frame_steps(1, 30, 320, 240));
    steps.push(Step::Fail(DecoderError::Format));
    let mut engine = PlayerEngine::new(
        path.to_str().unwrap(),
        PlayOptions::default(),
        rig.decoder(steps),
        rig.board(),
    )
    .unwrap();

    let err = engine.play().unwrap_err();
    assert!(matches!(err, PlayerError::Decode(_)), "{err:?}");
    assert!(err.to_string().contains("invalid bitstream format"), "{err}");
    assert!(engine.failed());
    assert!(engine
        .error_message()
        .contains("invalid bitstream format"));
}

/// The magic framebuffer really is the decode target: decoded bytes land
/// in the scan-out region with no copy.
#[test]
fn magic_framebuffer_receives_decoded_pixels() {
    let vol = vol_unit(30, true, 1);
    let path = write_stream("magicpix", &stream_bytes(&vol, 2));

    let rig = Rig::new();
    let mut steps = vec![vol_step(vol.len(), 320, 240)];
    steps.extend(frame_steps(2, 30, 320, 240));
    let mut engine = PlayerEngine::new(
        path.to_str().unwrap(),
        PlayOptions::default(),
        rig.decoder(steps),
        rig.board(),
    )
    .unwrap();
    engine.play().unwrap();
    drop(engine);

    // SAFETY: leaked backing, engine gone.
    let magic = unsafe { std::slice::from_raw_parts(rig.magic_base as *const u8, 4) };
    assert_eq!(magic, &[0xDE, 0xC0, 0xDE, 0xD0]);
}
