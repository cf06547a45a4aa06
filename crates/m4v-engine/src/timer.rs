//! SP804 dual-timer driver.
//!
//! The engine uses timer 1 of the SoC's SP804 block as a free-running,
//! wrapping, 32-bit down-counter with a ÷256 prescaler on the 12 MHz source
//! clock. It is started once at engine init and never stopped during
//! playback; all pacing arithmetic works on snapshots of the counter.
//! Because the counter decrements, "elapsed" is `start - now` in wrapping
//! 32-bit arithmetic.
//!
//! Register map and control-bit layout per the ARM SP804 TRM (DDI 0271).

use crate::mmio::DeviceBus;

/// Tick rate of the engine's timer configuration: 12 MHz source, ÷256.
pub const TICKS_PER_SECOND: u32 = 12_000_000 / 256;

/// Something that exposes the current hardware tick counter.
pub trait TickSource {
    /// Current value of the down-counter.
    fn ticks(&self) -> u32;
}

/// Elapsed ticks between two down-counter snapshots taken within one wrap.
pub fn elapsed(start: u32, now: u32) -> u32 {
    start.wrapping_sub(now)
}

// Timer-1 register offsets.
const LOAD: usize = 0x00;
const VALUE: usize = 0x04;
const CONTROL: usize = 0x08;
const INT_CLR: usize = 0x0C;
const MIS: usize = 0x14;
const BG_LOAD: usize = 0x18;

// Control register bits.
const CTRL_ONESHOT: u32 = 1 << 0;
const CTRL_SIZE_32: u32 = 1 << 1;
const CTRL_PRESCALE_SHIFT: u32 = 2;
const CTRL_PRESCALE_MASK: u32 = 3 << 2;
const CTRL_IRQ_ENABLE: u32 = 1 << 5;
const CTRL_PERIODIC: u32 = 1 << 6;
const CTRL_ENABLE: u32 = 1 << 7;

/// Counting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Reloads from the load register on wrap.
    Periodic,
    /// Counts through the full register range.
    FreeRunning,
}

/// Behavior at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    /// Halts at zero.
    OneShot,
    /// Wraps and keeps counting.
    Wrapping,
}

/// Prescale divider applied to the timer clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prescale {
    Div1,
    Div16,
    Div256,
}

/// Counter width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterSize {
    Bits16,
    Bits32,
}

/// Full timer configuration as written to the control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub mode: TimerMode,
    pub wrap: WrapMode,
    pub prescale: Prescale,
    pub size: CounterSize,
    pub irq_enabled: bool,
    pub enabled: bool,
}

impl TimerConfig {
    fn encode(&self) -> u32 {
        let mut control = 0;
        if self.wrap == WrapMode::OneShot {
            control |= CTRL_ONESHOT;
        }
        if self.mode == TimerMode::Periodic {
            control |= CTRL_PERIODIC;
        }
        control |= match self.prescale {
            Prescale::Div1 => 0,
            Prescale::Div16 => 1,
            Prescale::Div256 => 2,
        } << CTRL_PRESCALE_SHIFT;
        if self.size == CounterSize::Bits32 {
            control |= CTRL_SIZE_32;
        }
        if self.irq_enabled {
            control |= CTRL_IRQ_ENABLE;
        }
        if self.enabled {
            control |= CTRL_ENABLE;
        }
        control
    }

    fn decode(control: u32) -> Self {
        Self {
            mode: if control & CTRL_PERIODIC != 0 {
                TimerMode::Periodic
            } else {
                TimerMode::FreeRunning
            },
            wrap: if control & CTRL_ONESHOT != 0 {
                WrapMode::OneShot
            } else {
                WrapMode::Wrapping
            },
            prescale: match (control & CTRL_PRESCALE_MASK) >> CTRL_PRESCALE_SHIFT {
                0 => Prescale::Div1,
                1 => Prescale::Div16,
                // 0b11 is architecturally undefined; read it back as ÷256.
                _ => Prescale::Div256,
            },
            size: if control & CTRL_SIZE_32 != 0 {
                CounterSize::Bits32
            } else {
                CounterSize::Bits16
            },
            irq_enabled: control & CTRL_IRQ_ENABLE != 0,
            enabled: control & CTRL_ENABLE != 0,
        }
    }
}

/// A snapshot of load value, counter position, and configuration, suitable
/// for handing the timer back to the host environment untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub load: u32,
    pub value: u32,
    pub config: TimerConfig,
}

/// Driver for timer 1 of an SP804 block.
pub struct Sp804Timer {
    bus: Box<dyn DeviceBus>,
}

impl Sp804Timer {
    /// Wraps a device bus mapped at the SP804 block's base.
    pub fn new(bus: Box<dyn DeviceBus>) -> Self {
        Self { bus }
    }

    /// Writes the control register from `config`.
    pub fn configure(&mut self, config: TimerConfig) {
        self.bus.write32(CONTROL, config.encode());
    }

    /// Reads the control register back as a [`TimerConfig`].
    pub fn configuration(&self) -> TimerConfig {
        TimerConfig::decode(self.bus.read32(CONTROL))
    }

    /// Sets the load register. This also reloads the counter.
    pub fn set_load(&mut self, value: u32) {
        self.bus.write32(LOAD, value);
    }

    /// Reads the load register.
    pub fn load(&self) -> u32 {
        self.bus.read32(LOAD)
    }

    /// Sets the background load register: changes the reload value without
    /// touching the running counter.
    pub fn set_background_load(&mut self, value: u32) {
        self.bus.write32(BG_LOAD, value);
    }

    /// Reads the background load register.
    pub fn background_load(&self) -> u32 {
        self.bus.read32(BG_LOAD)
    }

    /// Current value of the down-counter.
    pub fn current_value(&self) -> u32 {
        self.bus.read32(VALUE)
    }

    /// Sets the enable bit, leaving the rest of the control register alone.
    pub fn start(&mut self) {
        let control = self.bus.read32(CONTROL);
        self.bus.write32(CONTROL, control | CTRL_ENABLE);
    }

    /// Clears the enable bit.
    pub fn stop(&mut self) {
        let control = self.bus.read32(CONTROL);
        self.bus.write32(CONTROL, control & !CTRL_ENABLE);
    }

    /// Masked interrupt status.
    pub fn irq_status(&self) -> u32 {
        self.bus.read32(MIS)
    }

    /// Acknowledges a pending interrupt.
    pub fn clear_irq(&mut self) {
        self.bus.write32(INT_CLR, 1);
    }

    /// Captures load value, counter position, and configuration.
    pub fn record_state(&self) -> TimerState {
        TimerState {
            load: self.load(),
            value: self.current_value(),
            config: self.configuration(),
        }
    }

    /// Restores a recorded state.
    ///
    /// The counter position is written through the main load register (which
    /// also reloads the counter), then the true reload value through the
    /// background load register (which does not touch the counter), so both
    /// are restored independently. The configuration is applied with the
    /// enable bit masked off; the timer is started afterwards only if the
    /// recorded state had it running.
    pub fn restore_state(&mut self, state: TimerState) {
        self.stop();
        self.clear_irq();
        self.set_load(state.value);
        self.set_background_load(state.load);
        let mut config = state.config;
        let was_enabled = config.enabled;
        config.enabled = false;
        self.configure(config);
        if was_enabled {
            self.start();
        }
    }
}

impl TickSource for Sp804Timer {
    fn ticks(&self) -> u32 {
        self.current_value()
    }
}

impl std::fmt::Debug for Sp804Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sp804Timer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Register file standing in for an SP804 block; records every write.
    #[derive(Default)]
    struct FakeSp804 {
        regs: RefCell<[u32; 8]>,
        writes: RefCell<Vec<(usize, u32)>>,
    }

    struct FakeBus(Rc<FakeSp804>);

    impl DeviceBus for FakeBus {
        fn read32(&self, offset: usize) -> u32 {
            self.0.regs.borrow()[offset / 4]
        }

        fn write32(&mut self, offset: usize, value: u32) {
            self.0.writes.borrow_mut().push((offset, value));
            let mut regs = self.0.regs.borrow_mut();
            regs[offset / 4] = value;
            // LOAD also reloads the counter; BGLOAD only changes LOAD.
            if offset == LOAD {
                regs[VALUE / 4] = value;
            } else if offset == BG_LOAD {
                regs[LOAD / 4] = value;
            }
        }
    }

    fn fake_timer() -> (Rc<FakeSp804>, Sp804Timer) {
        let dev = Rc::new(FakeSp804::default());
        let timer = Sp804Timer::new(Box::new(FakeBus(Rc::clone(&dev))));
        (dev, timer)
    }

    const ENGINE_CONFIG: TimerConfig = TimerConfig {
        mode: TimerMode::FreeRunning,
        wrap: WrapMode::Wrapping,
        prescale: Prescale::Div256,
        size: CounterSize::Bits32,
        irq_enabled: false,
        enabled: false,
    };

    #[test]
    fn config_encode_decode_round_trip() {
        let configs = [
            ENGINE_CONFIG,
            TimerConfig {
                mode: TimerMode::Periodic,
                wrap: WrapMode::OneShot,
                prescale: Prescale::Div16,
                size: CounterSize::Bits16,
                irq_enabled: true,
                enabled: true,
            },
            TimerConfig {
                prescale: Prescale::Div1,
                enabled: true,
                ..ENGINE_CONFIG
            },
        ];
        for config in configs {
            assert_eq!(TimerConfig::decode(config.encode()), config);
        }
    }

    #[test]
    fn engine_config_control_word() {
        // Free-running + wrapping + ÷256 + 32-bit + IRQ off + disabled:
        // only the size bit and prescale=0b10 are set.
        assert_eq!(ENGINE_CONFIG.encode(), (1 << 1) | (2 << 2));
    }

    #[test]
    fn start_stop_touch_only_the_enable_bit() {
        let (_dev, mut timer) = fake_timer();
        timer.configure(ENGINE_CONFIG);
        timer.start();
        assert!(timer.configuration().enabled);
        assert_eq!(
            TimerConfig {
                enabled: false,
                ..timer.configuration()
            },
            ENGINE_CONFIG
        );
        timer.stop();
        assert_eq!(timer.configuration(), ENGINE_CONFIG);
    }

    #[test]
    fn restore_writes_counter_then_reload() {
        let (dev, mut timer) = fake_timer();
        let state = TimerState {
            load: 0xFFFF_FFFF,
            value: 0x1234_5678,
            config: TimerConfig {
                enabled: true,
                ..ENGINE_CONFIG
            },
        };
        timer.restore_state(state);

        let writes = dev.writes.borrow();
        let load_pos = writes
            .iter()
            .position(|&(o, v)| o == LOAD && v == 0x1234_5678)
            .expect("counter restored via LOAD");
        let bg_pos = writes
            .iter()
            .position(|&(o, v)| o == BG_LOAD && v == 0xFFFF_FFFF)
            .expect("reload restored via BGLOAD");
        assert!(load_pos < bg_pos, "LOAD must be written before BGLOAD");
        drop(writes);

        assert_eq!(timer.current_value(), 0x1234_5678);
        assert_eq!(timer.load(), 0xFFFF_FFFF);
        assert!(timer.configuration().enabled);
    }

    #[test]
    fn restore_leaves_disabled_timer_stopped() {
        let (_dev, mut timer) = fake_timer();
        timer.restore_state(TimerState {
            load: 100,
            value: 50,
            config: ENGINE_CONFIG,
        });
        assert!(!timer.configuration().enabled);
    }

    #[test]
    fn elapsed_handles_wraparound() {
        assert_eq!(elapsed(100, 40), 60);
        assert_eq!(elapsed(5, 0xFFFF_FFFB), 10);
        assert_eq!(elapsed(0, 0), 0);
    }
}
