//! Host environment hooks.
//!
//! The two places the engine yields the CPU - the millisecond pacing sleep
//! and keypad polling - go through a trait so playback can run against the
//! real host or a scripted harness.

use std::time::Duration;

/// Blocking services provided by the host environment.
pub trait HostHooks {
    /// Sleeps for roughly `ms` milliseconds.
    fn sleep_ms(&self, ms: u32);

    /// True while any key is held down.
    fn any_key_pressed(&self) -> bool;

    /// True while the escape key is held down.
    fn escape_pressed(&self) -> bool;
}

/// Host hooks backed by `std`: real sleeps, no keypad.
#[derive(Debug, Default)]
pub struct StdHost;

impl HostHooks for StdHost {
    fn sleep_ms(&self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }

    fn any_key_pressed(&self) -> bool {
        false
    }

    fn escape_pressed(&self) -> bool {
        false
    }
}
