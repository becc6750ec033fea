use std::time::Duration;

use crate::keyboard::KEY_HOLD_TICKS;
use crate::memory::Font;

pub const DEFAULT_TICK_US: u64 = 2_000;

/// A little over one 60 Hz frame, the interval at which front ends re-send
/// the keys that are down.
pub const DEFAULT_KEY_HOLD: Duration = Duration::from_millis(20);

/// Static configuration of one machine instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between fetch-decode-execute cycles. Timers tick once per cycle.
    pub tick: Duration,
    /// How long a key reads as pressed after its last notification.
    pub key_hold: Duration,
    /// Decode the program instead of running it.
    pub disassemble: bool,
    /// Forward every executed instruction to the display's debug overlay.
    pub debug: bool,
    /// Seed for CXNN, entropy when unset.
    pub seed: Option<u64>,
    pub font: Font,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick: Duration::from_micros(DEFAULT_TICK_US),
            key_hold: DEFAULT_KEY_HOLD,
            disassemble: false,
            debug: false,
            seed: None,
            font: Font::default(),
        }
    }
}

impl Config {
    /// `key_hold` in cycles, rounded up. Falls back to `KEY_HOLD_TICKS` when
    /// cycles are not paced.
    pub fn key_hold_ticks(&self) -> u8 {
        let tick = self.tick.as_micros();
        if tick == 0 {
            return KEY_HOLD_TICKS;
        }
        let ticks = (self.key_hold.as_micros() + tick - 1) / tick;
        ticks.clamp(1, u8::MAX as u128) as u8
    }
}
