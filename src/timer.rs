#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub count: u8,
}

impl Timer {
    pub fn set(&mut self, value: u8) {
        self.count = value;
    }

    /// One scheduler cycle has passed.
    pub fn tick(&mut self) {
        self.count = self.count.saturating_sub(1);
    }
}

/// Delay and sound timers. The scheduler ticks both once per cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct Timers {
    pub delay: Timer,
    pub sound: Timer,
}

impl Timers {
    pub fn tick(&mut self) {
        self.delay.tick();
        self.sound.tick();
    }
}
