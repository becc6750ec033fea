use minifb::Key;

/// Cycles a key stays pressed after its last notification when the cycle
/// length is unknown. Front ends re-send every key that is down once per
/// frame, so this has to cover a bit more than one frame.
pub const KEY_HOLD_TICKS: u8 = 10;

/// Fixed physical key to hex keypad table. Static configuration, handed to
/// the front end when it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keymap {
    keys: [(Key, u8); 16],
}

impl Keymap {
    /// '0' => 0x0 .. '9' => 0x9, 'a' => 0xA .. 'f' => 0xF
    pub const LITERAL: Keymap = Keymap {
        keys: [
            (Key::Key0, 0x0),
            (Key::Key1, 0x1),
            (Key::Key2, 0x2),
            (Key::Key3, 0x3),
            (Key::Key4, 0x4),
            (Key::Key5, 0x5),
            (Key::Key6, 0x6),
            (Key::Key7, 0x7),
            (Key::Key8, 0x8),
            (Key::Key9, 0x9),
            (Key::A, 0xA),
            (Key::B, 0xB),
            (Key::C, 0xC),
            (Key::D, 0xD),
            (Key::E, 0xE),
            (Key::F, 0xF),
        ],
    };

    /// left-hand side of a qwerty keyboard, laid out like the COSMAC keypad
    ///   1 2 3 C      1 2 3 4
    ///   4 5 6 D      Q W E R
    ///   7 8 9 E      A S D F
    ///   A 0 B F      Z X C V
    pub const QWERTY: Keymap = Keymap {
        keys: [
            (Key::X, 0x0),
            (Key::Key1, 0x1),
            (Key::Key2, 0x2),
            (Key::Key3, 0x3),
            (Key::Q, 0x4),
            (Key::W, 0x5),
            (Key::E, 0x6),
            (Key::A, 0x7),
            (Key::S, 0x8),
            (Key::D, 0x9),
            (Key::Z, 0xA),
            (Key::C, 0xB),
            (Key::Key4, 0xC),
            (Key::R, 0xD),
            (Key::F, 0xE),
            (Key::V, 0xF),
        ],
    };

    pub fn key_to_num(&self, key: Key) -> Option<u8> {
        self.keys
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, num)| *num)
    }
}

/// Engine-side view of the hex keypad, fed from drained key notifications.
#[derive(Debug, Clone)]
pub struct Keyboard {
    // remaining hold ticks per key, 0 means released
    keys: [u8; 16],
    hold: u8,
    // oldest key notified since the last tick
    fresh: Option<u8>,
}

impl Keyboard {
    pub fn new(hold: u8) -> Self {
        Self {
            keys: [0; 16],
            hold: hold.max(1),
            fresh: None,
        }
    }

    pub fn reset(&mut self) {
        self.keys = [0; 16];
        self.fresh = None;
    }

    pub fn press(&mut self, num: u8) {
        let num = num & 0xF;
        self.keys[num as usize] = self.hold;
        self.fresh.get_or_insert(num);
    }

    /// Ages every held key by one cycle and starts a new cycle's worth of
    /// notifications.
    pub fn tick(&mut self) {
        for k in self.keys.iter_mut() {
            *k = k.saturating_sub(1);
        }
        self.fresh = None;
    }

    /// Oldest key notified during the current cycle, if any.
    pub fn take_fresh(&mut self) -> Option<u8> {
        self.fresh.take()
    }

    pub fn get_key_status_from_num(&self, n: u8) -> bool {
        self.keys[(n & 0xF) as usize] > 0
    }
}
