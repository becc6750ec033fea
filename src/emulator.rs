use std::io::Write;
use std::thread;
use std::time::Instant;

use log::{info, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{
    config::Config,
    decode::OpCodes,
    disasm,
    display::Display,
    error::{Chip8Error, Result},
    keyboard::Keyboard,
    memory::Memory,
    registers::{IndexRegister, ProgramCounter, Registers, Stack},
    timer::Timers,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Halted,
    Disassembling,
}

pub struct Emulator<D: Display> {
    display: D,
    pub regs: Registers,
    pub mem: Memory,
    pub pc: ProgramCounter,
    pub index: IndexRegister,
    pub stack: Stack,
    pub timers: Timers,
    keyboard: Keyboard,
    rng: StdRng,
    config: Config,
    state: State,
}

impl<D: Display> Emulator<D> {
    pub fn new(display: D, config: Config) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            display,
            regs: Registers::new(),
            mem: Memory::new(&config.font),
            pc: ProgramCounter::default(),
            index: IndexRegister::default(),
            stack: Stack::new(),
            timers: Timers::default(),
            keyboard: Keyboard::new(config.key_hold_ticks()),
            rng,
            config,
            state: State::Idle,
        }
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        self.mem.load(rom)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn delay_timer(&self) -> u8 {
        self.timers.delay.count
    }

    pub fn sound_timer(&self) -> u8 {
        self.timers.sound.count
    }

    /// Reads the word at pc and moves pc past it.
    pub fn fetch(&mut self) -> Result<u16> {
        let word = self.mem.read16(self.pc.0)?;
        self.pc.increment();
        Ok(word)
    }

    /// One fetch-decode-execute cycle. Key notifications are drained first,
    /// so each one ages from the cycle it arrived in.
    pub fn tick(&mut self) -> Result<()> {
        self.keyboard.tick();
        self.drain_keys();

        let addr = self.pc.0;
        let word = self.fetch()?;
        let ins = OpCodes::decode_raw(word);
        trace!("{}", disasm::line(addr, word));
        if self.config.debug {
            self.display.debug(&disasm::line(addr, word))?;
        }
        self.execute_ins(ins)
    }

    /// Runs the machine until the display goes away. With `disassemble` set,
    /// writes a listing of the program to `out` instead and touches nothing.
    pub fn run(&mut self, out: &mut impl Write) -> Result<State> {
        if self.config.disassemble {
            self.state = State::Disassembling;
            info!("disassembling {} bytes", self.mem.program().len());
            disasm::write_listing(out, self.mem.program())?;
            return Ok(self.state);
        }

        self.state = State::Running;
        self.keyboard.reset();
        info!("running from {:#05x}", self.pc.0);

        let mut deadline = Instant::now();
        while self.state == State::Running {
            if !self.display.is_open() {
                self.state = State::Halted;
                break;
            }

            match self.tick() {
                Ok(()) => self.timers.tick(),
                Err(Chip8Error::DisplayDisconnected) => self.state = State::Halted,
                Err(e) => {
                    self.state = State::Halted;
                    return Err(e);
                }
            }

            deadline += self.config.tick;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                deadline = now;
            }
        }

        info!("halted at {:#05x}", self.pc.0);
        Ok(self.state)
    }

    fn drain_keys(&mut self) {
        while let Some(key) = self.display.poll_key() {
            self.keyboard.press(key);
        }
    }

    pub fn execute_ins(&mut self, ins: OpCodes) -> Result<()> {
        match ins {
            OpCodes::ClearScreen => self.display.clear()?,
            OpCodes::PopSubroutine => {
                let addr = self.stack.pop()?;
                self.pc.set_addr(addr);
            }
            OpCodes::Jump(addr) => self.pc.set_addr(addr),
            OpCodes::PushSubroutine(addr) => {
                // pc already points past the call
                self.stack.push(self.pc.0)?;
                self.pc.set_addr(addr);
            }
            OpCodes::SkipEqualConstant(vx, nn) => {
                if self.regs.get(vx) == nn {
                    self.pc.increment();
                }
            }
            OpCodes::SkipNotEqualConstant(vx, nn) => {
                if self.regs.get(vx) != nn {
                    self.pc.increment();
                }
            }
            OpCodes::SkipEqualRegister(vx, vy) => {
                if self.regs.get(vx) == self.regs.get(vy) {
                    self.pc.increment();
                }
            }
            OpCodes::SkipNotEqualRegister(vx, vy) => {
                if self.regs.get(vx) != self.regs.get(vy) {
                    self.pc.increment();
                }
            }
            OpCodes::SetRegister(vx, nn) => self.regs.set_register(vx, nn),
            OpCodes::AddToRegister(vx, nn) => self.regs.add_to_register(vx, nn),
            OpCodes::CopyRegister(vx, vy) => {
                self.regs.set_register(vx, self.regs.get(vy));
            }
            OpCodes::Or(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) | self.regs.get(vy));
            }
            OpCodes::And(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) & self.regs.get(vy));
            }
            OpCodes::XOr(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) ^ self.regs.get(vy));
            }
            OpCodes::Add(vx, vy) => {
                let (z, carry) = self.regs.get(vx).overflowing_add(self.regs.get(vy));
                self.regs.set_register(vx, z);
                self.regs.set_flag(carry);
            }
            OpCodes::SubtractForward(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                self.regs.set_register(vx, x.wrapping_sub(y));
                self.regs.set_flag(x >= y); // no borrow
            }
            OpCodes::SubtractBackward(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                self.regs.set_register(vx, y.wrapping_sub(x));
                self.regs.set_flag(y >= x); // no borrow
            }
            OpCodes::RightShift(vx, vy) => {
                let value = self.regs.get(vy);
                self.regs.set_register(vx, value >> 1);
                self.regs.set_flag(value & 1 == 1);
            }
            OpCodes::LeftShift(vx, vy) => {
                let value = self.regs.get(vy);
                self.regs.set_register(vx, value << 1);
                self.regs.set_flag(value >> 7 == 1);
            }
            OpCodes::SetIndexRegister(addr) => self.index.set_addr(addr),
            OpCodes::JumpWithOffset(addr) => {
                self.pc.set_addr(addr + self.regs.get(0) as u16);
            }
            OpCodes::Random(vx, nn) => {
                let ransuu: u8 = self.rng.gen();
                self.regs.set_register(vx, nn & ransuu);
            }
            OpCodes::Display(reg_x, reg_y, height) => {
                let (x, y) = (self.regs.get(reg_x), self.regs.get(reg_y));
                let sprite = self.mem.slice(self.index.0 as usize, height as usize)?;
                let vf = self.display.sprite(x, y, sprite)?;
                self.regs.set_flag(vf);
            }
            OpCodes::SkipIfPressed(vx) => {
                if self.keyboard.get_key_status_from_num(self.regs.get(vx)) {
                    self.pc.increment();
                }
            }
            OpCodes::SkipIfNotPressed(vx) => {
                if !self.keyboard.get_key_status_from_num(self.regs.get(vx)) {
                    self.pc.increment();
                }
            }
            OpCodes::CopyDelayToRegister(vx) => {
                self.regs.set_register(vx, self.timers.delay.count);
            }
            OpCodes::CopyRegisterToDelay(vx) => self.timers.delay.set(self.regs.get(vx)),
            OpCodes::CopyRegisterToSound(vx) => self.timers.sound.set(self.regs.get(vx)),
            OpCodes::GetKey(vx) => {
                let key = match self.keyboard.take_fresh() {
                    Some(key) => Some(key),
                    None => self.display.wait_key(),
                };
                match key {
                    Some(key) => {
                        self.keyboard.press(key);
                        self.regs.set_register(vx, key);
                    }
                    None => {
                        warn!("display closed while waiting for a key");
                        self.state = State::Halted;
                    }
                }
            }
            OpCodes::AddToIndex(vx) => {
                let addr = self.index.0.wrapping_add(self.regs.get(vx) as u16);
                self.index.set_addr(addr);
                self.regs.set_flag(addr as usize > self.mem.size() - 1);
            }
            OpCodes::PointChar(vx) => {
                self.index.set_addr(self.config.font.address(self.regs.get(vx)));
            }
            OpCodes::ToDecimal(vx) => {
                let value = self.regs.get(vx);
                let digits = self.mem.slice_mut(self.index.0 as usize, 3)?;
                digits.copy_from_slice(&[value / 100, value / 10 % 10, value % 10]);
            }
            OpCodes::StoreRegisterToMemory(vx) => {
                let count = (vx & 0xF) as usize + 1;
                let dst = self.mem.slice_mut(self.index.0 as usize, count)?;
                dst.copy_from_slice(&self.regs.as_slice()[..count]);
            }
            OpCodes::LoadRegisterFromMemory(vx) => {
                let count = (vx & 0xF) as usize + 1;
                let src = self.mem.slice(self.index.0 as usize, count)?;
                for (reg, val) in src.iter().enumerate() {
                    self.regs.set_register(reg as u8, *val);
                }
            }
            OpCodes::Unimplemented(word) => return Err(Chip8Error::NotImplemented { word }),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KEY_HOLD_TICKS;
    use crate::memory::MEMORY_SIZE;
    use crate::registers::FLAG;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        clears: usize,
        sprites: Vec<(u8, u8, Vec<u8>)>,
        debug: Vec<String>,
        collide: bool,
        queued: VecDeque<u8>,
        held: Option<u8>,
        // key kept down, re-sent once every `resend_every` cycles
        down: Option<u8>,
        resend_every: usize,
        cycle: usize,
        resent: bool,
        open_for: usize,
    }

    impl Display for Recorder {
        fn clear(&mut self) -> Result<()> {
            self.clears += 1;
            Ok(())
        }

        fn sprite(&mut self, x: u8, y: u8, rows: &[u8]) -> Result<bool> {
            self.sprites.push((x, y, rows.to_vec()));
            Ok(self.collide)
        }

        fn poll_key(&mut self) -> Option<u8> {
            if let Some(key) = self.queued.pop_front() {
                return Some(key);
            }
            if let Some(key) = self.down {
                if !self.resent && self.cycle % self.resend_every == 0 {
                    self.resent = true;
                    return Some(key);
                }
            }
            // every drain ends here once per cycle
            self.resent = false;
            self.cycle += 1;
            None
        }

        fn wait_key(&mut self) -> Option<u8> {
            self.held.take()
        }

        fn debug(&mut self, line: &str) -> Result<()> {
            self.debug.push(line.to_string());
            Ok(())
        }

        fn is_open(&mut self) -> bool {
            if self.open_for == 0 {
                return false;
            }
            self.open_for -= 1;
            true
        }
    }

    fn machine(program: &[u8]) -> Emulator<Recorder> {
        let config = Config {
            tick: Duration::ZERO,
            seed: Some(8),
            ..Config::default()
        };
        let mut emu = Emulator::new(Recorder::default(), config);
        emu.load_rom(program).unwrap();
        emu
    }

    fn exec(emu: &mut Emulator<Recorder>, cycles: usize) {
        for _ in 0..cycles {
            emu.tick().unwrap();
        }
    }

    #[test]
    fn clear_display_advances_pc() {
        let mut emu = machine(&[0x00, 0xE0]);
        exec(&mut emu, 1);
        assert_eq!(emu.display().clears, 1);
        assert_eq!(emu.pc.0, 0x202);
    }

    #[test]
    fn call_then_return() {
        // 200: CALL 206; 202: LD V0, 1; 206: RET
        let mut emu = machine(&[0x22, 0x06, 0x60, 0x01, 0x00, 0x00, 0x00, 0xEE]);
        exec(&mut emu, 1);
        assert_eq!(emu.pc.0, 0x206);
        assert_eq!(emu.stack.len(), 1);
        exec(&mut emu, 1);
        assert_eq!(emu.pc.0, 0x202);
        assert!(emu.stack.is_empty());
        exec(&mut emu, 1);
        assert_eq!(emu.regs.get(0), 1);
    }

    #[test]
    fn return_with_empty_stack_is_fatal() {
        let mut emu = machine(&[0x00, 0xEE]);
        assert!(matches!(emu.tick(), Err(Chip8Error::StackUnderflow)));
    }

    #[test]
    fn runaway_recursion_overflows() {
        // 200: CALL 200
        let mut emu = machine(&[0x22, 0x00]);
        exec(&mut emu, 16);
        assert!(matches!(
            emu.tick(),
            Err(Chip8Error::StackOverflow { addr: 0x202 })
        ));
    }

    #[test]
    fn jumps() {
        let mut emu = machine(&[0x13, 0x45]);
        exec(&mut emu, 1);
        assert_eq!(emu.pc.0, 0x345);

        // LD V0, 4; JP V0, 300
        let mut emu = machine(&[0x60, 0x04, 0xB3, 0x00]);
        exec(&mut emu, 2);
        assert_eq!(emu.pc.0, 0x304);
    }

    #[test]
    fn conditional_skips() {
        // V1 = 5, V2 = 5
        let setup = [0x61, 0x05, 0x62, 0x05];
        let cases: [([u8; 2], u16); 8] = [
            ([0x31, 0x05], 0x208), // SE V1, 5
            ([0x31, 0x06], 0x206),
            ([0x41, 0x06], 0x208), // SNE V1, 6
            ([0x41, 0x05], 0x206),
            ([0x51, 0x20], 0x208), // SE V1, V2
            ([0x51, 0x00], 0x206), // SE V1, V0
            ([0x91, 0x00], 0x208), // SNE V1, V0
            ([0x91, 0x20], 0x206), // SNE V1, V2 only skips on inequality
        ];
        for (ins, pc) in cases {
            let mut program = setup.to_vec();
            program.extend_from_slice(&ins);
            let mut emu = machine(&program);
            exec(&mut emu, 3);
            assert_eq!(emu.pc.0, pc, "{:02x}{:02x}", ins[0], ins[1]);
        }
    }

    #[test]
    fn add_immediate_wraps_and_leaves_flag() {
        // LD VF, 7; LD V3, FF; ADD V3, 2
        let mut emu = machine(&[0x6F, 0x07, 0x63, 0xFF, 0x73, 0x02]);
        exec(&mut emu, 3);
        assert_eq!(emu.regs.get(3), 1);
        assert_eq!(emu.regs.get(FLAG), 7);
    }

    #[test]
    fn logic_ops() {
        // V0 = 0b1100, V1 = 0b1010, VF = 0x55
        let setup = [0x60, 0x0C, 0x61, 0x0A, 0x6F, 0x55];
        for (ins, expected) in [(0x10u8, 0x0A), (0x11, 0x0E), (0x12, 0x08), (0x13, 0x06)] {
            let mut program = setup.to_vec();
            program.extend_from_slice(&[0x80, ins]);
            let mut emu = machine(&program);
            exec(&mut emu, 4);
            assert_eq!(emu.regs.get(0), expected, "80{ins:02x}");
            assert_eq!(emu.regs.get(FLAG), 0x55, "80{ins:02x} touched VF");
        }
    }

    #[test]
    fn shift_right_uses_vy() {
        // LD V2, 5; SHR V1, V2
        let mut emu = machine(&[0x62, 0x05, 0x81, 0x26]);
        exec(&mut emu, 2);
        assert_eq!(emu.regs.get(1), 0x02);
        assert_eq!(emu.regs.get(FLAG), 1);
        assert_eq!(emu.regs.get(2), 0x05);
    }

    #[test]
    fn shift_left_reports_high_bit() {
        // LD V2, 0x81; SHL V1, V2
        let mut emu = machine(&[0x62, 0x81, 0x81, 0x2E]);
        exec(&mut emu, 2);
        assert_eq!(emu.regs.get(1), 0x02);
        assert_eq!(emu.regs.get(FLAG), 1);

        // LD V2, 0x40; SHL V1, V2
        let mut emu = machine(&[0x62, 0x40, 0x81, 0x2E]);
        exec(&mut emu, 2);
        assert_eq!(emu.regs.get(1), 0x80);
        assert_eq!(emu.regs.get(FLAG), 0);
    }

    #[test]
    fn subtract_equal_operands_is_no_borrow() {
        // LD V0, 9; LD V1, 9; SUB V0, V1
        let mut emu = machine(&[0x60, 0x09, 0x61, 0x09, 0x80, 0x15]);
        exec(&mut emu, 3);
        assert_eq!(emu.regs.get(0), 0);
        assert_eq!(emu.regs.get(FLAG), 1);

        // LD V0, 9; LD V1, 9; SUBN V0, V1
        let mut emu = machine(&[0x60, 0x09, 0x61, 0x09, 0x80, 0x17]);
        exec(&mut emu, 3);
        assert_eq!(emu.regs.get(0), 0);
        assert_eq!(emu.regs.get(FLAG), 1);
    }

    #[test]
    fn subtract_backward_borrows() {
        // LD V0, 9; LD V1, 3; SUBN V0, V1
        let mut emu = machine(&[0x60, 0x09, 0x61, 0x03, 0x80, 0x17]);
        exec(&mut emu, 3);
        assert_eq!(emu.regs.get(0), 0xFA);
        assert_eq!(emu.regs.get(FLAG), 0);
    }

    #[test]
    fn flag_wins_when_vf_is_the_target() {
        // LD VF, 0xFF; LD V1, 1; ADD VF, V1
        let mut emu = machine(&[0x6F, 0xFF, 0x61, 0x01, 0x8F, 0x14]);
        exec(&mut emu, 3);
        assert_eq!(emu.regs.get(FLAG), 1);
    }

    #[test]
    fn random_is_masked() {
        // RND V0, 0x0F repeatedly
        let mut emu = machine(&[0xC0, 0x0F, 0x12, 0x00]);
        for _ in 0..50 {
            exec(&mut emu, 2);
            assert_eq!(emu.regs.get(0) & 0xF0, 0);
        }
    }

    #[test]
    fn random_is_reproducible_with_a_seed() {
        let program = [0xC0, 0xFF, 0xC1, 0xFF, 0xC2, 0xFF];
        let mut a = machine(&program);
        let mut b = machine(&program);
        exec(&mut a, 3);
        exec(&mut b, 3);
        assert_eq!(a.regs, b.regs);
    }

    #[test]
    fn draw_hands_sprite_rows_to_display() {
        // LD V0, 3; LD V1, 4; LD I, 0x20A; DRW V0, V1, 2; data at 20A
        let mut emu = machine(&[
            0x60, 0x03, 0x61, 0x04, 0xA2, 0x0A, 0xD0, 0x12, 0x00, 0x00, 0xBA, 0x7C,
        ]);
        exec(&mut emu, 4);
        assert_eq!(emu.display().sprites, vec![(3, 4, vec![0xBA, 0x7C])]);
        assert_eq!(emu.regs.get(FLAG), 0);
    }

    #[test]
    fn draw_reports_collision_in_vf() {
        let mut emu = machine(&[0xA2, 0x00, 0xD0, 0x01]);
        emu.display.collide = true;
        exec(&mut emu, 2);
        assert_eq!(emu.regs.get(FLAG), 1);
    }

    #[test]
    fn draw_past_end_of_memory_is_fatal() {
        let mut emu = machine(&[0xD0, 0x05]);
        emu.index.set_addr((MEMORY_SIZE - 2) as u16);
        assert!(matches!(
            emu.tick(),
            Err(Chip8Error::MemoryOutOfBounds { .. })
        ));
    }

    #[test]
    fn keys_are_drained_every_cycle() {
        // LD V0, 7; SKP V0; ...; SKNP V0
        let mut emu = machine(&[0x60, 0x07, 0xE0, 0x9E, 0x00, 0x00, 0xE0, 0xA1]);
        emu.display.queued.extend([3, 7]);
        exec(&mut emu, 1);
        assert!(emu.display().queued.is_empty());
        exec(&mut emu, 1);
        assert_eq!(emu.pc.0, 0x206);
        // still held on the next check
        exec(&mut emu, 1);
        assert_eq!(emu.pc.0, 0x208);
    }

    #[test]
    fn old_tap_is_released_by_the_time_it_is_checked() {
        // 200: JP 200; 202: SKP V0
        let mut emu = machine(&[0x12, 0x00, 0xE0, 0x9E]);
        emu.regs.set_register(0, 5);
        emu.display.queued.push_back(5);
        exec(&mut emu, 600);
        emu.pc.set_addr(0x202);
        exec(&mut emu, 1);
        assert_eq!(emu.pc.0, 0x204);
    }

    #[test]
    fn held_key_stays_pressed_between_frames() {
        // 200: SKP V0; 202: JP 200; 204: JP 200
        let mut emu = machine(&[0xE0, 0x9E, 0x12, 0x00, 0x12, 0x00]);
        emu.regs.set_register(0, 5);
        emu.display.down = Some(5);
        // about one 60 Hz frame at the default tick
        emu.display.resend_every = 8;
        for cycle in 0..40 {
            emu.pc.set_addr(0x200);
            exec(&mut emu, 1);
            assert_eq!(emu.pc.0, 0x204, "released on cycle {cycle}");
        }

        emu.display.down = None;
        for _ in 0..KEY_HOLD_TICKS {
            emu.pc.set_addr(0x200);
            exec(&mut emu, 1);
        }
        emu.pc.set_addr(0x200);
        exec(&mut emu, 1);
        assert_eq!(emu.pc.0, 0x202);
    }

    #[test]
    fn skip_if_not_pressed_without_keys() {
        let mut emu = machine(&[0xE5, 0xA1]);
        exec(&mut emu, 1);
        assert_eq!(emu.pc.0, 0x204);
    }

    #[test]
    fn get_key_takes_oldest_queued() {
        let mut emu = machine(&[0xF3, 0x0A]);
        emu.display.queued.extend([0xB, 0x2]);
        exec(&mut emu, 1);
        assert_eq!(emu.regs.get(3), 0xB);
    }

    #[test]
    fn get_key_blocks_for_a_key() {
        let mut emu = machine(&[0xF3, 0x0A]);
        emu.display.held = Some(0xC);
        exec(&mut emu, 1);
        assert_eq!(emu.regs.get(3), 0xC);
        assert_eq!(emu.pc.0, 0x202);
    }

    #[test]
    fn get_key_on_shutdown_halts() {
        let mut emu = machine(&[0x63, 0x09, 0xF3, 0x0A, 0x63, 0x01]);
        emu.display.open_for = 10;
        let state = emu.run(&mut Vec::new()).unwrap();
        assert_eq!(state, State::Halted);
        assert_eq!(emu.regs.get(3), 9);
        assert_eq!(emu.pc.0, 0x204);
    }

    #[test]
    fn timers_roundtrip_through_registers() {
        // LD V0, 30; LD DT, V0; LD ST, V0; LD V1, DT
        let mut emu = machine(&[0x60, 0x1E, 0xF0, 0x15, 0xF0, 0x18, 0xF1, 0x07]);
        exec(&mut emu, 4);
        assert_eq!(emu.delay_timer(), 30);
        assert_eq!(emu.sound_timer(), 30);
        assert_eq!(emu.regs.get(1), 30);
    }

    #[test]
    fn run_ticks_both_timers_once_per_cycle() {
        // LD V0, 10; LD DT, V0; LD ST, V0; JP 206
        let mut emu = machine(&[0x60, 0x0A, 0xF0, 0x15, 0xF0, 0x18, 0x12, 0x06]);
        emu.display.open_for = 7;
        assert_eq!(emu.run(&mut Vec::new()).unwrap(), State::Halted);
        // seven cycles, the timers were loaded on cycles two and three
        assert_eq!(emu.delay_timer(), 10 - 6);
        assert_eq!(emu.sound_timer(), 10 - 5);
    }

    #[test]
    fn add_to_index_flags_overflow_past_memory() {
        // LD V4, 9; ADD I, V4
        let mut emu = machine(&[0x64, 0x09, 0xF4, 0x1E]);
        emu.index.set_addr((MEMORY_SIZE - 2) as u16);
        exec(&mut emu, 2);
        assert_eq!(emu.index.0 as usize, MEMORY_SIZE + 7);
        assert_eq!(emu.regs.get(FLAG), 1);

        let mut emu = machine(&[0x64, 0x01, 0xF4, 0x1E]);
        emu.index.set_addr((MEMORY_SIZE - 2) as u16);
        exec(&mut emu, 2);
        assert_eq!(emu.index.0 as usize, MEMORY_SIZE - 1);
        assert_eq!(emu.regs.get(FLAG), 0);
    }

    #[test]
    fn point_char_addresses_font() {
        // LD V0, 0xA; LD F, V0
        let mut emu = machine(&[0x60, 0x0A, 0xF0, 0x29]);
        exec(&mut emu, 2);
        assert_eq!(emu.index.0, 100);
        assert_eq!(
            emu.mem.slice(100, 5).unwrap(),
            &[0xF0, 0x90, 0xF0, 0x90, 0x90]
        );
    }

    #[test]
    fn bcd() {
        // LD V6, 123; LD B, V6
        let mut emu = machine(&[0x66, 123, 0xF6, 0x33]);
        emu.index.set_addr(2);
        exec(&mut emu, 2);
        assert_eq!(emu.mem.slice(2, 3).unwrap(), &[1, 2, 3]);

        let mut emu = machine(&[0x66, 7, 0xF6, 0x33]);
        emu.index.set_addr(0x300);
        exec(&mut emu, 2);
        assert_eq!(emu.mem.slice(0x300, 3).unwrap(), &[0, 0, 7]);
    }

    #[test]
    fn store_then_load_registers() {
        // LD [I], V4; then clear V0-V4 and LD V4, [I]
        let mut emu = machine(&[
            0xA3, 0x00, 0xF4, 0x55, 0x60, 0x00, 0x61, 0x00, 0x62, 0x00, 0x63, 0x00, 0x64, 0x00,
            0xF4, 0x65,
        ]);
        let values = [0x11, 0x22, 0x33, 0x44, 0x55];
        for (reg, val) in values.iter().enumerate() {
            emu.regs.set_register(reg as u8, *val);
        }
        emu.regs.set_register(5, 0x66);
        exec(&mut emu, 2);
        assert_eq!(emu.mem.slice(0x300, 6).unwrap(), &[0x11, 0x22, 0x33, 0x44, 0x55, 0]);
        assert_eq!(emu.index.0, 0x300);
        exec(&mut emu, 5);
        assert_eq!(emu.regs.get(2), 0);
        exec(&mut emu, 1);
        assert_eq!(&emu.regs.as_slice()[..6], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(emu.index.0, 0x300);
    }

    #[test]
    fn unimplemented_opcode_is_distinct() {
        let mut emu = machine(&[0x81, 0x2F]);
        let err = emu.tick().unwrap_err();
        assert!(err.is_not_implemented());
        assert!(matches!(err, Chip8Error::NotImplemented { word: 0x812F }));
    }

    #[test]
    fn run_surfaces_fatal_errors() {
        let mut emu = machine(&[0x60, 0x01, 0xFF, 0xFF]);
        emu.display.open_for = 100;
        let err = emu.run(&mut Vec::new()).unwrap_err();
        assert!(err.is_not_implemented());
        assert_eq!(emu.state(), State::Halted);
        assert_eq!(emu.regs.get(0), 1);
    }

    #[test]
    fn run_without_display_stops_immediately() {
        let mut emu = machine(&[0x60, 0x01]);
        assert_eq!(emu.state(), State::Idle);
        assert_eq!(emu.run(&mut Vec::new()).unwrap(), State::Halted);
        assert_eq!(emu.pc.0, 0x200);
        assert_eq!(emu.regs.get(0), 0);
    }

    #[test]
    fn disassembly_touches_nothing() {
        let program = [0x00, 0xE0, 0xD0, 0x15, 0x60, 0x01, 0x00, 0x00, 0x22, 0x00];
        let config = Config {
            disassemble: true,
            ..Config::default()
        };
        let mut emu = Emulator::new(Recorder::default(), config);
        emu.load_rom(&program).unwrap();
        emu.display.open_for = 100;
        let before = emu.mem.slice(0, MEMORY_SIZE).unwrap().to_vec();

        let mut out = Vec::new();
        assert_eq!(emu.run(&mut out).unwrap(), State::Disassembling);

        let listing = String::from_utf8(out).unwrap();
        assert_eq!(listing.lines().count(), 4);
        assert_eq!(emu.display().clears, 0);
        assert!(emu.display().sprites.is_empty());
        assert_eq!(emu.display().open_for, 100);
        assert_eq!(emu.regs, Registers::new());
        assert_eq!(emu.pc.0, 0x200);
        assert_eq!(emu.index.0, 0);
        assert!(emu.stack.is_empty());
        assert_eq!(emu.mem.slice(0, MEMORY_SIZE).unwrap(), before.as_slice());
    }

    #[test]
    fn debug_overlay_gets_each_instruction() {
        let config = Config {
            debug: true,
            ..Config::default()
        };
        let mut emu = Emulator::new(Recorder::default(), config);
        emu.load_rom(&[0x60, 0x05, 0x00, 0xE0]).unwrap();
        emu.tick().unwrap();
        emu.tick().unwrap();
        assert_eq!(
            emu.display().debug,
            vec!["200\t6005\tLD V0, 0x05", "202\t00e0\tCLS"]
        );
    }

    proptest! {
        #[test]
        fn add_sets_carry(a in any::<u8>(), b in any::<u8>()) {
            let mut emu = machine(&[0x80, 0x14]);
            emu.regs.set_register(0, a);
            emu.regs.set_register(1, b);
            emu.tick().unwrap();
            prop_assert_eq!(emu.regs.get(0), a.wrapping_add(b));
            prop_assert_eq!(emu.regs.get(FLAG), (a as u16 + b as u16 > 255) as u8);
        }

        #[test]
        fn subtract_sets_no_borrow(a in any::<u8>(), b in any::<u8>()) {
            let mut emu = machine(&[0x80, 0x15]);
            emu.regs.set_register(0, a);
            emu.regs.set_register(1, b);
            emu.tick().unwrap();
            prop_assert_eq!(emu.regs.get(0), a.wrapping_sub(b));
            prop_assert_eq!(emu.regs.get(FLAG), (a >= b) as u8);
        }

        #[test]
        fn subtract_backward_sets_no_borrow(a in any::<u8>(), b in any::<u8>()) {
            let mut emu = machine(&[0x80, 0x17]);
            emu.regs.set_register(0, a);
            emu.regs.set_register(1, b);
            emu.tick().unwrap();
            prop_assert_eq!(emu.regs.get(0), b.wrapping_sub(a));
            prop_assert_eq!(emu.regs.get(FLAG), (b >= a) as u8);
        }
    }
}
