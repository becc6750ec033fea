use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::{Config, DEFAULT_TICK_US};
use crate::error::{Chip8Error, Result};
use crate::keyboard::Keymap;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// 0-9 and a-f
    Literal,
    /// 1234 / qwer / asdf / zxcv
    Qwerty,
}

#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version, about = "CHIP-8 virtual machine", long_about = None)]
pub struct Args {
    /// Run disassembler for given program
    #[arg(short, long)]
    pub disassemble: bool,

    /// Microseconds between instructions
    #[arg(long, default_value_t = DEFAULT_TICK_US)]
    pub tick_us: u64,

    /// Show each executed instruction in the window title
    #[arg(long)]
    pub debug: bool,

    /// Seed for the random number instruction
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = Layout::Literal)]
    pub keymap: Layout,

    /// Path to the program to run
    pub path: Option<PathBuf>,
}

impl Args {
    pub fn program_path(&self) -> Result<&Path> {
        self.path.as_deref().ok_or(Chip8Error::MissingProgramPath)
    }

    /// Whether a window should be created at all.
    pub fn is_display(&self) -> bool {
        !self.disassemble
    }

    pub fn keymap(&self) -> Keymap {
        match self.keymap {
            Layout::Literal => Keymap::LITERAL,
            Layout::Qwerty => Keymap::QWERTY,
        }
    }

    pub fn config(&self) -> Config {
        Config {
            tick: Duration::from_micros(self.tick_us),
            disassemble: self.disassemble,
            debug: self.debug,
            seed: self.seed,
            ..Config::default()
        }
    }
}
