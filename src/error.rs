use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug, Error)]
pub enum Chip8Error {
    #[error("provide path to program")]
    MissingProgramPath,

    #[error("failed load rom at path {path:?}: {source}")]
    RomRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    /// Decoded fine as a word but is not part of the CHIP-8 instruction set.
    #[error("opcode {word:#06x} (class {:#x}) not implemented", .word >> 12)]
    NotImplemented { word: u16 },

    #[error("stack overflow: call to {addr:#05x} exceeds 16 nested subroutines")]
    StackOverflow { addr: u16 },

    #[error("stack underflow: return with empty call stack")]
    StackUnderflow,

    #[error("memory access out of bounds at address {address:#06x}")]
    MemoryOutOfBounds { address: usize },

    #[error("display disconnected")]
    DisplayDisconnected,

    #[error("window error: {0}")]
    Window(#[from] minifb::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Chip8Error {
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Chip8Error::NotImplemented { .. })
    }
}
