// 16 8-bit data registers named V0 to VF
// I -> address register (12 bits)
//
// Stack of up to 16 return addresses
//
// Delay timer & Sound timer: count down once per cycle until 0
//
// Display res: 64 width, 32 height
//
// 35 opcodes, each are 2 bytes (big-endian)
//      NNN: address
//      NN: 8-bit constant
//      N: 4-bit constant
//      X and Y: 4-bit register identifier

pub mod cli;
pub mod config;
pub mod decode;
pub mod disasm;
pub mod display;
pub mod emulator;
pub mod error;
pub mod keyboard;
pub mod memory;
pub mod registers;
pub mod timer;
pub mod window;

pub use config::Config;
pub use display::{Display, Headless};
pub use emulator::{Emulator, State};
pub use error::{Chip8Error, Result};
