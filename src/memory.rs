use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{Chip8Error, Result};

pub type TypeAddr = u16; // in reality u12
type FontBytes = [u8; 5 * 16];

/// 4K of RAM plus the two spare bytes the address space has always carried,
/// so a word fetch at 0xFFF never runs off the end.
pub const MEMORY_SIZE: usize = 4098;
pub const PROGRAM_START: TypeAddr = 0x200;

const DEFAULT_FONT: FontBytes = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Hex digit glyphs, 5 bytes each. Glyph `d` lives at `d * stride`.
#[derive(Debug, Clone)]
pub struct Font {
    data: FontBytes,
    stride: u16,
}

impl Font {
    pub const GLYPH_LEN: usize = 5;

    pub fn glyph(&self, digit: u8) -> &[u8] {
        let start = (digit as usize & 0xF) * Self::GLYPH_LEN;
        &self.data[start..start + Self::GLYPH_LEN]
    }

    pub fn address(&self, digit: u8) -> TypeAddr {
        digit as TypeAddr * self.stride
    }
}

impl Default for Font {
    fn default() -> Self {
        Self {
            data: DEFAULT_FONT,
            stride: 10,
        }
    }
}

pub struct Memory {
    // font glyphs at 000 -> 09F (every 10 bytes), program from 200
    bytes: Vec<u8>,
    program_len: usize,
}

impl Memory {
    pub fn new(font: &Font) -> Self {
        let mut bytes = vec![0; MEMORY_SIZE];
        for digit in 0..16u8 {
            let start = font.address(digit) as usize;
            bytes[start..start + Font::GLYPH_LEN].copy_from_slice(font.glyph(digit));
        }

        Self {
            bytes,
            program_len: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// `len` bytes starting at `addr`, all of which must be in range.
    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8]> {
        let end = addr.checked_add(len).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => Ok(&self.bytes[addr..end]),
            None => Err(Chip8Error::MemoryOutOfBounds {
                address: addr.saturating_add(len).saturating_sub(1),
            }),
        }
    }

    pub fn slice_mut(&mut self, addr: usize, len: usize) -> Result<&mut [u8]> {
        let size = self.bytes.len();
        match addr.checked_add(len).filter(|end| *end <= size) {
            Some(end) => Ok(&mut self.bytes[addr..end]),
            None => Err(Chip8Error::MemoryOutOfBounds {
                address: addr.saturating_add(len).saturating_sub(1),
            }),
        }
    }

    /// Big-endian instruction word at `addr`.
    pub fn read16(&self, addr: TypeAddr) -> Result<u16> {
        let word = self.slice(addr as usize, 2)?;
        Ok(((word[0] as u16) << 8) | word[1] as u16)
    }

    // loads program instructions starting at address 0x200
    pub fn load(&mut self, rom: &[u8]) -> Result<()> {
        let start = PROGRAM_START as usize;
        let max_size = self.bytes.len() - start;
        if rom.len() > max_size {
            return Err(Chip8Error::RomTooLarge {
                size: rom.len(),
                max_size,
            });
        }

        self.bytes[start..start + rom.len()].copy_from_slice(rom);
        self.program_len = rom.len();
        debug!("loaded {} byte program at {:#05x}", rom.len(), start);
        Ok(())
    }

    /// The bytes of the loaded program, as placed by `load`.
    pub fn program(&self) -> &[u8] {
        let start = PROGRAM_START as usize;
        &self.bytes[start..start + self.program_len]
    }
}

pub fn read_rom(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| Chip8Error::RomRead {
        path: path.to_path_buf(),
        source,
    })
}
