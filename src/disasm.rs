use std::io::{self, Write};

use crate::decode::OpCodes;
use crate::memory::{TypeAddr, PROGRAM_START};

/// One listing line: `<offset>\t<word>\t<mnemonic>`.
pub fn line(addr: TypeAddr, word: u16) -> String {
    format!("{:03x}\t{:04x}\t{}", addr, word, OpCodes::decode_raw(word))
}

/// Linear decode of a program loaded at 0x200. Zero words are skipped and a
/// trailing odd byte is ignored.
pub fn disassemble(program: &[u8]) -> impl Iterator<Item = String> + '_ {
    program
        .chunks_exact(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let word = ((pair[0] as u16) << 8) | pair[1] as u16;
            (word != 0).then(|| line(PROGRAM_START + 2 * i as TypeAddr, word))
        })
}

pub fn write_listing(out: &mut impl Write, program: &[u8]) -> io::Result<()> {
    for l in disassemble(program) {
        writeln!(out, "{l}")?;
    }
    Ok(())
}
