use std::fmt;

use crate::error::{Chip8Error, Result};

/// A decoded CHIP-8 instruction.
///
/// `x` and `y` are register indices (0x0..=0xF), `kk` an immediate byte, `n` a
/// 4-bit immediate and `addr` a 12-bit address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0
    Cls,
    /// 00EE
    Ret,
    /// 1NNN
    Jp { addr: u16 },
    /// 2NNN
    Call { addr: u16 },
    /// 3XNN
    SeByte { x: u8, kk: u8 },
    /// 4XNN
    SneByte { x: u8, kk: u8 },
    /// 5XY0
    SeReg { x: u8, y: u8 },
    /// 6XNN
    LdByte { x: u8, kk: u8 },
    /// 7XNN
    AddByte { x: u8, kk: u8 },
    /// 8XY0
    LdReg { x: u8, y: u8 },
    /// 8XY1
    Or { x: u8, y: u8 },
    /// 8XY2
    And { x: u8, y: u8 },
    /// 8XY3
    Xor { x: u8, y: u8 },
    /// 8XY4
    AddReg { x: u8, y: u8 },
    /// 8XY5
    Sub { x: u8, y: u8 },
    /// 8XY6
    Shr { x: u8, y: u8 },
    /// 8XY7
    Subn { x: u8, y: u8 },
    /// 8XYE
    Shl { x: u8, y: u8 },
    /// 9XY0
    SneReg { x: u8, y: u8 },
    /// ANNN
    LdI { addr: u16 },
    /// BNNN
    JpV0 { addr: u16 },
    /// CXNN
    Rnd { x: u8, kk: u8 },
    /// DXYN
    Drw { x: u8, y: u8, n: u8 },
    /// EX9E
    Skp { x: u8 },
    /// EXA1
    Sknp { x: u8 },
    /// FX07
    LdFromDelay { x: u8 },
    /// FX0A
    LdKey { x: u8 },
    /// FX15
    LdDelay { x: u8 },
    /// FX18
    LdSound { x: u8 },
    /// FX1E
    AddI { x: u8 },
    /// FX29
    LdFont { x: u8 },
    /// FX33
    LdBcd { x: u8 },
    /// FX55
    StoreRegs { x: u8 },
    /// FX65
    LoadRegs { x: u8 },
}

impl Instruction {
    /// Decode a 16-bit instruction word.
    ///
    /// The top nibble picks the family; families 0x0, 0x5, 0x8, 0x9, 0xE and
    /// 0xF are narrowed further by their low nibble or low byte. Anything that
    /// falls through is reported as [`Chip8Error::UnknownOpcode`].
    pub fn decode(op: u16) -> Result<Self> {
        let digit1 = ((op & 0xF000) >> 12) as u8;
        let x = ((op & 0x0F00) >> 8) as u8;
        let y = ((op & 0x00F0) >> 4) as u8;
        let n = (op & 0x000F) as u8;
        let kk = (op & 0x00FF) as u8;
        let addr = op & 0x0FFF;

        let instruction = match (digit1, x, y, n) {
            (0x0, 0x0, 0xE, 0x0) => Instruction::Cls,
            (0x0, 0x0, 0xE, 0xE) => Instruction::Ret,
            (0x1, _, _, _) => Instruction::Jp { addr },
            (0x2, _, _, _) => Instruction::Call { addr },
            (0x3, _, _, _) => Instruction::SeByte { x, kk },
            (0x4, _, _, _) => Instruction::SneByte { x, kk },
            (0x5, _, _, 0x0) => Instruction::SeReg { x, y },
            (0x6, _, _, _) => Instruction::LdByte { x, kk },
            (0x7, _, _, _) => Instruction::AddByte { x, kk },
            (0x8, _, _, 0x0) => Instruction::LdReg { x, y },
            (0x8, _, _, 0x1) => Instruction::Or { x, y },
            (0x8, _, _, 0x2) => Instruction::And { x, y },
            (0x8, _, _, 0x3) => Instruction::Xor { x, y },
            (0x8, _, _, 0x4) => Instruction::AddReg { x, y },
            (0x8, _, _, 0x5) => Instruction::Sub { x, y },
            (0x8, _, _, 0x6) => Instruction::Shr { x, y },
            (0x8, _, _, 0x7) => Instruction::Subn { x, y },
            (0x8, _, _, 0xE) => Instruction::Shl { x, y },
            (0x9, _, _, 0x0) => Instruction::SneReg { x, y },
            (0xA, _, _, _) => Instruction::LdI { addr },
            (0xB, _, _, _) => Instruction::JpV0 { addr },
            (0xC, _, _, _) => Instruction::Rnd { x, kk },
            (0xD, _, _, _) => Instruction::Drw { x, y, n },
            (0xE, _, 0x9, 0xE) => Instruction::Skp { x },
            (0xE, _, 0xA, 0x1) => Instruction::Sknp { x },
            (0xF, _, 0x0, 0x7) => Instruction::LdFromDelay { x },
            (0xF, _, 0x0, 0xA) => Instruction::LdKey { x },
            (0xF, _, 0x1, 0x5) => Instruction::LdDelay { x },
            (0xF, _, 0x1, 0x8) => Instruction::LdSound { x },
            (0xF, _, 0x1, 0xE) => Instruction::AddI { x },
            (0xF, _, 0x2, 0x9) => Instruction::LdFont { x },
            (0xF, _, 0x3, 0x3) => Instruction::LdBcd { x },
            (0xF, _, 0x5, 0x5) => Instruction::StoreRegs { x },
            (0xF, _, 0x6, 0x5) => Instruction::LoadRegs { x },
            // 0NNN (SYS) and the unassigned 5/8/9/E/F encodings
            _ => return Err(Chip8Error::UnknownOpcode { opcode: op }),
        };
        Ok(instruction)
    }

    /// Whether this instruction sets PC itself instead of falling through to
    /// the next instruction.
    pub fn is_control_transfer(&self) -> bool {
        matches!(
            self,
            Instruction::Ret
                | Instruction::Jp { .. }
                | Instruction::Call { .. }
                | Instruction::JpV0 { .. }
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Cls => write!(f, "CLS"),
            Instruction::Ret => write!(f, "RET"),
            Instruction::Jp { addr } => write!(f, "JP {:#05X}", addr),
            Instruction::Call { addr } => write!(f, "CALL {:#05X}", addr),
            Instruction::SeByte { x, kk } => write!(f, "SE V{:X}, {:#04X}", x, kk),
            Instruction::SneByte { x, kk } => write!(f, "SNE V{:X}, {:#04X}", x, kk),
            Instruction::SeReg { x, y } => write!(f, "SE V{:X}, V{:X}", x, y),
            Instruction::LdByte { x, kk } => write!(f, "LD V{:X}, {:#04X}", x, kk),
            Instruction::AddByte { x, kk } => write!(f, "ADD V{:X}, {:#04X}", x, kk),
            Instruction::LdReg { x, y } => write!(f, "LD V{:X}, V{:X}", x, y),
            Instruction::Or { x, y } => write!(f, "OR V{:X}, V{:X}", x, y),
            Instruction::And { x, y } => write!(f, "AND V{:X}, V{:X}", x, y),
            Instruction::Xor { x, y } => write!(f, "XOR V{:X}, V{:X}", x, y),
            Instruction::AddReg { x, y } => write!(f, "ADD V{:X}, V{:X}", x, y),
            Instruction::Sub { x, y } => write!(f, "SUB V{:X}, V{:X}", x, y),
            Instruction::Shr { x, .. } => write!(f, "SHR V{:X}", x),
            Instruction::Subn { x, y } => write!(f, "SUBN V{:X}, V{:X}", x, y),
            Instruction::Shl { x, .. } => write!(f, "SHL V{:X}", x),
            Instruction::SneReg { x, y } => write!(f, "SNE V{:X}, V{:X}", x, y),
            Instruction::LdI { addr } => write!(f, "LD I, {:#05X}", addr),
            Instruction::JpV0 { addr } => write!(f, "JP V0, {:#05X}", addr),
            Instruction::Rnd { x, kk } => write!(f, "RND V{:X}, {:#04X}", x, kk),
            Instruction::Drw { x, y, n } => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            Instruction::Skp { x } => write!(f, "SKP V{:X}", x),
            Instruction::Sknp { x } => write!(f, "SKNP V{:X}", x),
            Instruction::LdFromDelay { x } => write!(f, "LD V{:X}, DT", x),
            Instruction::LdKey { x } => write!(f, "LD V{:X}, K", x),
            Instruction::LdDelay { x } => write!(f, "LD DT, V{:X}", x),
            Instruction::LdSound { x } => write!(f, "LD ST, V{:X}", x),
            Instruction::AddI { x } => write!(f, "ADD I, V{:X}", x),
            Instruction::LdFont { x } => write!(f, "LD F, V{:X}", x),
            Instruction::LdBcd { x } => write!(f, "LD B, V{:X}", x),
            Instruction::StoreRegs { x } => write!(f, "LD [I], V{:X}", x),
            Instruction::LoadRegs { x } => write!(f, "LD V{:X}, [I]", x),
        }
    }
}

/// Walk a program image two bytes at a time, decoding each word as if it
/// were loaded at `base`.
///
/// Data embedded in a program decodes as garbage or as an error, so the
/// result is only a best-effort listing. A trailing odd byte is treated as
/// the high byte of a word whose low byte is zero.
pub fn disassemble(
    rom: &[u8],
    base: u16,
) -> impl Iterator<Item = (u16, u16, Result<Instruction>)> + '_ {
    rom.chunks(2).enumerate().map(move |(i, chunk)| {
        let hi = chunk[0] as u16;
        let lo = chunk.get(1).copied().unwrap_or(0) as u16;
        let word = hi << 8 | lo;
        let address = base.wrapping_add((i * 2) as u16);
        (address, word, Instruction::decode(word))
    })
}
