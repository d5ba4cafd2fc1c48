use rand::Rng;

use super::{Emulator, StepOutcome};
use crate::error::Result;
use crate::instruction::Instruction;
use crate::{ADDRESS_MASK, FONT_GLYPH_SIZE, SCREEN_HEIGHT, SCREEN_WIDTH};

/// How PC moves once an instruction's effect has been applied.
enum Flow {
    /// Fall through to the next instruction.
    Next,
    /// Skip the next instruction when the condition holds.
    SkipIf(bool),
    /// PC was already set by the instruction.
    Transfer,
    /// Re-run this instruction next cycle (FX0A with no key held for `Vx`).
    Stall(u8),
}

impl Emulator {
    /// Apply one decoded instruction to the machine.
    ///
    /// Every fallible check runs before the first write, so an `Err` leaves
    /// the state untouched.
    pub(super) fn execute(&mut self, instruction: Instruction) -> Result<StepOutcome> {
        let flow = match instruction {
            Instruction::Cls => {
                self.state.screen.fill(false);
                self.state.draw_pending = true;
                Flow::Next
            }
            Instruction::Ret => {
                let addr = self.state.pop()?;
                self.state.set_pc(addr);
                Flow::Transfer
            }
            Instruction::Jp { addr } => {
                self.state.set_pc(addr);
                Flow::Transfer
            }
            Instruction::Call { addr } => {
                let return_addr = self.state.pc.wrapping_add(2) & ADDRESS_MASK;
                self.state.push(return_addr)?;
                self.state.set_pc(addr);
                Flow::Transfer
            }
            Instruction::SeByte { x, kk } => Flow::SkipIf(self.vx(x) == kk),
            Instruction::SneByte { x, kk } => Flow::SkipIf(self.vx(x) != kk),
            Instruction::SeReg { x, y } => Flow::SkipIf(self.vx(x) == self.vx(y)),
            Instruction::LdByte { x, kk } => {
                self.set_vx(x, kk);
                Flow::Next
            }
            Instruction::AddByte { x, kk } => {
                // no carry flag for the immediate form
                self.set_vx(x, self.vx(x).wrapping_add(kk));
                Flow::Next
            }
            Instruction::LdReg { x, y } => {
                self.set_vx(x, self.vx(y));
                Flow::Next
            }
            Instruction::Or { x, y } => {
                self.set_vx(x, self.vx(x) | self.vx(y));
                Flow::Next
            }
            Instruction::And { x, y } => {
                self.set_vx(x, self.vx(x) & self.vx(y));
                Flow::Next
            }
            Instruction::Xor { x, y } => {
                self.set_vx(x, self.vx(x) ^ self.vx(y));
                Flow::Next
            }
            Instruction::AddReg { x, y } => {
                let sum = self.vx(x) as u16 + self.vx(y) as u16;
                self.set_vx(x, sum as u8);
                self.set_flag(sum > 0xFF);
                Flow::Next
            }
            Instruction::Sub { x, y } => {
                let (vx, vy) = (self.vx(x), self.vx(y));
                self.set_vx(x, vx.wrapping_sub(vy));
                self.set_flag(vy <= vx);
                Flow::Next
            }
            Instruction::Shr { x, .. } => {
                let vx = self.vx(x);
                self.set_vx(x, vx >> 1);
                self.set_flag(vx & 0x01 != 0);
                Flow::Next
            }
            Instruction::Subn { x, y } => {
                let (vx, vy) = (self.vx(x), self.vx(y));
                self.set_vx(x, vy.wrapping_sub(vx));
                self.set_flag(vx <= vy);
                Flow::Next
            }
            Instruction::Shl { x, .. } => {
                let vx = self.vx(x);
                self.set_vx(x, vx << 1);
                self.set_flag(vx & 0x80 != 0);
                Flow::Next
            }
            Instruction::SneReg { x, y } => Flow::SkipIf(self.vx(x) != self.vx(y)),
            Instruction::LdI { addr } => {
                self.state.set_i(addr);
                Flow::Next
            }
            Instruction::JpV0 { addr } => {
                self.state.set_pc(addr + self.vx(0) as u16);
                Flow::Transfer
            }
            Instruction::Rnd { x, kk } => {
                let byte: u8 = self.rng.gen();
                self.set_vx(x, byte & kk);
                Flow::Next
            }
            Instruction::Drw { x, y, n } => {
                self.draw_sprite(self.vx(x) as usize, self.vx(y) as usize, n as usize)?;
                Flow::Next
            }
            Instruction::Skp { x } => {
                Flow::SkipIf(self.state.is_key_pressed(self.vx(x) as usize))
            }
            Instruction::Sknp { x } => {
                Flow::SkipIf(!self.state.is_key_pressed(self.vx(x) as usize))
            }
            Instruction::LdFromDelay { x } => {
                self.set_vx(x, self.state.delay_timer);
                Flow::Next
            }
            Instruction::LdKey { x } => {
                // lowest-numbered key wins when several are held
                match self.state.keys.iter().position(|pressed| *pressed) {
                    Some(key) => {
                        self.set_vx(x, key as u8);
                        Flow::Next
                    }
                    None => Flow::Stall(x),
                }
            }
            Instruction::LdDelay { x } => {
                self.state.delay_timer = self.vx(x);
                Flow::Next
            }
            Instruction::LdSound { x } => {
                self.state.sound_timer = self.vx(x);
                Flow::Next
            }
            Instruction::AddI { x } => {
                let sum = self.state.i_reg + self.vx(x) as u16;
                self.state.set_i(sum);
                self.set_flag(sum > ADDRESS_MASK);
                Flow::Next
            }
            Instruction::LdFont { x } => {
                self.state.set_i(self.vx(x) as u16 * FONT_GLYPH_SIZE as u16);
                Flow::Next
            }
            Instruction::LdBcd { x } => {
                let range = self.state.ram_range(self.state.i_reg as usize, 3)?;
                let val = self.vx(x);
                self.state.ram[range].copy_from_slice(&[val / 100, (val / 10) % 10, val % 10]);
                Flow::Next
            }
            Instruction::StoreRegs { x } => {
                let count = x as usize + 1;
                let range = self.state.ram_range(self.state.i_reg as usize, count)?;
                self.state.ram[range].copy_from_slice(&self.state.v_reg[..count]);
                self.state.set_i(self.state.i_reg + count as u16);
                Flow::Next
            }
            Instruction::LoadRegs { x } => {
                let count = x as usize + 1;
                let range = self.state.ram_range(self.state.i_reg as usize, count)?;
                self.state.v_reg[..count].copy_from_slice(&self.state.ram[range]);
                self.state.set_i(self.state.i_reg + count as u16);
                Flow::Next
            }
        };

        match flow {
            Flow::Next => self.state.advance_pc(2),
            Flow::SkipIf(true) => self.state.advance_pc(4),
            Flow::SkipIf(false) => self.state.advance_pc(2),
            Flow::Transfer => {}
            Flow::Stall(register) => return Ok(StepOutcome::AwaitingKey { register }),
        }
        Ok(StepOutcome::Executed(instruction))
    }

    /// XOR an 8-pixel-wide, `height`-row sprite from `memory[I..]` onto the
    /// screen at (`x`, `y`), wrapping on both axes. VF reports whether any lit
    /// pixel was turned off.
    fn draw_sprite(&mut self, x: usize, y: usize, height: usize) -> Result<()> {
        let range = self.state.ram_range(self.state.i_reg as usize, height)?;
        let mut collision = false;
        for (row, &pixels) in self.state.ram[range].iter().enumerate() {
            for col in 0..8 {
                if (pixels >> (7 - col)) & 0x1 == 0 {
                    continue;
                }
                let px = (x + col) % SCREEN_WIDTH;
                let py = (y + row) % SCREEN_HEIGHT;
                let screen_pixel = &mut self.state.screen[px + py * SCREEN_WIDTH];
                collision |= *screen_pixel;
                *screen_pixel ^= true;
            }
        }
        self.set_flag(collision);
        self.state.draw_pending = true;
        Ok(())
    }

    #[inline]
    fn vx(&self, x: u8) -> u8 {
        self.state.v_reg[x as usize]
    }

    #[inline]
    fn set_vx(&mut self, x: u8, val: u8) {
        self.state.v_reg[x as usize] = val;
    }

    /// VF is written after the result register, so for `x == 0xF` the flag
    /// is what remains.
    #[inline]
    fn set_flag(&mut self, set: bool) {
        self.state.v_reg[0xF] = set as u8;
    }
}
