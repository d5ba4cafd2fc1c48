use std::fmt;
use std::ops::Range;

use crate::error::{Chip8Error, Result};
use crate::{
    ADDRESS_MASK, FONTSET, FONTSET_SIZE, NUM_KEYS, NUM_REGS, RAM_SIZE, SCREEN_HEIGHT,
    SCREEN_WIDTH, STACK_SIZE, START_ADDRESS,
};

/// Row-major 64x32 monochrome grid; `true` is a lit pixel.
pub type Framebuffer = [bool; SCREEN_WIDTH * SCREEN_HEIGHT];

/// The complete register file, memory, stack, timers, keypad and screen of one
/// machine.
///
/// Only the engine mutates this record (the keypad aside, which the host
/// writes through [`crate::Emulator::set_key`]). Hosts get a shared reference
/// for rendering and diagnostics.
#[derive(Clone, PartialEq, Eq)]
pub struct MachineState {
    /// program counter
    pub(crate) pc: u16,
    pub(crate) ram: [u8; RAM_SIZE],
    /// display
    pub(crate) screen: Framebuffer,
    /// V Registers, VF doubles as the carry/borrow/collision flag
    pub(crate) v_reg: [u8; NUM_REGS],
    /// I Register
    pub(crate) i_reg: u16,
    /// Number of live entries in `stack`
    pub(crate) stack_pointer: u16,
    pub(crate) stack: [u16; STACK_SIZE],
    pub(crate) keys: [bool; NUM_KEYS],
    pub(crate) delay_timer: u8,
    pub(crate) sound_timer: u8,
    /// Set by CLS/DRW, cleared by the host once it has rendered the frame
    pub(crate) draw_pending: bool,
    /// Last instruction word fetched
    pub(crate) opcode: u16,
}

impl Default for MachineState {
    fn default() -> Self {
        let mut state = Self {
            pc: START_ADDRESS,
            ram: [0; RAM_SIZE],
            screen: [false; SCREEN_WIDTH * SCREEN_HEIGHT],
            v_reg: [0; NUM_REGS],
            i_reg: 0,
            stack_pointer: 0,
            stack: [0; STACK_SIZE],
            keys: [false; NUM_KEYS],
            delay_timer: 0,
            sound_timer: 0,
            draw_pending: false,
            opcode: 0,
        };
        state.ram[..FONTSET_SIZE].copy_from_slice(&FONTSET);
        state
    }
}

impl MachineState {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn push(&mut self, addr: u16) -> Result<()> {
        let sp = self.stack_pointer as usize;
        if sp >= STACK_SIZE {
            return Err(Chip8Error::StackOverflow { pc: self.pc });
        }
        self.stack[sp] = addr;
        self.stack_pointer += 1;
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<u16> {
        if self.stack_pointer == 0 {
            return Err(Chip8Error::StackUnderflow { pc: self.pc });
        }
        self.stack_pointer -= 1;
        Ok(self.stack[self.stack_pointer as usize])
    }

    pub(crate) fn set_pc(&mut self, addr: u16) {
        self.pc = addr & ADDRESS_MASK;
    }

    pub(crate) fn advance_pc(&mut self, bytes: u16) {
        self.set_pc(self.pc.wrapping_add(bytes));
    }

    pub(crate) fn set_i(&mut self, addr: u16) {
        self.i_reg = addr & ADDRESS_MASK;
    }

    /// Validate that `len` bytes starting at `start` lie inside RAM.
    pub(crate) fn ram_range(&self, start: usize, len: usize) -> Result<Range<usize>> {
        let end = start + len;
        if end > RAM_SIZE {
            return Err(Chip8Error::OutOfBounds {
                address: start.max(RAM_SIZE),
            });
        }
        Ok(start..end)
    }

    /// Read the big-endian instruction word at PC.
    pub(crate) fn fetch(&self) -> Result<u16> {
        let range = self.ram_range(self.pc as usize, 2)?;
        let bytes = &self.ram[range];
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn i(&self) -> u16 {
        self.i_reg
    }

    /// Value of register `Vx`. Only the low nibble of `x` is used.
    pub fn v(&self, x: u8) -> u8 {
        self.v_reg[(x & 0x0F) as usize]
    }

    pub fn registers(&self) -> &[u8; NUM_REGS] {
        &self.v_reg
    }

    /// Live return addresses, oldest first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.stack_pointer as usize]
    }

    pub fn stack_pointer(&self) -> u16 {
        self.stack_pointer
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn memory(&self) -> &[u8; RAM_SIZE] {
        &self.ram
    }

    pub fn display(&self) -> &Framebuffer {
        &self.screen
    }

    /// Whether the pixel at (`x`, `y`) is lit. Coordinates wrap like DRW does.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.screen[(y % SCREEN_HEIGHT) * SCREEN_WIDTH + (x % SCREEN_WIDTH)]
    }

    pub fn draw_pending(&self) -> bool {
        self.draw_pending
    }

    pub fn keys(&self) -> &[bool; NUM_KEYS] {
        &self.keys
    }

    pub fn is_key_pressed(&self, key: usize) -> bool {
        key < NUM_KEYS && self.keys[key]
    }

    /// The instruction word most recently fetched, whether or not it decoded.
    pub fn current_opcode(&self) -> u16 {
        self.opcode
    }
}

impl fmt::Debug for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineState")
            .field("pc", &format_args!("{:#06X}", self.pc))
            .field("i", &format_args!("{:#06X}", self.i_reg))
            .field("opcode", &format_args!("{:#06X}", self.opcode))
            .field("v", &format_args!("{:02X?}", self.v_reg))
            .field("stack", &format_args!("{:04X?}", self.stack()))
            .field("delay_timer", &self.delay_timer)
            .field("sound_timer", &self.sound_timer)
            .field("draw_pending", &self.draw_pending)
            .finish()
    }
}
