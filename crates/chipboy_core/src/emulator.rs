mod execute;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{Chip8Error, Result};
use crate::instruction::Instruction;
use crate::state::{Framebuffer, MachineState};
use crate::{MAX_ROM_SIZE, NUM_KEYS, START_ADDRESS};

/// What a successful cycle did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The instruction ran and PC moved on (or was transferred).
    Executed(Instruction),
    /// `FX0A` found no key held. PC still points at it, so the next cycle
    /// polls the keypad again.
    AwaitingKey { register: u8 },
}

/// One emulated machine: the state record plus the fetch/decode/execute loop
/// that mutates it.
///
/// The host drives it by calling [`Emulator::step`] once per cycle, or
/// [`Emulator::step_cpu`] and [`Emulator::tick_timers`] at independent rates.
/// Nothing here blocks or spawns work; independent machines are independent
/// values.
pub struct Emulator {
    state: MachineState,
    /// Source for `CXNN`
    rng: StdRng,
    /// Register waiting on `FX0A`, if the last cycle stalled there
    awaiting_key: Option<u8>,
    /// Whether the sound timer was armed on the last timer tick
    beeping: bool,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Build a machine whose `CXNN` sequence is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: MachineState::default(),
            rng,
            awaiting_key: None,
            beeping: false,
        }
    }

    /// Return to the power-on condition: PC at 0x200, everything else zeroed
    /// and the font reloaded. The loaded program is discarded.
    pub fn reset(&mut self) {
        self.state.reset();
        self.awaiting_key = None;
        self.beeping = false;
        log::debug!("machine reset");
    }

    /// Copy a program image to 0x200.
    ///
    /// Images that do not fit below 0x1000 are rejected and memory is left
    /// untouched.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(Chip8Error::ProgramTooLarge {
                size: rom.len(),
                max_size: MAX_ROM_SIZE,
            });
        }
        let start = START_ADDRESS as usize;
        let end = start + rom.len();
        self.state.ram[start..end].copy_from_slice(rom);
        log::debug!("loaded {} byte program at {:#06X}", rom.len(), start);
        Ok(())
    }

    /// One fetch/decode/execute cycle followed by one timer tick.
    ///
    /// On error nothing is modified (not even the timers) and PC still points
    /// at the offending instruction.
    pub fn step(&mut self) -> Result<StepOutcome> {
        let outcome = self.step_cpu()?;
        self.tick_timers();
        Ok(outcome)
    }

    /// One fetch/decode/execute cycle without touching the timers.
    pub fn step_cpu(&mut self) -> Result<StepOutcome> {
        let pc = self.state.pc;
        let result = self.state.fetch().and_then(|opcode| {
            self.state.opcode = opcode;
            let instruction = Instruction::decode(opcode)?;
            log::trace!("{:04X}: {:04X}  {}", pc, opcode, instruction);
            self.execute(instruction)
        });

        match result {
            Ok(StepOutcome::AwaitingKey { register }) => {
                if self.awaiting_key.is_none() {
                    log::debug!("{:04X}: waiting for a key press into V{:X}", pc, register);
                }
                self.awaiting_key = Some(register);
            }
            Ok(StepOutcome::Executed(_)) => self.awaiting_key = None,
            Err(err) => log::warn!("{:04X}: {}; state: {:?}", pc, err, self.state),
        }
        result
    }

    /// Decrement both timers toward zero.
    ///
    /// Returns whether the sound timer was non-zero before the decrement,
    /// which is when the host should be producing a tone.
    pub fn tick_timers(&mut self) -> bool {
        if self.state.delay_timer > 0 {
            self.state.delay_timer -= 1;
        }
        self.beeping = self.state.sound_timer > 0;
        if self.beeping {
            self.state.sound_timer -= 1;
        }
        self.beeping
    }

    /// Decode the instruction at PC without running it.
    pub fn peek_instruction(&self) -> Result<Instruction> {
        Instruction::decode(self.state.fetch()?)
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn get_display(&self) -> &Framebuffer {
        self.state.display()
    }

    pub fn draw_pending(&self) -> bool {
        self.state.draw_pending
    }

    /// Acknowledge that the current frame has been rendered.
    pub fn clear_draw_pending(&mut self) {
        self.state.draw_pending = false;
    }

    /// Whether the sound timer was armed on the most recent timer tick.
    pub fn is_beeping(&self) -> bool {
        self.beeping
    }

    pub fn is_awaiting_key(&self) -> bool {
        self.awaiting_key.is_some()
    }

    /// Press or release keypad key `idx` (0x0..=0xF). Other indices are
    /// ignored.
    pub fn set_key(&mut self, idx: usize, pressed: bool) {
        if idx >= NUM_KEYS {
            log::warn!("ignoring invalid key index: {}", idx);
            return;
        }
        self.state.keys[idx] = pressed;
    }

    /// Release every key.
    pub fn clear_keys(&mut self) {
        self.state.keys = [false; NUM_KEYS];
    }
}

#[cfg(test)]
mod tests;
