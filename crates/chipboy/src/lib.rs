use anyhow::{bail, Context, Result};
use typed_builder::TypedBuilder;

use chipboy_core::{
    disassemble, Emulator, Framebuffer, Instruction, StepOutcome, NUM_KEYS, SCREEN_HEIGHT,
    SCREEN_WIDTH, START_ADDRESS,
};

/// How a headless run is driven.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RunConfig {
    /// Upper bound on CPU cycles executed.
    #[builder(default = 2_000)]
    pub cycles: u64,
    /// CPU cycles between timer ticks. The default pairs a ~600 Hz CPU with
    /// 60 Hz timers.
    #[builder(default = 10)]
    pub cycles_per_timer_tick: u32,
    /// Keypad indices held down for the whole run.
    #[builder(default)]
    pub held_keys: Vec<u8>,
    /// Seed for `CXNN`; entropy when unset.
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
    /// Stop early once the program jumps to itself, the usual way CHIP-8
    /// programs end.
    #[builder(default = true)]
    pub stop_on_halt: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    CycleLimit,
    /// `JP` to its own address at `pc`.
    Halted { pc: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub cycles: u64,
    /// Frames the engine flagged as needing a redraw.
    pub frames: u64,
    /// Timer ticks during which the sound timer was armed.
    pub beep_ticks: u64,
    /// Cycles spent stalled on `FX0A`.
    pub key_waits: u64,
    pub stop: StopReason,
}

/// Create a machine and load `rom` into it.
pub fn boot(rom: &[u8], config: &RunConfig) -> Result<Emulator> {
    let mut emulator = match config.seed {
        Some(seed) => Emulator::with_seed(seed),
        None => Emulator::new(),
    };
    emulator.load_rom(rom).context("failed to load ROM")?;
    log::info!("Loaded {} byte ROM", rom.len());

    for &key in &config.held_keys {
        if key as usize >= NUM_KEYS {
            bail!("invalid key index {:#X}, keys are 0x0..=0xF", key);
        }
        emulator.set_key(key as usize, true);
    }
    Ok(emulator)
}

/// Drive `emulator` until the cycle budget runs out or the program halts.
///
/// Timers tick every `cycles_per_timer_tick` cycles instead of every cycle;
/// frames are acknowledged as soon as the engine flags them.
pub fn run(emulator: &mut Emulator, config: &RunConfig) -> Result<RunReport> {
    let timer_period = config.cycles_per_timer_tick.max(1) as u64;
    let mut report = RunReport {
        cycles: 0,
        frames: 0,
        beep_ticks: 0,
        key_waits: 0,
        stop: StopReason::CycleLimit,
    };
    let mut was_beeping = false;

    while report.cycles < config.cycles {
        let pc = emulator.state().pc();
        if config.stop_on_halt {
            if let Ok(Instruction::Jp { addr }) = emulator.peek_instruction() {
                if addr == pc {
                    log::info!("Program halted at {:#06X}", pc);
                    report.stop = StopReason::Halted { pc };
                    break;
                }
            }
        }

        let outcome = emulator.step_cpu().with_context(|| {
            format!(
                "emulation stopped after {} cycles at PC {:#06X} (opcode {:#06X})",
                report.cycles,
                pc,
                emulator.state().current_opcode()
            )
        })?;
        if let StepOutcome::AwaitingKey { .. } = outcome {
            report.key_waits += 1;
        }
        report.cycles += 1;

        if report.cycles % timer_period == 0 {
            let beeping = emulator.tick_timers();
            if beeping {
                report.beep_ticks += 1;
            }
            if beeping != was_beeping {
                log::debug!("Tone {}", if beeping { "on" } else { "off" });
                was_beeping = beeping;
            }
        }

        if emulator.draw_pending() {
            report.frames += 1;
            emulator.clear_draw_pending();
        }
    }
    Ok(report)
}

/// Render the framebuffer as text, one line per row.
pub fn render_frame(display: &Framebuffer) -> String {
    let mut out = String::with_capacity((SCREEN_WIDTH + 1) * SCREEN_HEIGHT);
    for row in display.chunks(SCREEN_WIDTH) {
        out.extend(row.iter().map(|lit| if *lit { '#' } else { '.' }));
        out.push('\n');
    }
    out
}

/// A listing of `rom` as loaded at 0x200, one word per line.
pub fn disassembly(rom: &[u8]) -> String {
    disassemble(rom, START_ADDRESS)
        .map(|(addr, word, decoded)| match decoded {
            Ok(instruction) => format!("{:#05X}  {:04X}  {}\n", addr, word, instruction),
            Err(_) => format!("{:#05X}  {:04X}  DW {:#06X}\n", addr, word, word),
        })
        .collect()
}
