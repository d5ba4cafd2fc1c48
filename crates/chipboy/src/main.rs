use anyhow::{Context, Result};
use chipboy::{RunConfig, StopReason};

const USAGE: &str = "Usage:\n  chipboy run <rom> [cycles]\n  chipboy disasm <rom>";

fn main() {
    env_logger::init();

    if let Err(err) = try_main() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();
    let rom_path = args.next().unwrap_or_default();

    if rom_path.is_empty() {
        eprintln!("No ROM path provided.\n{}", USAGE);
        std::process::exit(1);
    }
    let rom = std::fs::read(&rom_path)
        .with_context(|| format!("failed to read ROM file '{}'", rom_path))?;

    match command.as_str() {
        "run" => {
            let cycles = match args.next() {
                Some(arg) => arg
                    .parse::<u64>()
                    .with_context(|| format!("invalid cycle count '{}'", arg))?,
                None => RunConfig::default().cycles,
            };
            let config = RunConfig::builder().cycles(cycles).build();

            log::info!("Running ROM path: '{}'", rom_path);
            let mut emulator = chipboy::boot(&rom, &config)?;
            let report = chipboy::run(&mut emulator, &config)?;

            print!("{}", chipboy::render_frame(emulator.get_display()));
            match report.stop {
                StopReason::CycleLimit => println!("Ran {} cycles", report.cycles),
                StopReason::Halted { pc } => {
                    println!("Halted at {:#06X} after {} cycles", pc, report.cycles)
                }
            }
            println!(
                "{} frames, {} beep ticks, {} key waits",
                report.frames, report.beep_ticks, report.key_waits
            );
            log::info!("ChipBoy exit");
        }
        "disasm" => print!("{}", chipboy::disassembly(&rom)),
        other => {
            eprintln!("Unknown command '{}'.\n{}", other, USAGE);
            std::process::exit(1);
        }
    }
    Ok(())
}
