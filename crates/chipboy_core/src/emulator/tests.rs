use super::*;
use crate::{FONTSET, RAM_SIZE, SCREEN_WIDTH, STACK_SIZE};

/// Build a machine with `program` loaded at 0x200 and a fixed RNG seed.
fn emulator_with(program: &[u16]) -> Emulator {
    let rom: Vec<u8> = program.iter().flat_map(|op| op.to_be_bytes()).collect();
    let mut emu = Emulator::with_seed(0xC8);
    emu.load_rom(&rom).unwrap();
    emu
}

fn run(emu: &mut Emulator, steps: usize) {
    for _ in 0..steps {
        emu.step().unwrap();
    }
}

/// Everything but the last-fetched opcode, which a failed step still records.
fn assert_unchanged(before: &MachineState, after: &MachineState) {
    assert_eq!(after.pc(), before.pc());
    assert_eq!(after.i(), before.i());
    assert_eq!(after.registers(), before.registers());
    assert_eq!(after.stack(), before.stack());
    assert_eq!(after.delay_timer(), before.delay_timer());
    assert_eq!(after.sound_timer(), before.sound_timer());
    assert_eq!(after.draw_pending(), before.draw_pending());
    assert!(after.memory() == before.memory(), "memory changed");
    assert!(after.display() == before.display(), "display changed");
}

#[test]
fn add_immediate_wraps_without_touching_vf() {
    for x in 0..0xFu8 {
        for nn in [0x00u8, 0x01, 0x54, 0xAB, 0xFF] {
            let set = 0x6000 | (x as u16) << 8 | nn as u16;
            let add = 0x7000 | (x as u16) << 8 | 0xAB;
            let mut emu = emulator_with(&[0x6F5A, set, add, add]);
            run(&mut emu, 4);
            let expected = nn.wrapping_add(0xAB).wrapping_add(0xAB);
            assert_eq!(emu.state().v(x), expected, "x={:X} nn={:02X}", x, nn);
            assert_eq!(emu.state().v(0xF), 0x5A);
        }
    }
}

#[test]
fn add_registers_sets_carry() {
    let mut emu = emulator_with(&[0x60FF, 0x6101, 0x8014]);
    run(&mut emu, 3);
    assert_eq!(emu.state().v(0), 0x00);
    assert_eq!(emu.state().v(0xF), 1);

    let mut emu = emulator_with(&[0x6001, 0x6101, 0x6F01, 0x8014]);
    run(&mut emu, 4);
    assert_eq!(emu.state().v(0), 0x02);
    assert_eq!(emu.state().v(0xF), 0);
}

#[test]
fn sub_registers_sets_not_borrow() {
    let mut emu = emulator_with(&[0x6001, 0x6102, 0x8015]);
    run(&mut emu, 3);
    assert_eq!(emu.state().v(0), 0xFF);
    assert_eq!(emu.state().v(0xF), 0);

    let mut emu = emulator_with(&[0x6002, 0x6101, 0x8015]);
    run(&mut emu, 3);
    assert_eq!(emu.state().v(0), 0x01);
    assert_eq!(emu.state().v(0xF), 1);

    // equal operands do not borrow
    let mut emu = emulator_with(&[0x6005, 0x6105, 0x8015]);
    run(&mut emu, 3);
    assert_eq!(emu.state().v(0), 0x00);
    assert_eq!(emu.state().v(0xF), 1);
}

#[test]
fn reverse_sub_sets_not_borrow() {
    let mut emu = emulator_with(&[0x6003, 0x6101, 0x8017]);
    run(&mut emu, 3);
    assert_eq!(emu.state().v(0), 0xFE);
    assert_eq!(emu.state().v(0xF), 0);

    let mut emu = emulator_with(&[0x6001, 0x6103, 0x8017]);
    run(&mut emu, 3);
    assert_eq!(emu.state().v(0), 0x02);
    assert_eq!(emu.state().v(0xF), 1);
}

#[test]
fn shifts_move_the_outgoing_bit_into_vf() {
    let mut emu = emulator_with(&[0x6005, 0x8006]);
    run(&mut emu, 2);
    assert_eq!(emu.state().v(0), 0x02);
    assert_eq!(emu.state().v(0xF), 1);

    let mut emu = emulator_with(&[0x6081, 0x800E]);
    run(&mut emu, 2);
    assert_eq!(emu.state().v(0), 0x02);
    assert_eq!(emu.state().v(0xF), 1);

    let mut emu = emulator_with(&[0x6040, 0x800E]);
    run(&mut emu, 2);
    assert_eq!(emu.state().v(0), 0x80);
    assert_eq!(emu.state().v(0xF), 0);
}

#[test]
fn flag_wins_when_vf_is_the_destination() {
    let mut emu = emulator_with(&[0x6FFF, 0x6101, 0x8F14]);
    run(&mut emu, 3);
    assert_eq!(emu.state().v(0xF), 1);
}

#[test]
fn bitwise_ops_and_register_copy() {
    let mut emu = emulator_with(&[
        0x60F0, 0x613C, 0x8201, 0x8211, 0x8301, 0x8312, 0x8401, 0x8413, 0x8510,
    ]);
    run(&mut emu, 9);
    assert_eq!(emu.state().v(2), 0xFC);
    assert_eq!(emu.state().v(3), 0x30);
    assert_eq!(emu.state().v(4), 0xCC);
    assert_eq!(emu.state().v(5), 0x3C);
}

#[test]
fn skips_advance_by_four_only_when_taken() {
    let cases: [(&[u16], u16); 8] = [
        (&[0x6012, 0x3012], 0x206),
        (&[0x6012, 0x3013], 0x204),
        (&[0x6012, 0x4013], 0x206),
        (&[0x6012, 0x4012], 0x204),
        (&[0x6012, 0x6112, 0x5010], 0x208),
        (&[0x6012, 0x6113, 0x5010], 0x206),
        (&[0x6012, 0x6113, 0x9010], 0x208),
        (&[0x6012, 0x6112, 0x9010], 0x206),
    ];
    for (program, pc) in cases {
        let mut emu = emulator_with(program);
        run(&mut emu, program.len());
        assert_eq!(emu.state().pc(), pc, "program {:04X?}", program);
    }
}

#[test]
fn jumps_set_pc_directly() {
    let mut emu = emulator_with(&[0x1ABC]);
    run(&mut emu, 1);
    assert_eq!(emu.state().pc(), 0xABC);

    let mut emu = emulator_with(&[0x6010, 0xB300]);
    run(&mut emu, 2);
    assert_eq!(emu.state().pc(), 0x310);

    // NNN + V0 past the end of memory is masked back into range
    let mut emu = emulator_with(&[0x60FF, 0xBFFF]);
    run(&mut emu, 2);
    assert_eq!(emu.state().pc(), (0xFFF + 0xFF) & 0xFFF);
}

#[test]
fn call_and_return_round_trip_at_every_depth() {
    for depth in 1..=STACK_SIZE {
        // 0x200: CALL 0x300; 0x300..: chain of calls, innermost returns
        let mut emu = Emulator::with_seed(1);
        let mut rom = vec![0u8; 0x400];
        rom[0..2].copy_from_slice(&0x2300u16.to_be_bytes());
        for level in 1..depth {
            let at = 0x100 + (level - 1) * 4;
            let target = 0x300 + (level as u16) * 4;
            rom[at..at + 2].copy_from_slice(&(0x2000 | target).to_be_bytes());
            rom[at + 2..at + 4].copy_from_slice(&0x00EEu16.to_be_bytes());
        }
        let innermost = 0x100 + (depth - 1) * 4;
        rom[innermost..innermost + 2].copy_from_slice(&0x00EEu16.to_be_bytes());
        emu.load_rom(&rom).unwrap();

        run(&mut emu, depth);
        assert_eq!(emu.state().stack_pointer() as usize, depth);
        run(&mut emu, depth);
        assert_eq!(emu.state().pc(), 0x202, "depth {}", depth);
        assert_eq!(emu.state().stack_pointer(), 0);
    }
}

#[test]
fn seventeenth_nested_call_overflows() {
    // CALL 0x200 recurses into itself
    let mut emu = emulator_with(&[0x2200]);
    run(&mut emu, STACK_SIZE);
    let before = emu.state().clone();
    assert_eq!(emu.step(), Err(Chip8Error::StackOverflow { pc: 0x200 }));
    assert_unchanged(&before, emu.state());
}

#[test]
fn return_with_empty_stack_underflows() {
    let mut emu = emulator_with(&[0x00EE]);
    assert_eq!(emu.step(), Err(Chip8Error::StackUnderflow { pc: 0x200 }));
    assert_eq!(emu.state().pc(), 0x200);
}

#[test]
fn store_and_load_registers_round_trip() {
    let mut emu = emulator_with(&[
        0x6001, 0x6102, 0x6203, 0x6304, 0xA300, 0xF355, // store V0..V3
        0x6000, 0x6100, 0x6200, 0x6300, 0xA300, 0xF365, // clear, reload
    ]);
    run(&mut emu, 6);
    assert_eq!(&emu.state().memory()[0x300..0x304], &[1, 2, 3, 4]);
    assert_eq!(emu.state().i(), 0x304);

    run(&mut emu, 4);
    assert_eq!(&emu.state().registers()[..4], &[0, 0, 0, 0]);
    run(&mut emu, 2);
    assert_eq!(&emu.state().registers()[..4], &[1, 2, 3, 4]);
    assert_eq!(emu.state().i(), 0x304);
}

#[test]
fn bcd_writes_hundreds_tens_units() {
    let mut emu = emulator_with(&[0x65FE, 0xA400, 0xF533]);
    run(&mut emu, 3);
    assert_eq!(&emu.state().memory()[0x400..0x403], &[2, 5, 4]);
    assert_eq!(emu.state().i(), 0x400);
}

#[test]
fn add_to_index_flags_overflow_past_twelve_bits() {
    let mut emu = emulator_with(&[0x6010, 0xAFF8, 0xF01E]);
    run(&mut emu, 3);
    assert_eq!(emu.state().i(), 0x008);
    assert_eq!(emu.state().v(0xF), 1);

    let mut emu = emulator_with(&[0x6010, 0xA100, 0x6F07, 0xF01E]);
    run(&mut emu, 4);
    assert_eq!(emu.state().i(), 0x110);
    assert_eq!(emu.state().v(0xF), 0);
}

#[test]
fn font_address_matches_preloaded_glyphs() {
    let mut emu = emulator_with(&[0x670B, 0xF729]);
    run(&mut emu, 2);
    let i = emu.state().i() as usize;
    assert_eq!(i, 0xB * 5);
    assert_eq!(&emu.state().memory()[i..i + 5], &FONTSET[0xB * 5..0xB * 5 + 5]);
}

#[test]
fn drawing_twice_reports_collision_then_clears() {
    // digit 0 glyph at (0, 0), drawn twice
    let mut emu = emulator_with(&[0x6000, 0x6100, 0xA000, 0xD015, 0xD015]);
    run(&mut emu, 4);
    assert_eq!(emu.state().v(0xF), 0);
    assert!(emu.draw_pending());
    assert!(emu.state().pixel(0, 0));
    assert!(emu.state().pixel(3, 4));
    assert!(!emu.state().pixel(1, 1));

    emu.clear_draw_pending();
    run(&mut emu, 1);
    assert_eq!(emu.state().v(0xF), 1);
    assert!(emu.draw_pending());
    assert!(emu.get_display().iter().all(|p| !p));
}

#[test]
fn sprites_wrap_around_both_edges() {
    // 0xFF row at (60, 31) spills onto columns 0..4 and rows 31 and 0
    let mut emu = emulator_with(&[0x603C, 0x611F, 0xA300, 0xD012]);
    emu.state.ram[0x300] = 0xFF;
    emu.state.ram[0x301] = 0x80;
    run(&mut emu, 4);
    for x in 60..64 {
        assert!(emu.state().pixel(x, 31), "x={}", x);
    }
    for x in 0..4 {
        assert!(emu.state().pixel(x, 31), "x={}", x);
    }
    assert!(emu.state().pixel(60, 0));
    assert!(!emu.state().pixel(61, 0));
    assert_eq!(emu.get_display().iter().filter(|p| **p).count(), 9);
    assert!(!emu.get_display()[4 + 31 * SCREEN_WIDTH]);
}

#[test]
fn clear_screen_blanks_display() {
    let mut emu = emulator_with(&[0xA000, 0xD005, 0x00E0]);
    run(&mut emu, 2);
    emu.clear_draw_pending();
    run(&mut emu, 1);
    assert!(emu.get_display().iter().all(|p| !p));
    assert!(emu.draw_pending());
    assert_eq!(emu.state().pc(), 0x206);
}

#[test]
fn key_skips_follow_the_keypad() {
    let mut emu = emulator_with(&[0x6A07, 0xEA9E]);
    emu.set_key(7, true);
    run(&mut emu, 2);
    assert_eq!(emu.state().pc(), 0x206);

    let mut emu = emulator_with(&[0x6A07, 0xEAA1]);
    run(&mut emu, 2);
    assert_eq!(emu.state().pc(), 0x206);

    let mut emu = emulator_with(&[0x6A07, 0xEAA1]);
    emu.set_key(7, true);
    run(&mut emu, 2);
    assert_eq!(emu.state().pc(), 0x204);

    // keys past 0xF are never pressed
    let mut emu = emulator_with(&[0x6A17, 0xEA9E]);
    emu.set_key(7, true);
    run(&mut emu, 2);
    assert_eq!(emu.state().pc(), 0x204);
}

#[test]
fn wait_for_key_holds_pc_until_a_key_is_down() {
    let mut emu = emulator_with(&[0xF30A, 0x1202]);
    for _ in 0..3 {
        assert_eq!(emu.step(), Ok(StepOutcome::AwaitingKey { register: 3 }));
        assert_eq!(emu.state().pc(), 0x200);
        assert!(emu.is_awaiting_key());
    }

    emu.set_key(0xC, true);
    emu.set_key(0x5, true);
    assert_eq!(
        emu.step(),
        Ok(StepOutcome::Executed(Instruction::LdKey { x: 3 }))
    );
    assert_eq!(emu.state().v(3), 0x5);
    assert_eq!(emu.state().pc(), 0x202);
    assert!(!emu.is_awaiting_key());
}

#[test]
fn timers_tick_once_per_step_and_stop_at_zero() {
    let mut emu = emulator_with(&[0x6003, 0xF015, 0xF018, 0xF107, 0x1208]);
    run(&mut emu, 3);
    // delay was armed one step before sound
    assert_eq!(emu.state().delay_timer(), 1);
    assert_eq!(emu.state().sound_timer(), 2);
    assert!(emu.is_beeping());

    run(&mut emu, 1);
    assert_eq!(emu.state().v(1), 1);

    run(&mut emu, 5);
    assert_eq!(emu.state().delay_timer(), 0);
    assert_eq!(emu.state().sound_timer(), 0);
    assert!(!emu.is_beeping());
}

#[test]
fn tick_reports_armed_sound_timer_including_last_tick() {
    let mut emu = emulator_with(&[0x6002, 0xF018]);
    emu.step_cpu().unwrap();
    emu.step_cpu().unwrap();
    assert_eq!(emu.state().sound_timer(), 2);
    assert!(emu.tick_timers());
    assert!(emu.tick_timers());
    assert!(!emu.tick_timers());
    assert_eq!(emu.state().sound_timer(), 0);
}

#[test]
fn step_cpu_leaves_timers_alone() {
    let mut emu = emulator_with(&[0x6009, 0xF015, 0x1204]);
    emu.step_cpu().unwrap();
    emu.step_cpu().unwrap();
    emu.step_cpu().unwrap();
    assert_eq!(emu.state().delay_timer(), 9);
    emu.tick_timers();
    assert_eq!(emu.state().delay_timer(), 8);
}

#[test]
fn random_byte_is_masked() {
    let mut emu = emulator_with(&[0xC30F, 0xC400]);
    run(&mut emu, 2);
    assert_eq!(emu.state().v(3) & 0xF0, 0);
    assert_eq!(emu.state().v(4), 0);
}

#[test]
fn seeded_machines_draw_the_same_random_bytes() {
    let program: [u16; 4] = [0xC0FF, 0xC1FF, 0xC2FF, 0xC3FF];
    let mut a = emulator_with(&program);
    let mut b = emulator_with(&program);
    run(&mut a, 4);
    run(&mut b, 4);
    assert_eq!(a.state().registers(), b.state().registers());
}

#[test]
fn unknown_opcode_halts_at_the_offending_instruction() {
    let mut emu = emulator_with(&[0x6005, 0xF015, 0x5121]);
    run(&mut emu, 2);
    let before = emu.state().clone();
    for _ in 0..2 {
        assert_eq!(
            emu.step(),
            Err(Chip8Error::UnknownOpcode { opcode: 0x5121 })
        );
        assert_unchanged(&before, emu.state());
        assert_eq!(emu.state().pc(), 0x204);
        assert_eq!(emu.state().current_opcode(), 0x5121);
    }
}

#[test]
fn fetch_past_end_of_memory_is_out_of_bounds() {
    let mut emu = emulator_with(&[0x1FFF]);
    run(&mut emu, 1);
    assert_eq!(
        emu.step(),
        Err(Chip8Error::OutOfBounds { address: RAM_SIZE })
    );
    assert_eq!(emu.state().pc(), 0xFFF);
}

#[test]
fn indexed_access_past_end_of_memory_is_rejected_intact() {
    for op in [0xF355, 0xF365, 0xF033, 0xD00F] {
        let mut emu = emulator_with(&[0xAFFE, 0x6101, op]);
        run(&mut emu, 2);
        let before = emu.state().clone();
        assert_eq!(
            emu.step(),
            Err(Chip8Error::OutOfBounds { address: RAM_SIZE }),
            "opcode {:04X}",
            op
        );
        assert_unchanged(&before, emu.state());
    }
}

#[test]
fn load_rejects_oversized_images() {
    let mut emu = Emulator::with_seed(0);
    let max = vec![0xAA; RAM_SIZE - 0x200];
    assert_eq!(emu.load_rom(&max), Ok(()));
    assert_eq!(emu.state().memory()[RAM_SIZE - 1], 0xAA);

    let mut emu = Emulator::with_seed(0);
    let too_big = vec![0xAA; RAM_SIZE - 0x200 + 1];
    assert_eq!(
        emu.load_rom(&too_big),
        Err(Chip8Error::ProgramTooLarge {
            size: RAM_SIZE - 0x200 + 1,
            max_size: RAM_SIZE - 0x200,
        })
    );
    assert!(emu.state().memory()[0x200..].iter().all(|b| *b == 0));
}

#[test]
fn reset_returns_to_power_on_state() {
    let mut emu = emulator_with(&[0x6A42, 0xF30A, 0xA000, 0xD005, 0x2300]);
    emu.step().unwrap();
    emu.step().unwrap();
    emu.set_key(1, true);
    run(&mut emu, 4);
    assert_ne!(emu.state(), &MachineState::default());

    emu.reset();
    assert_eq!(emu.state(), &MachineState::default());
    assert!(!emu.is_awaiting_key());
    assert!(!emu.is_beeping());
}

#[test]
fn invalid_key_index_is_ignored() {
    let mut emu = Emulator::with_seed(0);
    emu.set_key(16, true);
    assert!(emu.state().keys().iter().all(|k| !k));
    emu.set_key(0xF, true);
    assert!(emu.state().is_key_pressed(0xF));
    emu.clear_keys();
    assert!(!emu.state().is_key_pressed(0xF));
}

#[test]
fn peek_decodes_without_executing() {
    let emu = emulator_with(&[0x6A42]);
    assert_eq!(
        emu.peek_instruction(),
        Ok(Instruction::LdByte { x: 0xA, kk: 0x42 })
    );
    assert_eq!(emu.state().pc(), 0x200);
    assert_eq!(emu.state().v(0xA), 0);
}
