use cyc_nes::{Buttons, Config, Emulator, StateError};

const NMI_HANDLER: u16 = 0x9000;

/// NROM-256 image: `program` at $8000, NOPs elsewhere and an
/// `INC $01; RTI` handler for NMI and IRQ.
fn nrom(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![b'N', b'E', b'S', 0x1a, 2, 1, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    let mut prg = vec![0xeau8; 0x8000];
    prg[..program.len()].copy_from_slice(program);

    let handler = (NMI_HANDLER - 0x8000) as usize;
    prg[handler..handler + 3].copy_from_slice(&[0xe6, 0x01, 0x40]);
    prg[0x7ffa..].copy_from_slice(&[0x00, 0x90, 0x00, 0x80, 0x00, 0x90]);

    rom.extend(prg);
    rom.extend(std::iter::repeat(0u8).take(0x2000));
    rom
}

/// Enables NMI and rendering, then spins incrementing $00.
fn busy_rom() -> Vec<u8> {
    nrom(&[
        0xa9, 0x80, // LDA #$80
        0x8d, 0x00, 0x20, // STA $2000
        0xa9, 0x1e, // LDA #$1e
        0x8d, 0x01, 0x20, // STA $2001
        0xe6, 0x00, // INC $00
        0x4c, 0x0a, 0x80, // JMP $800a
    ])
}

fn emulator(rom: &[u8]) -> Emulator {
    Emulator::new(rom, Config::default()).unwrap()
}

#[test]
fn test_nop_sled() {
    let mut emu = emulator(&nrom(&[]));
    assert_eq!(emu.cpu().pc(), 0x8000);
    for _ in 0..100 {
        emu.step();
    }
    // two cycles per NOP
    assert_eq!(emu.cpu().pc(), 0x8000 + 50);
}

#[test]
fn test_arbitrary_bytes_never_panic() {
    let mut seed = 0x1234_5678u32;
    for _ in 0..8 {
        let program: Vec<u8> = (0..0x7ff0)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                (seed >> 16) as u8
            })
            .collect();
        let mut emu = emulator(&nrom(&program));
        for _ in 0..100 {
            emu.step();
        }
        for _ in 0..20_000 {
            emu.step();
        }
    }
}

#[test]
fn test_nmi_every_frame() {
    let mut emu = emulator(&busy_rom());
    for _ in 0..5 {
        emu.run_frame();
    }
    let nmis = emu.peek(0x0001);
    assert!((4..=5).contains(&nmis), "{}", nmis);
    assert_ne!(emu.peek(0x0000), 0);
}

#[test]
fn test_save_load_round_trip() {
    let rom = busy_rom();
    let mut a = emulator(&rom);
    for _ in 0..3 {
        a.run_frame();
    }
    let saved = a.save_state();

    let mut b = emulator(&rom);
    b.load_state(&saved).unwrap();
    assert_eq!(b.save_state(), saved);

    for _ in 0..2 {
        a.run_frame();
        b.run_frame();
    }
    assert_eq!(a.save_state(), b.save_state());
    assert_eq!(a.frame_bgra(), b.frame_bgra());
}

#[test]
fn test_bad_states_leave_emulator_untouched() {
    let rom = busy_rom();
    let mut emu = emulator(&rom);
    emu.run_frame();
    let good = emu.save_state();
    emu.run_frame();
    let before = emu.save_state();

    let mut bad_magic = good.clone();
    bad_magic[0] ^= 0xff;
    assert!(matches!(emu.load_state(&bad_magic), Err(StateError::BadMagic(_))));

    let mut bad_version = good.clone();
    bad_version[4] = 1;
    assert!(matches!(
        emu.load_state(&bad_version),
        Err(StateError::UnsupportedVersion(1))
    ));

    assert!(matches!(
        emu.load_state(&good[..good.len() - 1]),
        Err(StateError::RecordSize { .. })
    ));
    assert!(emu.load_state(&good[..2]).is_err());
    assert!(emu.load_state(&[]).is_err());

    // a CHR RAM cartridge has a bigger mapper record
    let mut chr_ram_rom = rom[..16 + 0x8000].to_vec();
    chr_ram_rom[5] = 0;
    let other = emulator(&chr_ram_rom).save_state();
    assert!(matches!(
        emu.load_state(&other),
        Err(StateError::RecordSize { .. })
    ));

    assert_eq!(emu.save_state(), before);
}

#[test]
fn test_state_files() {
    let dir = std::env::temp_dir().join(format!("cyc_nes_state_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("busy.state");

    let mut emu = emulator(&busy_rom());
    emu.run_frame();
    assert!(emu.save_to_file(&path));
    let saved = emu.save_state();

    emu.run_frame();
    assert!(emu.load_from_file(&path));
    assert_eq!(emu.save_state(), saved);

    assert!(!emu.load_from_file(&dir.join("missing.state")));
    std::fs::write(&path, b"garbage").unwrap();
    assert!(!emu.load_from_file(&path));
    assert_eq!(emu.save_state(), saved);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_controller_protocol() {
    let rom = nrom(&[
        0xa9, 0x01, // LDA #$01
        0x8d, 0x16, 0x40, // STA $4016
        0xa9, 0x00, // LDA #$00
        0x8d, 0x16, 0x40, // STA $4016
        0xa2, 0x00, // LDX #$00
        0xad, 0x16, 0x40, // LDA $4016
        0x95, 0x10, // STA $10,X
        0xe8, // INX
        0xe0, 0x0a, // CPX #$0a
        0xd0, 0xf6, // BNE $800c
        0x4c, 0x16, 0x80, // JMP $8016
    ]);
    let mut emu = emulator(&rom);
    emu.set_buttons(0, Buttons::A | Buttons::UP);
    emu.run_frame();

    let reads: Vec<u8> = (0x10..0x1a).map(|a| emu.peek(a)).collect();
    assert_eq!(
        reads,
        [0x41, 0x40, 0x40, 0x40, 0x41, 0x40, 0x40, 0x40, 0x41, 0x41]
    );
}

#[test]
fn test_unsupported_rom() {
    let mut rom = nrom(&[]);
    rom[6] = 0x71; // mapper 7
    assert!(Emulator::new(&rom, Config::default()).is_err());
    assert!(Emulator::new(b"NES", Config::default()).is_err());
}
