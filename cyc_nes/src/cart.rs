use crate::state::{StateError, StateReader, StateWriter};
use bit_field::BitField;
use thiserror::Error;

mod mapper000;
mod mapper001;
mod mapper002;
mod mapper003;
mod mapper004;
mod mapper065;

const HEADER_SIZE: usize = 0x10;
const TRAINER_SIZE: usize = 0x200;
const TRAINER_OFFSET: usize = 0x1000;
const PRG_RAM_SIZE: usize = 0x2000;
const CHR_RAM_SIZE: usize = 0x2000;

const MIRRORING_MAP: [[usize; 4]; 4] = [
    [0x000, 0x000, 0x400, 0x400], // Horizontal
    [0x000, 0x400, 0x000, 0x400], // Vertical
    [0x000, 0x000, 0x000, 0x000], // SingleScreen0
    [0x400, 0x400, 0x400, 0x400], // SingleScreen1
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mirroring {
    Horizontal = 0,
    Vertical = 1,
    SingleScreen0 = 2,
    SingleScreen1 = 3,
}

impl Mirroring {
    /// Maps a nametable address ($2000-$2FFF and mirrors) into the 2 KB VRAM.
    pub fn vram_index(self, addr: u16) -> usize {
        let table = (addr as usize >> 10) & 0b11;
        MIRRORING_MAP[self as usize][table] + (addr as usize & 0x3ff)
    }

    pub(crate) fn from_u8(b: u8) -> Self {
        match b & 0b11 {
            0 => Mirroring::Horizontal,
            1 => Mirroring::Vertical,
            2 => Mirroring::SingleScreen0,
            _ => Mirroring::SingleScreen1,
        }
    }
}

bitflags::bitflags! {
    /// flags6 low nibble and flags7 low bits of the iNES header
    pub struct CartFlags: u8 {
        const VERTICAL    = 1 << 0;
        const BATTERY     = 1 << 1;
        const TRAINER     = 1 << 2;
        const FOUR_SCREEN = 1 << 3;
        const VS_UNISYSTEM = 1 << 4;
        const PLAYCHOICE  = 1 << 5;
    }
}

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("not an iNES image")]
    BadMagic,
    #[error("NES 2.0 headers are not supported")]
    Nes20,
    #[error("ROM image truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("PRG ROM is empty")]
    NoPrg,
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u8),
}

pub struct Cartridge {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Option<Box<[u8; PRG_RAM_SIZE]>>,

    flags: CartFlags,
    mapper_id: u8,
    mapper: Box<dyn Mapper>,
    mirroring: Mirroring,
}

impl Cartridge {
    pub fn load(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_SIZE || data[..4] != [b'N', b'E', b'S', 0x1a] {
            return Err(CartridgeError::BadMagic);
        }

        let f6 = data[6];
        let f7 = data[7];
        if f7.get_bits(6..8) == 0b10 {
            return Err(CartridgeError::Nes20);
        }

        let flags = CartFlags::from_bits_truncate(f6.get_bits(0..4) | (f7.get_bits(0..2) << 4));
        let mapper_id = (f6 >> 4) | (f7 & 0xf0);

        let prg_len = data[4] as usize * 0x4000;
        let chr_len = data[5] as usize * 0x2000;
        if prg_len == 0 {
            return Err(CartridgeError::NoPrg);
        }

        let trainer_len = flags.contains(CartFlags::TRAINER) as usize * TRAINER_SIZE;
        let need = HEADER_SIZE + trainer_len + prg_len + chr_len;
        if data.len() < need {
            return Err(CartridgeError::Truncated {
                need,
                have: data.len(),
            });
        }

        let mut offset = HEADER_SIZE;
        let trainer = &data[offset..][..trainer_len];
        offset += trainer_len;
        let prg_rom = data[offset..][..prg_len].to_vec();
        offset += prg_len;

        let (chr, chr_is_ram) = if chr_len > 0 {
            (data[offset..][..chr_len].to_vec(), false)
        } else {
            (vec![0u8; CHR_RAM_SIZE], true)
        };

        if flags.contains(CartFlags::FOUR_SCREEN) {
            tracing::warn!("four-screen mirroring is not supported, using header mirroring");
        }
        let mirroring = if flags.contains(CartFlags::VERTICAL) {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let mapper: Box<dyn Mapper> = match mapper_id {
            0 => Box::new(mapper000::Mapper000::new(mirroring, prg_len)),
            1 => Box::new(mapper001::Mapper001::new(mirroring, prg_len, chr.len())),
            2 => Box::new(mapper002::Mapper002::new(mirroring, prg_len)),
            3 => Box::new(mapper003::Mapper003::new(mirroring, prg_len, chr.len())),
            4 => Box::new(mapper004::Mapper004::new(mirroring, prg_len, chr.len())),
            65 => Box::new(mapper065::Mapper065::new(mirroring, prg_len, chr.len())),
            _ => return Err(CartridgeError::UnsupportedMapper(mapper_id)),
        };

        let mut prg_ram = None;
        if flags.intersects(CartFlags::BATTERY | CartFlags::TRAINER) || mapper.needs_prg_ram() {
            let mut ram = Box::new([0u8; PRG_RAM_SIZE]);
            ram[TRAINER_OFFSET..][..trainer.len()].copy_from_slice(trainer);
            prg_ram = Some(ram);
        }

        tracing::info!(
            mapper = mapper_id,
            prg_kb = prg_len / 1024,
            chr_kb = chr_len / 1024,
            chr_ram = chr_is_ram,
            prg_ram = prg_ram.is_some(),
            ?mirroring,
            "cartridge loaded"
        );

        Ok(Self {
            prg_rom,
            chr,
            chr_is_ram,
            prg_ram,

            flags,
            mapper_id,
            mirroring: mapper.mirroring(),
            mapper,
        })
    }

    pub fn mapper_id(&self) -> u8 {
        self.mapper_id
    }

    pub fn flags(&self) -> CartFlags {
        self.flags
    }

    pub fn has_battery(&self) -> bool {
        self.flags.contains(CartFlags::BATTERY)
    }

    pub fn read_prg_ram(&self, addr: u16) -> Option<u8> {
        self.prg_ram
            .as_ref()
            .map(|ram| ram[addr as usize & (PRG_RAM_SIZE - 1)])
    }

    pub fn write_prg_ram(&mut self, addr: u16, data: u8) {
        if let Some(ram) = self.prg_ram.as_mut() {
            ram[addr as usize & (PRG_RAM_SIZE - 1)] = data;
        }
    }

    pub fn read_prg(&self, addr: u16) -> u8 {
        self.mapper.read_prg(&self.prg_rom, addr)
    }

    pub fn write_prg(&mut self, addr: u16, data: u8) {
        self.mapper.write_prg(addr, data);
    }

    pub fn read_chr(&self, addr: u16) -> u8 {
        self.mapper.read_chr(&self.chr, addr & 0x1fff)
    }

    pub fn write_chr(&mut self, addr: u16, data: u8) {
        if self.chr_is_ram {
            self.mapper.write_chr(&mut self.chr, addr & 0x1fff, data);
        }
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    /// Reports a mirroring change once, after the mapper switched modes.
    pub fn take_mirroring(&mut self) -> Option<Mirroring> {
        let m = self.mapper.mirroring();
        if m != self.mirroring {
            self.mirroring = m;
            Some(m)
        } else {
            None
        }
    }

    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending()
    }

    pub(crate) fn scanline(&mut self) {
        self.mapper.scanline();
    }

    pub(crate) fn cpu_cycle(&mut self) {
        self.mapper.cpu_cycle();
    }

    pub fn battery_ram(&self) -> Option<&[u8]> {
        if !self.has_battery() {
            return None;
        }
        self.prg_ram.as_ref().map(|ram| &ram[..])
    }

    pub fn load_battery_ram(&mut self, data: &[u8]) -> bool {
        match self.prg_ram.as_mut() {
            Some(ram) if data.len() == PRG_RAM_SIZE && self.flags.contains(CartFlags::BATTERY) => {
                ram.copy_from_slice(data);
                true
            }
            _ => false,
        }
    }
}

impl crate::state::Snapshot for Cartridge {
    fn state_name(&self) -> &'static str {
        "mapper"
    }

    fn state_size(&self, version: u32) -> usize {
        self.mapper.state_size(version)
            + self.chr_is_ram as usize * self.chr.len()
            + self.prg_ram.as_ref().map_or(0, |_| PRG_RAM_SIZE)
    }

    fn save_state(&self, w: &mut StateWriter) {
        self.mapper.save(w);
        if self.chr_is_ram {
            w.write_bytes(&self.chr);
        }
        if let Some(ram) = self.prg_ram.as_ref() {
            w.write_bytes(&ram[..]);
        }
    }

    fn load_state(&mut self, r: &mut StateReader<'_>, version: u32) -> Result<(), StateError> {
        let mut regs = r.take(self.mapper.state_size(version))?;
        self.mapper.load(&mut regs, version)?;
        if self.chr_is_ram {
            r.read_bytes(&mut self.chr)?;
        }
        if let Some(ram) = self.prg_ram.as_mut() {
            r.read_bytes(&mut ram[..])?;
        }
        self.mirroring = self.mapper.mirroring();
        Ok(())
    }
}

/// Cartridge-side bank switching.
///
/// ROM bytes are passed in on every access; a mapper only keeps its
/// registers and the byte offsets derived from them.
#[allow(unused_variables)]
pub trait Mapper: Send {
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8;
    fn write_prg(&mut self, addr: u16, data: u8) {}

    fn read_chr(&self, chr: &[u8], addr: u16) -> u8;
    fn write_chr(&mut self, chr: &mut [u8], addr: u16, data: u8) {
        chr[addr as usize] = data;
    }

    fn mirroring(&self) -> Mirroring;

    /// called once per rendered scanline
    fn scanline(&mut self) {}
    /// called once per CPU cycle
    fn cpu_cycle(&mut self) {}
    fn irq_pending(&self) -> bool {
        false
    }

    fn needs_prg_ram(&self) -> bool {
        false
    }

    fn state_size(&self, version: u32) -> usize;
    fn save(&self, w: &mut StateWriter);
    fn load(&mut self, r: &mut StateReader<'_>, version: u32) -> Result<(), StateError>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds an iNES image with every PRG byte set to its 16 KB bank number.
    pub(crate) fn ines(mapper: u8, prg_banks: u8, chr_banks: u8, f6_low: u8) -> Vec<u8> {
        let mut rom = vec![
            b'N',
            b'E',
            b'S',
            0x1a,
            prg_banks,
            chr_banks,
            ((mapper & 0x0f) << 4) | f6_low,
            mapper & 0xf0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
        ];
        for bank in 0..prg_banks {
            rom.extend(std::iter::repeat(bank).take(0x4000));
        }
        for bank in 0..chr_banks {
            rom.extend(std::iter::repeat(bank).take(0x2000));
        }
        rom
    }

    #[test]
    fn test_load_header() {
        let cart = Cartridge::load(&ines(0, 2, 1, 0b0011)).unwrap();
        assert_eq!(cart.mapper_id(), 0);
        assert!(cart.has_battery());
        assert_eq!(cart.mirroring(), Mirroring::Vertical);
        assert_eq!(cart.read_prg(0x8000), 0);
        assert_eq!(cart.read_prg(0xc000), 1);
        assert_eq!(cart.read_prg_ram(0x6000), Some(0));
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            Cartridge::load(b"NOPE0000000000000"),
            Err(CartridgeError::BadMagic)
        ));

        let mut rom = ines(0, 1, 1, 0);
        rom[7] |= 0x80;
        assert!(matches!(Cartridge::load(&rom), Err(CartridgeError::Nes20)));

        let rom = ines(0, 2, 1, 0);
        assert!(matches!(
            Cartridge::load(&rom[..rom.len() - 1]),
            Err(CartridgeError::Truncated { .. })
        ));

        assert!(matches!(
            Cartridge::load(&ines(7, 1, 1, 0)),
            Err(CartridgeError::UnsupportedMapper(7))
        ));
    }

    #[test]
    fn test_trainer_lands_in_prg_ram() {
        let mut rom = ines(0, 1, 1, 0b0100);
        let trainer = vec![0xa5u8; TRAINER_SIZE];
        rom.splice(HEADER_SIZE..HEADER_SIZE, trainer);
        let cart = Cartridge::load(&rom).unwrap();
        assert_eq!(cart.read_prg_ram(0x7000), Some(0xa5));
        assert_eq!(cart.read_prg_ram(0x6fff), Some(0x00));
        assert_eq!(cart.read_prg(0x8000), 0);
    }

    #[test]
    fn test_chr_ram_when_no_chr_rom() {
        let mut cart = Cartridge::load(&ines(2, 2, 0, 0)).unwrap();
        cart.write_chr(0x0123, 0x5a);
        assert_eq!(cart.read_chr(0x0123), 0x5a);

        let mut cart = Cartridge::load(&ines(0, 1, 1, 0)).unwrap();
        cart.write_chr(0x0123, 0x5a);
        assert_eq!(cart.read_chr(0x0123), 0x00);
    }

    #[test]
    fn test_nametable_mirroring() {
        assert_eq!(Mirroring::Vertical.vram_index(0x2000), 0x000);
        assert_eq!(Mirroring::Vertical.vram_index(0x2800), 0x000);
        assert_eq!(Mirroring::Vertical.vram_index(0x2c05), 0x405);
        assert_eq!(Mirroring::Horizontal.vram_index(0x2400), 0x000);
        assert_eq!(Mirroring::Horizontal.vram_index(0x2800), 0x400);
        assert_eq!(Mirroring::SingleScreen1.vram_index(0x2000), 0x400);
        assert_eq!(Mirroring::SingleScreen0.vram_index(0x2fff), 0x3ff);
    }
}
