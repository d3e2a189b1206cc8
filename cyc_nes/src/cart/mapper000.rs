use super::Mirroring;
use crate::state::{StateError, StateReader, StateWriter};

/// 000, NROM
///
/// 16 KB or 32KB PRG (16 KB is mirrored into 0xc000-0xffff),
/// 8 KB CHR ROM or RAM
pub struct Mapper000 {
    prg_mask: usize,
    mirroring: Mirroring,
}

impl Mapper000 {
    pub fn new(mirroring: Mirroring, prg_len: usize) -> Self {
        Self {
            prg_mask: if prg_len > 0x4000 { 0x7fff } else { 0x3fff },
            mirroring,
        }
    }
}

impl super::Mapper for Mapper000 {
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8 {
        prg[addr as usize & self.prg_mask]
    }

    fn read_chr(&self, chr: &[u8], addr: u16) -> u8 {
        chr[addr as usize]
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn state_size(&self, _version: u32) -> usize {
        0
    }

    fn save(&self, _w: &mut StateWriter) {}

    fn load(&mut self, _r: &mut StateReader<'_>, _version: u32) -> Result<(), StateError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{tests::ines, Cartridge};

    #[test]
    fn test_16k_mirrored() {
        let cart = Cartridge::load(&ines(0, 1, 1, 0)).unwrap();
        assert_eq!(cart.read_prg(0x8123), cart.read_prg(0xc123));

        let mut rom = ines(0, 2, 1, 0);
        rom[0x10 + 0x4000 + 0x3ffc] = 0x34;
        let cart = Cartridge::load(&rom).unwrap();
        assert_eq!(cart.read_prg(0xfffc), 0x34);
        assert_eq!(cart.read_prg(0xbffc), 0x00);
    }
}
