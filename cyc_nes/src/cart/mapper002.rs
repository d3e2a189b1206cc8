use super::Mirroring;
use crate::state::{StateError, StateReader, StateWriter};

/// 002, UxROM
///
/// 0x8000-0xbfff: 16 KB switchable PRG banks,
/// 0xC000-0xffff: 16 KB PRG bank (fixed to the last bank),
/// 8 KB CHR RAM
pub struct Mapper002 {
    prg_offset0: usize,
    prg_offset1: usize,
    prg_len: usize,

    mirroring: Mirroring,
}

impl Mapper002 {
    pub fn new(mirroring: Mirroring, prg_len: usize) -> Self {
        Self {
            prg_offset0: 0,
            prg_offset1: prg_len - 0x4000,
            prg_len,

            mirroring,
        }
    }
}

impl super::Mapper for Mapper002 {
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8 {
        match addr {
            0x8000..=0xbfff => prg[self.prg_offset0 + (addr as usize & 0x3fff)],
            _ => prg[self.prg_offset1 + (addr as usize & 0x3fff)],
        }
    }

    fn write_prg(&mut self, _addr: u16, data: u8) {
        self.prg_offset0 = (data as usize * 0x4000) % self.prg_len;
    }

    fn read_chr(&self, chr: &[u8], addr: u16) -> u8 {
        chr[addr as usize]
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn state_size(&self, _version: u32) -> usize {
        4
    }

    fn save(&self, w: &mut StateWriter) {
        w.write_u32(self.prg_offset0 as u32);
    }

    fn load(&mut self, r: &mut StateReader<'_>, _version: u32) -> Result<(), StateError> {
        self.prg_offset0 = (r.read_u32()? as usize & !0x3fff) % self.prg_len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{tests::ines, Cartridge, Mapper};
    use super::*;

    #[test]
    fn test_bank_switch() {
        let mut cart = Cartridge::load(&ines(2, 8, 0, 0)).unwrap();
        assert_eq!(cart.read_prg(0x8000), 0);
        assert_eq!(cart.read_prg(0xc000), 7);

        cart.write_prg(0x8000, 5);
        assert_eq!(cart.read_prg(0x8000), 5);
        assert_eq!(cart.read_prg(0xffff), 7);

        // out of range selects wrap
        cart.write_prg(0xffff, 9);
        assert_eq!(cart.read_prg(0xbfff), 1);
    }

    #[test]
    fn test_load_realigns_offset() {
        let mut m = Mapper002::new(Mirroring::Vertical, 0x20000);
        let data = 0x1ffffu32.to_le_bytes();
        m.load(&mut StateReader::new(&data), 0).unwrap();
        assert_eq!(m.prg_offset0, 0x1c000);
        assert_eq!(m.read_prg(&vec![7u8; 0x20000], 0xbfff), 7);
    }
}
