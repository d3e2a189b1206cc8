use super::Mirroring;
use crate::state::{StateError, StateReader, StateWriter};

/// 003, CNROM
///
/// 16 KB or 32KB PRG,
/// 8 KB switchable CHR banks
pub struct Mapper003 {
    prg_mask: usize,
    chr_offset: usize,
    chr_len: usize,

    mirroring: Mirroring,
}

impl Mapper003 {
    pub fn new(mirroring: Mirroring, prg_len: usize, chr_len: usize) -> Self {
        Self {
            prg_mask: if prg_len > 0x4000 { 0x7fff } else { 0x3fff },
            chr_offset: 0,
            chr_len,

            mirroring,
        }
    }
}

impl super::Mapper for Mapper003 {
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8 {
        prg[addr as usize & self.prg_mask]
    }

    fn write_prg(&mut self, _addr: u16, data: u8) {
        self.chr_offset = (data as usize * 0x2000) % self.chr_len;
    }

    fn read_chr(&self, chr: &[u8], addr: u16) -> u8 {
        chr[self.chr_offset + addr as usize]
    }

    fn write_chr(&mut self, chr: &mut [u8], addr: u16, data: u8) {
        chr[self.chr_offset + addr as usize] = data;
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn state_size(&self, _version: u32) -> usize {
        4
    }

    fn save(&self, w: &mut StateWriter) {
        w.write_u32(self.chr_offset as u32);
    }

    fn load(&mut self, r: &mut StateReader<'_>, _version: u32) -> Result<(), StateError> {
        self.chr_offset = (r.read_u32()? as usize & !0x1fff) % self.chr_len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{tests::ines, Cartridge};

    #[test]
    fn test_chr_switch() {
        let mut cart = Cartridge::load(&ines(3, 2, 4, 0)).unwrap();
        assert_eq!(cart.read_chr(0x0000), 0);

        cart.write_prg(0x8000, 2);
        assert_eq!(cart.read_chr(0x1fff), 2);

        cart.write_prg(0x8000, 7);
        assert_eq!(cart.read_chr(0x0000), 3);
    }
}
