use super::Mirroring;
use crate::state::{StateError, StateReader, StateWriter};
use bit_field::BitField;

/// 004, MMC3
///
/// 4 * 8 KB PRG windows (two switchable),
/// 8 * 1 KB CHR windows (2 KB + 2 KB + 4 * 1 KB),
/// scanline IRQ counter
pub struct Mapper004 {
    bank_select: u8,
    bank_regs: [u8; 8],

    prg_offsets: [usize; 4],
    chr_offsets: [usize; 8],
    prg_len: usize,
    chr_len: usize,

    irq_latch: u8,
    irq_counter: u8,
    irq_on: bool,
    irq_level: bool,

    mirroring: Mirroring,
}

impl Mapper004 {
    pub fn new(mirroring: Mirroring, prg_len: usize, chr_len: usize) -> Self {
        let mut mapper = Self {
            bank_select: 0,
            bank_regs: [0, 2, 4, 5, 6, 7, 0, 1],

            prg_offsets: [0; 4],
            chr_offsets: [0; 8],
            prg_len,
            chr_len,

            irq_latch: 0,
            irq_counter: 0,
            irq_on: false,
            irq_level: false,

            mirroring,
        };
        mapper.update_banks();
        mapper
    }

    fn update_banks(&mut self) {
        let r = |i: usize| self.bank_regs[i] as usize;
        let second_last = self.prg_len - 0x4000;
        let last = self.prg_len - 0x2000;

        let r6 = r(6) * 0x2000;
        let r7 = r(7) * 0x2000;
        self.prg_offsets = if !self.bank_select.get_bit(6) {
            [r6, r7, second_last, last]
        } else {
            [second_last, r7, r6, last]
        };

        let two_kb = [r(0) & 0xfe, r(0) | 1, r(1) & 0xfe, r(1) | 1];
        let one_kb = [r(2), r(3), r(4), r(5)];
        let banks = if !self.bank_select.get_bit(7) {
            [two_kb, one_kb]
        } else {
            [one_kb, two_kb]
        };
        for (offset, bank) in self.chr_offsets.iter_mut().zip(banks.iter().flatten()) {
            *offset = (bank * 0x400) % self.chr_len;
        }
        for offset in self.prg_offsets.iter_mut() {
            *offset %= self.prg_len;
        }
    }

    fn chr_index(&self, addr: u16) -> usize {
        self.chr_offsets[(addr as usize >> 10) & 0b111] + (addr as usize & 0x3ff)
    }
}

impl super::Mapper for Mapper004 {
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8 {
        let window = (addr as usize >> 13) & 0b11;
        prg[self.prg_offsets[window] + (addr as usize & 0x1fff)]
    }

    fn write_prg(&mut self, addr: u16, data: u8) {
        let even = addr % 2 == 0;
        match (addr, even) {
            (0x8000..=0x9fff, true) => {
                self.bank_select = data;
                self.update_banks();
            }
            (0x8000..=0x9fff, false) => {
                self.bank_regs[self.bank_select.get_bits(0..3) as usize] = data;
                self.update_banks();
            }
            (0xa000..=0xbfff, true) => {
                self.mirroring = if data.get_bit(0) {
                    Mirroring::Horizontal
                } else {
                    Mirroring::Vertical
                };
            }
            // PRG RAM protect
            (0xa000..=0xbfff, false) => {}
            (0xc000..=0xdfff, true) => self.irq_latch = data,
            (0xc000..=0xdfff, false) => self.irq_counter = 0,
            (_, true) => {
                self.irq_on = false;
                self.irq_level = false;
            }
            (_, false) => self.irq_on = true,
        }
    }

    fn read_chr(&self, chr: &[u8], addr: u16) -> u8 {
        chr[self.chr_index(addr)]
    }

    fn write_chr(&mut self, chr: &mut [u8], addr: u16, data: u8) {
        chr[self.chr_index(addr)] = data;
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn scanline(&mut self) {
        if self.irq_counter == 0 {
            self.irq_counter = self.irq_latch;
        } else {
            self.irq_counter -= 1;
            if self.irq_on && self.irq_counter == 0 {
                self.irq_level = true;
            }
        }
    }

    fn irq_pending(&self) -> bool {
        self.irq_level
    }

    fn needs_prg_ram(&self) -> bool {
        true
    }

    fn state_size(&self, _version: u32) -> usize {
        1 + 8 + 4 * 4 + 8 * 4 + 4 + 1
    }

    fn save(&self, w: &mut StateWriter) {
        w.write_u8(self.bank_select);
        w.write_bytes(&self.bank_regs);
        for offset in self.prg_offsets.iter().chain(self.chr_offsets.iter()) {
            w.write_u32(*offset as u32);
        }
        w.write_u8(self.irq_latch);
        w.write_u8(self.irq_counter);
        w.write_bool(self.irq_on);
        w.write_bool(self.irq_level);
        w.write_u8(self.mirroring as u8);
    }

    fn load(&mut self, r: &mut StateReader<'_>, _version: u32) -> Result<(), StateError> {
        self.bank_select = r.read_u8()?;
        r.read_bytes(&mut self.bank_regs)?;
        for offset in self.prg_offsets.iter_mut() {
            *offset = (r.read_u32()? as usize & !0x1fff) % self.prg_len;
        }
        for offset in self.chr_offsets.iter_mut() {
            *offset = (r.read_u32()? as usize & !0x03ff) % self.chr_len;
        }
        self.irq_latch = r.read_u8()?;
        self.irq_counter = r.read_u8()?;
        self.irq_on = r.read_bool()?;
        self.irq_level = r.read_bool()?;
        self.mirroring = Mirroring::from_u8(r.read_u8()?);
        Ok(())
    }
}
