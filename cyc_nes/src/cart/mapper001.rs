use super::Mirroring;
use crate::state::{StateError, StateReader, StateWriter};
use bit_field::BitField;

const SHIFT_RESET: u8 = 0x10;

/// 001, MMC1
///
/// 5-bit serial port at 0x8000-0xffff,
/// 16 KB or 32 KB PRG banks, 4 KB or 8 KB CHR banks
pub struct Mapper001 {
    shift: u8,
    control: u8,
    chr_bank0: u8,
    chr_bank1: u8,
    prg_bank: u8,

    prg_offsets: [usize; 2],
    chr_offsets: [usize; 2],
    prg_len: usize,
    chr_len: usize,

    mirroring: Mirroring,
}

impl Mapper001 {
    pub fn new(mirroring: Mirroring, prg_len: usize, chr_len: usize) -> Self {
        let mut mapper = Self {
            shift: SHIFT_RESET,
            control: 0x0c,
            chr_bank0: 0,
            chr_bank1: 0,
            prg_bank: 0,

            prg_offsets: [0; 2],
            chr_offsets: [0; 2],
            prg_len,
            chr_len,

            mirroring,
        };
        mapper.update_prg();
        mapper.update_chr();
        mapper
    }

    fn reset_shift(&mut self) {
        self.shift = SHIFT_RESET;
        self.control |= 0x0c;
        self.update_prg();
    }

    fn write_register(&mut self, addr: u16, value: u8) {
        match addr.get_bits(13..15) {
            0 => {
                self.control = value;
                self.mirroring = match value.get_bits(0..2) {
                    0 => Mirroring::SingleScreen0,
                    1 => Mirroring::SingleScreen1,
                    2 => Mirroring::Vertical,
                    _ => Mirroring::Horizontal,
                };
                self.update_prg();
                self.update_chr();
            }
            1 => {
                self.chr_bank0 = value;
                self.update_chr();
            }
            2 => {
                self.chr_bank1 = value;
                self.update_chr();
            }
            _ => {
                self.prg_bank = value;
                self.update_prg();
            }
        }
        tracing::debug!("mmc1 register {:04x} <- {:02x}", addr, value);
    }

    fn update_prg(&mut self) {
        let bank = self.prg_bank.get_bits(0..4) as usize;
        self.prg_offsets = match self.control.get_bits(2..4) {
            0 | 1 => {
                let base = (bank & 0x0e) * 0x4000;
                [base, base + 0x4000]
            }
            2 => [0, bank * 0x4000],
            _ => [bank * 0x4000, self.prg_len - 0x4000],
        };
        for offset in self.prg_offsets.iter_mut() {
            *offset %= self.prg_len;
        }
    }

    fn update_chr(&mut self) {
        self.chr_offsets = if self.control.get_bit(4) {
            [
                self.chr_bank0 as usize * 0x1000,
                self.chr_bank1 as usize * 0x1000,
            ]
        } else {
            let base = (self.chr_bank0 as usize & 0x1e) * 0x1000;
            [base, base + 0x1000]
        };
        for offset in self.chr_offsets.iter_mut() {
            *offset %= self.chr_len;
        }
    }

    fn chr_index(&self, addr: u16) -> usize {
        self.chr_offsets[addr as usize >> 12] + (addr as usize & 0x0fff)
    }
}

impl super::Mapper for Mapper001 {
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8 {
        let window = (addr as usize >> 14) & 1;
        prg[self.prg_offsets[window] + (addr as usize & 0x3fff)]
    }

    fn write_prg(&mut self, addr: u16, data: u8) {
        if data.get_bit(7) {
            self.reset_shift();
            return;
        }

        // the reset marker reaching bit 0 means this is the fifth bit
        let complete = self.shift.get_bit(0);
        self.shift = (self.shift >> 1) | ((data & 1) << 4);
        if complete {
            let value = self.shift;
            self.shift = SHIFT_RESET;
            self.write_register(addr, value);
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

    fn needs_prg_ram(&self) -> bool {
        true
    }

    fn state_size(&self, _version: u32) -> usize {
        6 + 4 * 4
    }

    fn save(&self, w: &mut StateWriter) {
        w.write_u8(self.shift);
        w.write_u8(self.control);
        w.write_u8(self.chr_bank0);
        w.write_u8(self.chr_bank1);
        w.write_u8(self.prg_bank);
        w.write_u8(self.mirroring as u8);
        for offset in self.prg_offsets.iter().chain(self.chr_offsets.iter()) {
            w.write_u32(*offset as u32);
        }
    }

    fn load(&mut self, r: &mut StateReader<'_>, _version: u32) -> Result<(), StateError> {
        self.shift = r.read_u8()?;
        self.control = r.read_u8()?;
        self.chr_bank0 = r.read_u8()?;
        self.chr_bank1 = r.read_u8()?;
        self.prg_bank = r.read_u8()?;
        self.mirroring = Mirroring::from_u8(r.read_u8()?);
        for offset in self.prg_offsets.iter_mut() {
            *offset = (r.read_u32()? as usize & !0x3fff) % self.prg_len;
        }
        for offset in self.chr_offsets.iter_mut() {
            *offset = (r.read_u32()? as usize & !0x0fff) % self.chr_len;
        }
        Ok(())
    }
}
