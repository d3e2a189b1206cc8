use super::Mirroring;
use crate::state::{StateError, StateReader, StateWriter};
use bit_field::BitField;

const FIXED_BANK: u8 = 0x3e;

/// 065, Irem H3001
///
/// 4 * 8 KB PRG windows, 8 * 1 KB CHR windows,
/// 16 bit CPU cycle IRQ counter
pub struct Mapper065 {
    prg_banks: [u8; 4],
    chr_banks: [u8; 8],
    prg_select: u8,
    swapped: bool,

    prg_len: usize,
    chr_len: usize,

    irq_reload: u16,
    irq_counter: u16,
    irq_on: bool,
    irq_level: bool,

    mirroring: Mirroring,
}

impl Mapper065 {
    pub fn new(mirroring: Mirroring, prg_len: usize, chr_len: usize) -> Self {
        Self {
            prg_banks: [0x00, 0x01, FIXED_BANK, 0x3f],
            chr_banks: [0; 8],
            prg_select: 0,
            swapped: false,

            prg_len,
            chr_len,

            irq_reload: 0,
            irq_counter: 0,
            irq_on: false,
            irq_level: false,

            mirroring,
        }
    }

    fn update_prg(&mut self) {
        if self.swapped {
            self.prg_banks[0] = FIXED_BANK;
            self.prg_banks[2] = self.prg_select;
        } else {
            self.prg_banks[0] = self.prg_select;
            self.prg_banks[2] = FIXED_BANK;
        }
    }

    fn chr_index(&self, addr: u16) -> usize {
        let bank = self.chr_banks[(addr as usize >> 10) & 0b111] as usize;
        (bank * 0x400 + (addr as usize & 0x3ff)) % self.chr_len
    }
}

impl super::Mapper for Mapper065 {
    fn read_prg(&self, prg: &[u8], addr: u16) -> u8 {
        let bank = self.prg_banks[(addr as usize >> 13) & 0b11] as usize;
        prg[(bank * 0x2000 + (addr as usize & 0x1fff)) % self.prg_len]
    }

    fn write_prg(&mut self, addr: u16, data: u8) {
        match addr {
            0x8000 => {
                self.prg_select = data;
                self.update_prg();
            }
            0x9000 => {
                self.swapped = data.get_bit(7);
                self.update_prg();
            }
            0x9001 => match data >> 6 {
                0 => self.mirroring = Mirroring::Vertical,
                2 => self.mirroring = Mirroring::Horizontal,
                _ => {}
            },
            0x9003 => {
                self.irq_on = data.get_bit(7);
                self.irq_level = false;
            }
            0x9004 => {
                self.irq_counter = self.irq_reload;
                self.irq_level = false;
            }
            0x9005 => {
                self.irq_reload.set_bits(8..16, data as u16);
            }
            0x9006 => {
                self.irq_reload.set_bits(0..8, data as u16);
            }
            0xa000 => self.prg_banks[1] = data,
            0xb000..=0xb007 => self.chr_banks[addr as usize & 0b111] = data,
            _ => tracing::trace!("unmapped h3001 write {:04x}", addr),
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

    fn cpu_cycle(&mut self) {
        if self.irq_on && self.irq_counter > 0 {
            self.irq_counter -= 1;
            if self.irq_counter == 0 {
                self.irq_level = true;
                self.irq_on = false;
            }
        }
    }

    fn irq_pending(&self) -> bool {
        self.irq_level
    }

    fn state_size(&self, _version: u32) -> usize {
        4 + 8 + 2 + 2 * 2 + 2 + 1
    }

    fn save(&self, w: &mut StateWriter) {
        w.write_bytes(&self.prg_banks);
        w.write_bytes(&self.chr_banks);
        w.write_u8(self.prg_select);
        w.write_bool(self.swapped);
        w.write_u16(self.irq_reload);
        w.write_u16(self.irq_counter);
        w.write_bool(self.irq_on);
        w.write_bool(self.irq_level);
        w.write_u8(self.mirroring as u8);
    }

    fn load(&mut self, r: &mut StateReader<'_>, _version: u32) -> Result<(), StateError> {
        r.read_bytes(&mut self.prg_banks)?;
        r.read_bytes(&mut self.chr_banks)?;
        self.prg_select = r.read_u8()?;
        self.swapped = r.read_bool()?;
        self.irq_reload = r.read_u16()?;
        self.irq_counter = r.read_u16()?;
        self.irq_on = r.read_bool()?;
        self.irq_level = r.read_bool()?;
        self.mirroring = Mirroring::from_u8(r.read_u8()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::Mapper;
    use super::*;

    fn banked_prg() -> Vec<u8> {
        // 512 KB, every byte holds its 8 KB bank number
        (0..64u8)
            .flat_map(|bank| std::iter::repeat(bank).take(0x2000))
            .collect()
    }

    #[test]
    fn test_prg_windows() {
        let prg = banked_prg();
        let mut m = Mapper065::new(Mirroring::Vertical, prg.len(), 0x2000);
        let windows = |m: &Mapper065| {
            [0x8000u16, 0xa000, 0xc000, 0xe000].map(|addr| m.read_prg(&prg, addr))
        };
        assert_eq!(windows(&m), [0x00, 0x01, 0x3e, 0x3f]);

        m.write_prg(0x8000, 5);
        m.write_prg(0xa000, 9);
        assert_eq!(windows(&m), [5, 9, 0x3e, 0x3f]);

        m.write_prg(0x9000, 0x80);
        assert_eq!(windows(&m), [0x3e, 9, 5, 0x3f]);

        m.write_prg(0x8000, 7);
        assert_eq!(windows(&m), [0x3e, 9, 7, 0x3f]);
    }

    #[test]
    fn test_small_prg_wraps() {
        let prg: Vec<u8> = (0..0x20000usize).map(|i| (i / 0x2000) as u8).collect();
        let m = Mapper065::new(Mirroring::Vertical, prg.len(), 0x2000);
        assert_eq!(m.read_prg(&prg, 0xc000), 14);
        assert_eq!(m.read_prg(&prg, 0xe000), 15);
    }

    #[test]
    fn test_chr_and_mirroring() {
        let chr: Vec<u8> = (0..0x20000usize).map(|i| (i / 0x400) as u8).collect();
        let mut m = Mapper065::new(Mirroring::Horizontal, 0x20000, chr.len());
        m.write_prg(0xb003, 42);
        assert_eq!(m.read_chr(&chr, 0x0c10), 42);

        m.write_prg(0x9001, 0x00);
        assert_eq!(m.mirroring(), Mirroring::Vertical);
        m.write_prg(0x9001, 0x80);
        assert_eq!(m.mirroring(), Mirroring::Horizontal);
        m.write_prg(0x9001, 0x40);
        assert_eq!(m.mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn test_cycle_irq() {
        let mut m = Mapper065::new(Mirroring::Vertical, 0x20000, 0x2000);
        m.write_prg(0x9005, 0x00);
        m.write_prg(0x9006, 0x03);
        m.write_prg(0x9004, 0);
        m.write_prg(0x9003, 0x80);

        m.cpu_cycle();
        m.cpu_cycle();
        assert!(!m.irq_pending());
        m.cpu_cycle();
        assert!(m.irq_pending());

        // counter stops once fired
        m.cpu_cycle();
        assert_eq!(m.irq_counter, 0);

        m.write_prg(0x9003, 0x00);
        assert!(!m.irq_pending());
    }

    #[test]
    fn test_irq_reload_halves() {
        let mut m = Mapper065::new(Mirroring::Vertical, 0x20000, 0x2000);
        m.write_prg(0x9005, 0x12);
        m.write_prg(0x9006, 0x34);
        assert_eq!(m.irq_reload, 0x1234);

        // each half leaves the other alone
        m.write_prg(0x9005, 0x01);
        assert_eq!(m.irq_reload, 0x0134);
        m.write_prg(0x9006, 0x00);
        assert_eq!(m.irq_reload, 0x0100);

        m.write_prg(0x9004, 0);
        m.write_prg(0x9003, 0x80);
        for _ in 0..0xff {
            m.cpu_cycle();
        }
        assert!(!m.irq_pending());
        m.cpu_cycle();
        assert!(m.irq_pending());
    }
}
