use super::{Cpu, CpuBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum AddrMode {
    IMP,
    ACC,
    IMM,
    ZEP,
    ZPX,
    ZPY,
    IZX,
    IZY,
    ABS,
    ABX,
    ABY,
    IND,
    REL,
}

impl AddrMode {
    /// operand bytes following the opcode
    pub fn operand_len(self) -> u16 {
        match self {
            AddrMode::IMP | AddrMode::ACC => 0,
            AddrMode::ABS | AddrMode::ABX | AddrMode::ABY | AddrMode::IND => 2,
            _ => 1,
        }
    }
}

/// What an instruction works on once its addressing mode is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Implied,
    Accumulator,
    /// effective address; for IMM this is the address of the operand byte,
    /// for REL and IND it is the jump target
    Memory(u16),
}

#[rustfmt::skip]
pub const ADDR_MODES: [AddrMode; 256] = {
    use AddrMode::*;
    //   00   01   02   03   04   05   06   07   08   09   0a   0b   0c   0d   0e   0f
    [
        IMP, IZX, IMP, IZX, ZEP, ZEP, ZEP, ZEP, IMP, IMM, ACC, IMM, ABS, ABS, ABS, ABS, // 00
        REL, IZY, IMP, IZY, ZPX, ZPX, ZPX, ZPX, IMP, ABY, IMP, ABY, ABX, ABX, ABX, ABX, // 10
        ABS, IZX, IMP, IZX, ZEP, ZEP, ZEP, ZEP, IMP, IMM, ACC, IMM, ABS, ABS, ABS, ABS, // 20
        REL, IZY, IMP, IZY, ZPX, ZPX, ZPX, ZPX, IMP, ABY, IMP, ABY, ABX, ABX, ABX, ABX, // 30
        IMP, IZX, IMP, IZX, ZEP, ZEP, ZEP, ZEP, IMP, IMM, ACC, IMM, ABS, ABS, ABS, ABS, // 40
        REL, IZY, IMP, IZY, ZPX, ZPX, ZPX, ZPX, IMP, ABY, IMP, ABY, ABX, ABX, ABX, ABX, // 50
        IMP, IZX, IMP, IZX, ZEP, ZEP, ZEP, ZEP, IMP, IMM, ACC, IMM, IND, ABS, ABS, ABS, // 60
        REL, IZY, IMP, IZY, ZPX, ZPX, ZPX, ZPX, IMP, ABY, IMP, ABY, ABX, ABX, ABX, ABX, // 70
        IMM, IZX, IMM, IZX, ZEP, ZEP, ZEP, ZEP, IMP, IMM, IMP, IMM, ABS, ABS, ABS, ABS, // 80
        REL, IZY, IMP, IZY, ZPX, ZPX, ZPY, ZPY, IMP, ABY, IMP, ABY, ABX, ABX, ABY, ABY, // 90
        IMM, IZX, IMM, IZX, ZEP, ZEP, ZEP, ZEP, IMP, IMM, IMP, IMM, ABS, ABS, ABS, ABS, // a0
        REL, IZY, IMP, IZY, ZPX, ZPX, ZPY, ZPY, IMP, ABY, IMP, ABY, ABX, ABX, ABY, ABY, // b0
        IMM, IZX, IMM, IZX, ZEP, ZEP, ZEP, ZEP, IMP, IMM, IMP, IMM, ABS, ABS, ABS, ABS, // c0
        REL, IZY, IMP, IZY, ZPX, ZPX, ZPX, ZPX, IMP, ABY, IMP, ABY, ABX, ABX, ABX, ABX, // d0
        IMM, IZX, IMM, IZX, ZEP, ZEP, ZEP, ZEP, IMP, IMM, IMP, IMM, ABS, ABS, ABS, ABS, // e0
        REL, IZY, IMP, IZY, ZPX, ZPX, ZPX, ZPX, IMP, ABY, IMP, ABY, ABX, ABX, ABX, ABX, // f0
    ]
};

impl Cpu {
    /// Consumes the operand bytes and resolves the effective address.
    pub(crate) fn addressing(&mut self, mode: AddrMode, bus: &mut dyn CpuBus) -> Operand {
        self.cross_page = false;

        let addr = match mode {
            AddrMode::IMP => return Operand::Implied,
            AddrMode::ACC => return Operand::Accumulator,
            AddrMode::IMM => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                addr
            }
            AddrMode::ZEP => self.fetch_byte(bus) as u16,
            AddrMode::ZPX => self.fetch_byte(bus).wrapping_add(self.x) as u16,
            AddrMode::ZPY => self.fetch_byte(bus).wrapping_add(self.y) as u16,
            AddrMode::IZX => {
                let ptr = self.fetch_byte(bus).wrapping_add(self.x);
                self.read_zp_word(ptr, bus)
            }
            AddrMode::IZY => {
                let ptr = self.fetch_byte(bus);
                let base = self.read_zp_word(ptr, bus);
                self.indexed(base, self.y)
            }
            AddrMode::ABS => self.fetch_word(bus),
            AddrMode::ABX => {
                let base = self.fetch_word(bus);
                self.indexed(base, self.x)
            }
            AddrMode::ABY => {
                let base = self.fetch_word(bus);
                self.indexed(base, self.y)
            }
            AddrMode::IND => {
                // the high byte is fetched without carrying into the next page
                let ptr = self.fetch_word(bus);
                let lb = bus.read(ptr) as u16;
                let hb = bus.read((ptr & 0xff00) | (ptr.wrapping_add(1) & 0x00ff)) as u16;
                (hb << 8) | lb
            }
            AddrMode::REL => {
                let rel = self.fetch_byte(bus);
                self.pc.wrapping_add(rel as i8 as u16)
            }
        };
        Operand::Memory(addr)
    }

    fn indexed(&mut self, base: u16, index: u8) -> u16 {
        let addr = base.wrapping_add(index as u16);
        self.cross_page = (base & 0xff00) != (addr & 0xff00);
        addr
    }

    fn read_zp_word(&mut self, ptr: u8, bus: &mut dyn CpuBus) -> u16 {
        let lb = bus.read(ptr as u16) as u16;
        let hb = bus.read(ptr.wrapping_add(1) as u16) as u16;
        (hb << 8) | lb
    }
}
