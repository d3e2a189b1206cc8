use super::{Cpu, CpuBus, Interrupt, Status};

/// An operation together with the shape of its operand.
#[derive(Clone, Copy)]
pub enum OpKind {
    /// consumes the operand value
    Read(fn(&mut Cpu, u8)),
    /// read, modify and write back to memory or the accumulator
    Modify(fn(&mut Cpu, u8) -> u8),
    /// stores a register, the target is never read
    Write(fn(&Cpu) -> u8),
    /// branches and jumps, given the resolved target
    Control(fn(&mut Cpu, &mut dyn CpuBus, u16)),
    Implied(fn(&mut Cpu, &mut dyn CpuBus)),
}

#[rustfmt::skip]
pub const OP_KINDS: [OpKind; 256] = {
    use OpKind::*;
    [
        Implied(Cpu::brk), Read(Cpu::ora),    Implied(Cpu::nop), Modify(Cpu::slo),  Read(Cpu::ign),    Read(Cpu::ora),    Modify(Cpu::asl),  Modify(Cpu::slo),  Implied(Cpu::php), Read(Cpu::ora),    Modify(Cpu::asl),  Implied(Cpu::nop), Read(Cpu::ign),    Read(Cpu::ora),    Modify(Cpu::asl),  Modify(Cpu::slo), // 00
        Control(Cpu::bpl), Read(Cpu::ora),    Implied(Cpu::nop), Modify(Cpu::slo),  Read(Cpu::ign),    Read(Cpu::ora),    Modify(Cpu::asl),  Modify(Cpu::slo),  Implied(Cpu::clc), Read(Cpu::ora),    Implied(Cpu::nop), Modify(Cpu::slo),  Read(Cpu::ign),    Read(Cpu::ora),    Modify(Cpu::asl),  Modify(Cpu::slo), // 10
        Control(Cpu::jsr), Read(Cpu::and),    Implied(Cpu::nop), Modify(Cpu::rla),  Read(Cpu::bit),    Read(Cpu::and),    Modify(Cpu::rol),  Modify(Cpu::rla),  Implied(Cpu::plp), Read(Cpu::and),    Modify(Cpu::rol),  Implied(Cpu::nop), Read(Cpu::bit),    Read(Cpu::and),    Modify(Cpu::rol),  Modify(Cpu::rla), // 20
        Control(Cpu::bmi), Read(Cpu::and),    Implied(Cpu::nop), Modify(Cpu::rla),  Read(Cpu::ign),    Read(Cpu::and),    Modify(Cpu::rol),  Modify(Cpu::rla),  Implied(Cpu::sec), Read(Cpu::and),    Implied(Cpu::nop), Modify(Cpu::rla),  Read(Cpu::ign),    Read(Cpu::and),    Modify(Cpu::rol),  Modify(Cpu::rla), // 30
        Implied(Cpu::rti), Read(Cpu::eor),    Implied(Cpu::nop), Modify(Cpu::sre),  Read(Cpu::ign),    Read(Cpu::eor),    Modify(Cpu::lsr),  Modify(Cpu::sre),  Implied(Cpu::pha), Read(Cpu::eor),    Modify(Cpu::lsr),  Implied(Cpu::nop), Control(Cpu::jmp), Read(Cpu::eor),    Modify(Cpu::lsr),  Modify(Cpu::sre), // 40
        Control(Cpu::bvc), Read(Cpu::eor),    Implied(Cpu::nop), Modify(Cpu::sre),  Read(Cpu::ign),    Read(Cpu::eor),    Modify(Cpu::lsr),  Modify(Cpu::sre),  Implied(Cpu::cli), Read(Cpu::eor),    Implied(Cpu::nop), Modify(Cpu::sre),  Read(Cpu::ign),    Read(Cpu::eor),    Modify(Cpu::lsr),  Modify(Cpu::sre), // 50
        Implied(Cpu::rts), Read(Cpu::adc),    Implied(Cpu::nop), Modify(Cpu::rra),  Read(Cpu::ign),    Read(Cpu::adc),    Modify(Cpu::ror),  Modify(Cpu::rra),  Implied(Cpu::pla), Read(Cpu::adc),    Modify(Cpu::ror),  Implied(Cpu::nop), Control(Cpu::jmp), Read(Cpu::adc),    Modify(Cpu::ror),  Modify(Cpu::rra), // 60
        Control(Cpu::bvs), Read(Cpu::adc),    Implied(Cpu::nop), Modify(Cpu::rra),  Read(Cpu::ign),    Read(Cpu::adc),    Modify(Cpu::ror),  Modify(Cpu::rra),  Implied(Cpu::sei), Read(Cpu::adc),    Implied(Cpu::nop), Modify(Cpu::rra),  Read(Cpu::ign),    Read(Cpu::adc),    Modify(Cpu::ror),  Modify(Cpu::rra), // 70
        Read(Cpu::ign),    Write(Cpu::sta),   Read(Cpu::ign),    Write(Cpu::sax),   Write(Cpu::sty),   Write(Cpu::sta),   Write(Cpu::stx),   Write(Cpu::sax),   Implied(Cpu::dey), Read(Cpu::ign),    Implied(Cpu::txa), Implied(Cpu::nop), Write(Cpu::sty),   Write(Cpu::sta),   Write(Cpu::stx),   Write(Cpu::sax), // 80
        Control(Cpu::bcc), Write(Cpu::sta),   Implied(Cpu::nop), Implied(Cpu::nop), Write(Cpu::sty),   Write(Cpu::sta),   Write(Cpu::stx),   Write(Cpu::sax),   Implied(Cpu::tya), Write(Cpu::sta),   Implied(Cpu::txs), Implied(Cpu::nop), Implied(Cpu::nop), Write(Cpu::sta),   Implied(Cpu::nop), Implied(Cpu::nop), // 90
        Read(Cpu::ldy),    Read(Cpu::lda),    Read(Cpu::ldx),    Read(Cpu::lax),    Read(Cpu::ldy),    Read(Cpu::lda),    Read(Cpu::ldx),    Read(Cpu::lax),    Implied(Cpu::tay), Read(Cpu::lda),    Implied(Cpu::tax), Read(Cpu::lax),    Read(Cpu::ldy),    Read(Cpu::lda),    Read(Cpu::ldx),    Read(Cpu::lax), // a0
        Control(Cpu::bcs), Read(Cpu::lda),    Implied(Cpu::nop), Read(Cpu::lax),    Read(Cpu::ldy),    Read(Cpu::lda),    Read(Cpu::ldx),    Read(Cpu::lax),    Implied(Cpu::clv), Read(Cpu::lda),    Implied(Cpu::tsx), Implied(Cpu::nop), Read(Cpu::ldy),    Read(Cpu::lda),    Read(Cpu::ldx),    Read(Cpu::lax), // b0
        Read(Cpu::cpy),    Read(Cpu::cmp),    Read(Cpu::ign),    Modify(Cpu::dcp),  Read(Cpu::cpy),    Read(Cpu::cmp),    Modify(Cpu::dec),  Modify(Cpu::dcp),  Implied(Cpu::iny), Read(Cpu::cmp),    Implied(Cpu::dex), Implied(Cpu::nop), Read(Cpu::cpy),    Read(Cpu::cmp),    Modify(Cpu::dec),  Modify(Cpu::dcp), // c0
        Control(Cpu::bne), Read(Cpu::cmp),    Implied(Cpu::nop), Modify(Cpu::dcp),  Read(Cpu::ign),    Read(Cpu::cmp),    Modify(Cpu::dec),  Modify(Cpu::dcp),  Implied(Cpu::cld), Read(Cpu::cmp),    Implied(Cpu::nop), Modify(Cpu::dcp),  Read(Cpu::ign),    Read(Cpu::cmp),    Modify(Cpu::dec),  Modify(Cpu::dcp), // d0
        Read(Cpu::cpx),    Read(Cpu::sbc),    Read(Cpu::ign),    Modify(Cpu::isc),  Read(Cpu::cpx),    Read(Cpu::sbc),    Modify(Cpu::inc),  Modify(Cpu::isc),  Implied(Cpu::inx), Read(Cpu::sbc),    Implied(Cpu::nop), Read(Cpu::sbc),    Read(Cpu::cpx),    Read(Cpu::sbc),    Modify(Cpu::inc),  Modify(Cpu::isc), // e0
        Control(Cpu::beq), Read(Cpu::sbc),    Implied(Cpu::nop), Modify(Cpu::isc),  Read(Cpu::ign),    Read(Cpu::sbc),    Modify(Cpu::inc),  Modify(Cpu::isc),  Implied(Cpu::sed), Read(Cpu::sbc),    Implied(Cpu::nop), Modify(Cpu::isc),  Read(Cpu::ign),    Read(Cpu::sbc),    Modify(Cpu::inc),  Modify(Cpu::isc), // f0
    ]
};

#[rustfmt::skip]
pub const OP_NAMES: [&str; 256] = [
//   00     01     02     03     04     05     06     07     08     09     0a     0b     0c     0d     0e     0f
    "BRK", "ORA", "XXX", "SLO", "NOP", "ORA", "ASL", "SLO", "PHP", "ORA", "ASL", "ANC", "NOP", "ORA", "ASL", "SLO", // 00
    "BPL", "ORA", "XXX", "SLO", "NOP", "ORA", "ASL", "SLO", "CLC", "ORA", "NOP", "SLO", "NOP", "ORA", "ASL", "SLO", // 10
    "JSR", "AND", "XXX", "RLA", "BIT", "AND", "ROL", "RLA", "PLP", "AND", "ROL", "ANC", "BIT", "AND", "ROL", "RLA", // 20
    "BMI", "AND", "XXX", "RLA", "NOP", "AND", "ROL", "RLA", "SEC", "AND", "NOP", "RLA", "NOP", "AND", "ROL", "RLA", // 30
    "RTI", "EOR", "XXX", "SRE", "NOP", "EOR", "LSR", "SRE", "PHA", "EOR", "LSR", "ALR", "JMP", "EOR", "LSR", "SRE", // 40
    "BVC", "EOR", "XXX", "SRE", "NOP", "EOR", "LSR", "SRE", "CLI", "EOR", "NOP", "SRE", "NOP", "EOR", "LSR", "SRE", // 50
    "RTS", "ADC", "XXX", "RRA", "NOP", "ADC", "ROR", "RRA", "PLA", "ADC", "ROR", "ARR", "JMP", "ADC", "ROR", "RRA", // 60
    "BVS", "ADC", "XXX", "RRA", "NOP", "ADC", "ROR", "RRA", "SEI", "ADC", "NOP", "RRA", "NOP", "ADC", "ROR", "RRA", // 70
    "NOP", "STA", "NOP", "SAX", "STY", "STA", "STX", "SAX", "DEY", "NOP", "TXA", "XAA", "STY", "STA", "STX", "SAX", // 80
    "BCC", "STA", "XXX", "AHX", "STY", "STA", "STX", "SAX", "TYA", "STA", "TXS", "TAS", "SHY", "STA", "SHX", "AHX", // 90
    "LDY", "LDA", "LDX", "LAX", "LDY", "LDA", "LDX", "LAX", "TAY", "LDA", "TAX", "LAX", "LDY", "LDA", "LDX", "LAX", // a0
    "BCS", "LDA", "XXX", "LAX", "LDY", "LDA", "LDX", "LAX", "CLV", "LDA", "TSX", "LAS", "LDY", "LDA", "LDX", "LAX", // b0
    "CPY", "CMP", "NOP", "DCP", "CPY", "CMP", "DEC", "DCP", "INY", "CMP", "DEX", "AXS", "CPY", "CMP", "DEC", "DCP", // c0
    "BNE", "CMP", "XXX", "DCP", "NOP", "CMP", "DEC", "DCP", "CLD", "CMP", "NOP", "DCP", "NOP", "CMP", "DEC", "DCP", // d0
    "CPX", "SBC", "NOP", "ISC", "CPX", "SBC", "INC", "ISC", "INX", "SBC", "NOP", "SBC", "CPX", "SBC", "INC", "ISC", // e0
    "BEQ", "SBC", "XXX", "ISC", "NOP", "SBC", "INC", "ISC", "SED", "SBC", "NOP", "ISC", "NOP", "SBC", "INC", "ISC", // f0
];

/// base cycles, unimplemented opcodes declare 0
#[rustfmt::skip]
pub const OP_CYCLES: [u8; 256] = [
//  0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f
    0, 6, 0, 8, 3, 3, 5, 5, 3, 2, 2, 2, 4, 4, 6, 6, // 00
    2, 5, 0, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 10
    6, 6, 0, 8, 3, 3, 5, 5, 4, 2, 2, 2, 4, 4, 6, 6, // 20
    2, 5, 0, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 30
    6, 6, 0, 8, 4, 3, 5, 5, 3, 2, 2, 2, 3, 4, 6, 6, // 40
    2, 5, 0, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 50
    6, 6, 0, 8, 3, 3, 5, 5, 4, 2, 2, 2, 5, 4, 6, 6, // 60
    2, 5, 0, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 70
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4, // 80
    2, 6, 0, 6, 4, 4, 4, 4, 2, 5, 2, 5, 5, 5, 5, 5, // 90
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4, // a0
    2, 5, 0, 5, 4, 4, 4, 4, 2, 4, 2, 4, 4, 4, 4, 4, // b0
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6, // c0
    2, 5, 0, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // d0
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6, // e0
    2, 5, 0, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // f0
];

/// one more cycle when indexing crosses a page
#[rustfmt::skip]
pub const OP_PAGE_PENALTY: [u8; 256] = [
//  0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 00
    0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 1, 0, 0, // 10
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 20
    0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 1, 0, 0, // 30
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 40
    0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 1, 0, 0, // 50
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 60
    0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 1, 0, 0, // 70
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 80
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 90
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // a0
    0, 1, 0, 1, 0, 0, 0, 0, 0, 1, 0, 1, 1, 1, 1, 1, // b0
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // c0
    0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, // d0
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // e0
    0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 1, 0, 0, // f0
];

/// arith
impl Cpu {
    fn adc(&mut self, v: u8) {
        self.add_with_carry(v);
    }

    fn sbc(&mut self, v: u8) {
        self.add_with_carry(!v);
    }

    fn and(&mut self, v: u8) {
        self.a &= v;
        self.p.set_zn(self.a);
    }

    fn ora(&mut self, v: u8) {
        self.a |= v;
        self.p.set_zn(self.a);
    }

    fn eor(&mut self, v: u8) {
        self.a ^= v;
        self.p.set_zn(self.a);
    }

    fn inc(&mut self, v: u8) -> u8 {
        let v = v.wrapping_add(1);
        self.p.set_zn(v);
        v
    }

    fn dec(&mut self, v: u8) -> u8 {
        let v = v.wrapping_sub(1);
        self.p.set_zn(v);
        v
    }

    fn inx(&mut self, _: &mut dyn CpuBus) {
        self.x = self.x.wrapping_add(1);
        self.p.set_zn(self.x);
    }

    fn iny(&mut self, _: &mut dyn CpuBus) {
        self.y = self.y.wrapping_add(1);
        self.p.set_zn(self.y);
    }

    fn dex(&mut self, _: &mut dyn CpuBus) {
        self.x = self.x.wrapping_sub(1);
        self.p.set_zn(self.x);
    }

    fn dey(&mut self, _: &mut dyn CpuBus) {
        self.y = self.y.wrapping_sub(1);
        self.p.set_zn(self.y);
    }

    fn asl(&mut self, v: u8) -> u8 {
        self.p.set(Status::C, v & 0x80 != 0);
        let v = v << 1;
        self.p.set_zn(v);
        v
    }

    fn lsr(&mut self, v: u8) -> u8 {
        self.p.set(Status::C, v & 0x01 != 0);
        let v = v >> 1;
        self.p.set_zn(v);
        v
    }

    fn rol(&mut self, v: u8) -> u8 {
        let c = self.p.carry();
        self.p.set(Status::C, v & 0x80 != 0);
        let v = (v << 1) | c;
        self.p.set_zn(v);
        v
    }

    fn ror(&mut self, v: u8) -> u8 {
        let c = self.p.carry();
        self.p.set(Status::C, v & 0x01 != 0);
        let v = (v >> 1) | (c << 7);
        self.p.set_zn(v);
        v
    }
}

/// branch and jump
impl Cpu {
    fn brk(&mut self, bus: &mut dyn CpuBus) {
        self.interrupt(Interrupt::BRK, bus);
    }

    fn bcc(&mut self, _: &mut dyn CpuBus, target: u16) {
        self.branch(!self.p.contains(Status::C), target);
    }

    fn bcs(&mut self, _: &mut dyn CpuBus, target: u16) {
        self.branch(self.p.contains(Status::C), target);
    }

    fn beq(&mut self, _: &mut dyn CpuBus, target: u16) {
        self.branch(self.p.contains(Status::Z), target);
    }

    fn bmi(&mut self, _: &mut dyn CpuBus, target: u16) {
        self.branch(self.p.contains(Status::N), target);
    }

    fn bne(&mut self, _: &mut dyn CpuBus, target: u16) {
        self.branch(!self.p.contains(Status::Z), target);
    }

    fn bpl(&mut self, _: &mut dyn CpuBus, target: u16) {
        self.branch(!self.p.contains(Status::N), target);
    }

    fn bvc(&mut self, _: &mut dyn CpuBus, target: u16) {
        self.branch(!self.p.contains(Status::V), target);
    }

    fn bvs(&mut self, _: &mut dyn CpuBus, target: u16) {
        self.branch(self.p.contains(Status::V), target);
    }

    fn jmp(&mut self, _: &mut dyn CpuBus, target: u16) {
        self.pc = target;
    }

    fn jsr(&mut self, bus: &mut dyn CpuBus, target: u16) {
        self.push_word(self.pc.wrapping_sub(1), bus);
        self.pc = target;
    }

    fn rti(&mut self, bus: &mut dyn CpuBus) {
        self.p = Status::from_stack(self.pop_byte(bus));
        self.pc = self.pop_word(bus);
    }

    fn rts(&mut self, bus: &mut dyn CpuBus) {
        self.pc = self.pop_word(bus).wrapping_add(1);
    }
}

/// move
impl Cpu {
    fn lda(&mut self, v: u8) {
        self.a = v;
        self.p.set_zn(v);
    }

    fn ldx(&mut self, v: u8) {
        self.x = v;
        self.p.set_zn(v);
    }

    fn ldy(&mut self, v: u8) {
        self.y = v;
        self.p.set_zn(v);
    }

    fn pha(&mut self, bus: &mut dyn CpuBus) {
        self.push_byte(self.a, bus);
    }

    fn php(&mut self, bus: &mut dyn CpuBus) {
        self.push_byte((self.p | Status::B | Status::U).bits(), bus);
    }

    fn pla(&mut self, bus: &mut dyn CpuBus) {
        self.a = self.pop_byte(bus);
        self.p.set_zn(self.a);
    }

    fn plp(&mut self, bus: &mut dyn CpuBus) {
        self.p = Status::from_stack(self.pop_byte(bus));
    }

    fn sta(&self) -> u8 {
        self.a
    }

    fn stx(&self) -> u8 {
        self.x
    }

    fn sty(&self) -> u8 {
        self.y
    }

    fn tax(&mut self, _: &mut dyn CpuBus) {
        self.x = self.a;
        self.p.set_zn(self.x);
    }

    fn tay(&mut self, _: &mut dyn CpuBus) {
        self.y = self.a;
        self.p.set_zn(self.y);
    }

    fn tsx(&mut self, _: &mut dyn CpuBus) {
        self.x = self.sp;
        self.p.set_zn(self.x);
    }

    fn txs(&mut self, _: &mut dyn CpuBus) {
        self.sp = self.x;
    }

    fn txa(&mut self, _: &mut dyn CpuBus) {
        self.a = self.x;
        self.p.set_zn(self.a);
    }

    fn tya(&mut self, _: &mut dyn CpuBus) {
        self.a = self.y;
        self.p.set_zn(self.a);
    }
}

/// flags
impl Cpu {
    fn bit(&mut self, v: u8) {
        self.p.set(Status::Z, self.a & v == 0);
        self.p.set(Status::N, v & 0x80 != 0);
        self.p.set(Status::V, v & 0x40 != 0);
    }

    fn cmp(&mut self, v: u8) {
        self.compare(self.a, v);
    }

    fn cpx(&mut self, v: u8) {
        self.compare(self.x, v);
    }

    fn cpy(&mut self, v: u8) {
        self.compare(self.y, v);
    }

    fn clc(&mut self, _: &mut dyn CpuBus) {
        self.p.remove(Status::C);
    }

    fn cld(&mut self, _: &mut dyn CpuBus) {
        self.p.remove(Status::D);
    }

    fn cli(&mut self, _: &mut dyn CpuBus) {
        self.p.remove(Status::I);
    }

    fn clv(&mut self, _: &mut dyn CpuBus) {
        self.p.remove(Status::V);
    }

    fn sec(&mut self, _: &mut dyn CpuBus) {
        self.p.insert(Status::C);
    }

    fn sed(&mut self, _: &mut dyn CpuBus) {
        self.p.insert(Status::D);
    }

    fn sei(&mut self, _: &mut dyn CpuBus) {
        self.p.insert(Status::I);
    }

    /// also stands in for the unofficial opcodes that are not emulated
    fn nop(&mut self, _: &mut dyn CpuBus) {}

    /// unofficial NOPs with an operand, which is still read
    fn ign(&mut self, _: u8) {}
}

/// unofficial
impl Cpu {
    fn lax(&mut self, v: u8) {
        self.a = v;
        self.x = v;
        self.p.set_zn(v);
    }

    fn sax(&self) -> u8 {
        self.a & self.x
    }

    fn dcp(&mut self, v: u8) -> u8 {
        let v = v.wrapping_sub(1);
        self.compare(self.a, v);
        v
    }

    fn isc(&mut self, v: u8) -> u8 {
        let v = v.wrapping_add(1);
        self.add_with_carry(!v);
        v
    }

    fn slo(&mut self, v: u8) -> u8 {
        let v = self.asl(v);
        self.ora(v);
        v
    }

    fn rla(&mut self, v: u8) -> u8 {
        let v = self.rol(v);
        self.and(v);
        v
    }

    fn sre(&mut self, v: u8) -> u8 {
        let v = self.lsr(v);
        self.eor(v);
        v
    }

    fn rra(&mut self, v: u8) -> u8 {
        let v = self.ror(v);
        self.add_with_carry(v);
        v
    }
}

impl Cpu {
    fn add_with_carry(&mut self, v: u8) {
        let sum = self.a as u16 + v as u16 + self.p.carry() as u16;
        let result = sum as u8;

        self.p.set(Status::C, sum > 0xff);
        self.p.set(Status::V, (self.a ^ result) & (v ^ result) & 0x80 != 0);
        self.a = result;
        self.p.set_zn(result);
    }

    fn compare(&mut self, reg: u8, v: u8) {
        self.p.set(Status::C, reg >= v);
        self.p.set_zn(reg.wrapping_sub(v));
    }

    /// +1 cycle when taken, +2 when the target is on another page
    fn branch(&mut self, taken: bool, target: u16) {
        if taken {
            self.skip += if (self.pc & 0xff00) != (target & 0xff00) {
                2
            } else {
                1
            };
            self.pc = target;
        }
    }
}
