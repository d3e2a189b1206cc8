use crate::state::{Snapshot, StateError, StateReader, StateWriter};
use addressing::{Operand, ADDR_MODES};
use op_code::{OpKind, OP_CYCLES, OP_KINDS, OP_NAMES, OP_PAGE_PENALTY};
use status::Status;

mod addressing;
mod op_code;
mod status;

const NMI_VECTOR: u16 = 0xfffa;
const RESET_VECTOR: u16 = 0xfffc;
const IRQ_VECTOR: u16 = 0xfffe;

const INTERRUPT_CYCLES: u16 = 7;
const OAM_DMA_CYCLES: u16 = 513;

/// CPU side of the system bus.
pub trait CpuBus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, data: u8);
    /// Reads without side effects, used for tracing.
    fn inspect(&self, addr: u16) -> u8;
}

bitflags::bitflags! {
    /// Pending interrupt lines.
    #[derive(Default)]
    pub struct Interrupt: u8 {
        const IRQ = 1 << 0;
        const BRK = 1 << 1;
        const NMI = 1 << 2;
    }
}

/// 6502 core advanced one clock cycle at a time.
///
/// An instruction runs completely on its first cycle and then idles for the
/// rest of its cycle count in `skip`.
pub struct Cpu {
    a: u8,
    x: u8,
    y: u8,
    pc: u16,
    sp: u8,
    p: Status,

    latch: Interrupt,
    skip: u16,
    cross_page: bool,
    in_interrupt: bool,
    interrupt_kind: Interrupt,
    cycles: u64,

    trace: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: 0xfd,
            p: Status::POWER_ON,

            latch: Interrupt::empty(),
            skip: 0,
            cross_page: false,
            in_interrupt: false,
            interrupt_kind: Interrupt::IRQ,
            cycles: 0,

            trace: false,
        }
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn reset(&mut self, bus: &mut dyn CpuBus) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xfd;
        self.p = Status::POWER_ON;
        self.pc = self.read_word(RESET_VECTOR, bus);

        self.latch = Interrupt::empty();
        self.skip = 0;
        self.cross_page = false;
        self.in_interrupt = false;
        self.cycles = 0;
    }

    pub fn step(&mut self, bus: &mut dyn CpuBus) {
        self.cycles += 1;

        if self.skip > 0 {
            // an NMI arriving early in an IRQ/BRK sequence takes over its vector
            if self.in_interrupt
                && self.skip >= 2
                && self.interrupt_kind.intersects(Interrupt::IRQ | Interrupt::BRK)
                && self.latch.contains(Interrupt::NMI)
            {
                self.pc = self.read_word(NMI_VECTOR, bus);
                self.latch.remove(Interrupt::NMI);
            }
            self.skip -= 1;
            return;
        }

        if !self.latch.is_empty() && !self.in_interrupt {
            let kind = if self.latch.contains(Interrupt::NMI) {
                Some(Interrupt::NMI)
            } else if self.latch.contains(Interrupt::IRQ) && !self.p.contains(Status::I) {
                Some(Interrupt::IRQ)
            } else {
                None
            };
            if let Some(kind) = kind {
                self.interrupt(kind, bus);
                self.latch = Interrupt::empty();
                self.skip -= 1;
                return;
            }
        }
        // at least one instruction runs between two interrupts
        self.in_interrupt = false;

        if self.trace && tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!("{}", self.disassemble(&*bus));
        }

        let op = self.fetch_byte(bus);
        self.execute(op, bus);
        self.skip = self.skip.saturating_sub(1);
    }

    /// Latches an NMI edge.
    pub fn nmi(&mut self) {
        self.latch.insert(Interrupt::NMI);
    }

    /// Level of the shared IRQ line, refreshed every cycle.
    pub fn set_irq_line(&mut self, level: bool) {
        self.latch.set(Interrupt::IRQ, level);
    }

    pub fn add_dma_stall(&mut self) {
        self.skip += OAM_DMA_CYCLES + (self.cycles & 1) as u16;
    }

    pub fn stall(&mut self, cycles: u16) {
        self.skip += cycles;
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    pub fn a(&self) -> u8 {
        self.a
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn y(&self) -> u8 {
        self.y
    }

    pub fn status(&self) -> u8 {
        self.p.bits()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// True between instructions, when the next step fetches an opcode.
    pub fn is_idle(&self) -> bool {
        self.skip == 0
    }

    pub fn disassemble(&self, bus: &dyn CpuBus) -> String {
        let op = bus.inspect(self.pc) as usize;
        let bytes = (0..=ADDR_MODES[op].operand_len())
            .map(|i| format!("{:02X}", bus.inspect(self.pc.wrapping_add(i))))
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            "{:04X}  {:<8}  {} A:{:02X} X:{:02X} Y:{:02X} P:{} SP:{:02X} CYC:{}",
            self.pc, bytes, OP_NAMES[op], self.a, self.x, self.y, self.p, self.sp, self.cycles
        )
    }
}

impl Cpu {
    fn execute(&mut self, op: u8, bus: &mut dyn CpuBus) {
        let op = op as usize;
        let operand = self.addressing(ADDR_MODES[op], bus);

        match (OP_KINDS[op], operand) {
            (OpKind::Read(f), Operand::Memory(addr)) => {
                let v = bus.read(addr);
                f(self, v);
            }
            (OpKind::Read(f), Operand::Accumulator) => {
                let a = self.a;
                f(self, a);
            }
            (OpKind::Modify(f), Operand::Memory(addr)) => {
                let v = bus.read(addr);
                let v = f(self, v);
                bus.write(addr, v);
            }
            (OpKind::Modify(f), Operand::Accumulator) => {
                let a = self.a;
                self.a = f(self, a);
            }
            (OpKind::Write(f), Operand::Memory(addr)) => bus.write(addr, f(self)),
            (OpKind::Control(f), Operand::Memory(addr)) => f(self, bus, addr),
            (OpKind::Implied(f), _) => f(self, bus),
            _ => tracing::trace!("opcode {:02x} has no operand", op),
        }

        self.skip += OP_CYCLES[op] as u16;
        if self.cross_page {
            self.skip += OP_PAGE_PENALTY[op] as u16;
        }
    }

    fn interrupt(&mut self, kind: Interrupt, bus: &mut dyn CpuBus) {
        self.in_interrupt = true;
        self.interrupt_kind = kind;

        if kind == Interrupt::BRK {
            self.pc = self.pc.wrapping_add(1);
        }
        self.push_word(self.pc, bus);

        let mut p = self.p | Status::U;
        p.set(Status::B, kind == Interrupt::BRK);
        self.push_byte(p.bits(), bus);
        self.p.insert(Status::I);

        let vector = if kind == Interrupt::NMI {
            NMI_VECTOR
        } else {
            IRQ_VECTOR
        };
        self.pc = self.read_word(vector, bus);
        self.skip += INTERRUPT_CYCLES;
    }

    fn fetch_byte(&mut self, bus: &mut dyn CpuBus) -> u8 {
        let b = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        b
    }

    fn fetch_word(&mut self, bus: &mut dyn CpuBus) -> u16 {
        let d = self.read_word(self.pc, bus);
        self.pc = self.pc.wrapping_add(2);
        d
    }

    fn read_word(&mut self, addr: u16, bus: &mut dyn CpuBus) -> u16 {
        let lb = bus.read(addr) as u16;
        let hb = bus.read(addr.wrapping_add(1)) as u16;
        (hb << 8) | lb
    }

    fn push_byte(&mut self, b: u8, bus: &mut dyn CpuBus) {
        bus.write(0x100 + self.sp as u16, b);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop_byte(&mut self, bus: &mut dyn CpuBus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x100 + self.sp as u16)
    }

    fn push_word(&mut self, w: u16, bus: &mut dyn CpuBus) {
        self.push_byte((w >> 8) as u8, bus);
        self.push_byte(w as u8, bus);
    }

    fn pop_word(&mut self, bus: &mut dyn CpuBus) -> u16 {
        let lb = self.pop_byte(bus) as u16;
        let hb = self.pop_byte(bus) as u16;
        (hb << 8) | lb
    }
}

impl Snapshot for Cpu {
    fn state_name(&self) -> &'static str {
        "cpu"
    }

    fn state_size(&self, _version: u32) -> usize {
        24
    }

    fn save_state(&self, w: &mut StateWriter) {
        w.write_u16(self.pc);
        w.write_u8(self.sp);
        w.write_u8(self.p.bits());
        w.write_u8(self.a);
        w.write_u8(self.x);
        w.write_u8(self.y);
        w.write_u8(self.latch.bits());
        w.write_u16(self.skip);
        w.write_bool(self.cross_page);
        w.write_bool(self.in_interrupt);
        w.write_u8(self.interrupt_kind.bits());
        w.write_u64(self.cycles);
        w.write_bytes(&[0; 3]);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>, _version: u32) -> Result<(), StateError> {
        let pc = r.read_u16()?;
        let sp = r.read_u8()?;
        let p = r.read_u8()?;
        let (a, x, y) = (r.read_u8()?, r.read_u8()?, r.read_u8()?);
        let latch = r.read_u8()?;
        let skip = r.read_u16()?;
        let cross_page = r.read_bool()?;
        let in_interrupt = r.read_bool()?;
        let kind = r.read_u8()?;
        let cycles = r.read_u64()?;
        r.read_bytes(&mut [0; 3])?;

        self.pc = pc;
        self.sp = sp;
        self.p = Status::from_bits_truncate(p) | Status::U;
        self.a = a;
        self.x = x;
        self.y = y;
        self.latch = Interrupt::from_bits_truncate(latch);
        self.skip = skip;
        self.cross_page = cross_page;
        self.in_interrupt = in_interrupt;
        self.interrupt_kind = Interrupt::from_bits_truncate(kind);
        self.cycles = cycles;
        Ok(())
    }
}
