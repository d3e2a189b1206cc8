use crate::state::{StateError, StateReader, StateWriter};
use bit_field::BitField;

const FRAME_FREQUENCY: f32 = 240.0;
const FRAME_PERIOD: f32 = crate::CPU_FREQUENCY / FRAME_FREQUENCY;

// mode 0:    mode 1:       function
// ---------  -----------  -----------------------------
//  - - - f    - - - - -    IRQ (if bit 6 is clear)
//  - l - l    - l - - l    Length counter and sweep
//  e e e e    e e e - e    Envelope and linear counter

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Step4,
    Step5,
}

bitflags::bitflags! {
    pub struct Step: u8 {
        const LENGTH   = 0b01;
        const ENVELOPE = 0b10;
    }
}

#[derive(Debug)]
pub struct FrameCounter {
    counter: f32,
    step: u8,
    mode: Mode,
    irq_inhibit: bool,
    irq_level: bool,
}

impl FrameCounter {
    pub const STATE_SIZE: usize = 8;

    pub fn new() -> Self {
        Self {
            counter: FRAME_PERIOD,
            step: 0,
            mode: Mode::Step4,
            irq_inhibit: false,
            irq_level: false,
        }
    }

    /// CPU cycle clock, returns the units to clock this cycle
    pub fn tick(&mut self) -> Step {
        let mut units = Step::empty();

        self.counter -= 1.0;
        if self.counter >= 1.0 {
            return units;
        }
        self.counter += FRAME_PERIOD;

        let step = self.step;
        match self.mode {
            Mode::Step4 => {
                self.step = (step + 1) % 4;
                units.set(Step::LENGTH, step == 1 || step == 3);
                units.insert(Step::ENVELOPE);
                if step == 3 && !self.irq_inhibit {
                    self.irq_level = true;
                }
            }
            Mode::Step5 => {
                self.step = (step + 1) % 5;
                units.set(Step::LENGTH, step == 1 || step == 4);
                units.set(Step::ENVELOPE, step != 3);
            }
        }
        units
    }

    /// $4017 write, `MI-- ----`
    pub fn load(&mut self, data: u8) {
        self.step = 0;
        self.counter = FRAME_PERIOD;

        self.mode = if data.get_bit(7) {
            Mode::Step5
        } else {
            Mode::Step4
        };

        self.irq_inhibit = data.get_bit(6);
        if self.irq_inhibit {
            self.irq_level = false;
        }
    }

    pub fn irq(&self) -> bool {
        self.irq_level
    }

    pub fn ack_irq(&mut self) {
        self.irq_level = false;
    }

    pub fn save(&self, w: &mut StateWriter) {
        w.write_f32(self.counter);
        w.write_u8(self.step);
        w.write_bool(self.mode == Mode::Step5);
        w.write_bool(self.irq_inhibit);
        w.write_bool(self.irq_level);
    }

    pub fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        let counter = r.read_f32()?;
        self.counter = if counter.is_finite() {
            counter.clamp(0.0, FRAME_PERIOD)
        } else {
            FRAME_PERIOD
        };
        self.step = r.read_u8()? % 5;
        self.mode = if r.read_bool()? {
            Mode::Step5
        } else {
            self.step %= 4;
            Mode::Step4
        };
        self.irq_inhibit = r.read_bool()?;
        self.irq_level = r.read_bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs until `quarters` sequencer steps have fired.
    fn run_quarters(fc: &mut FrameCounter, quarters: usize) -> Vec<Step> {
        (0..quarters)
            .map(|_| loop {
                let before = fc.counter;
                let s = fc.tick();
                if fc.counter > before {
                    break s;
                }
            })
            .collect()
    }

    #[test]
    fn test_four_step() {
        let mut fc = FrameCounter::new();
        let steps = run_quarters(&mut fc, 4);
        let len: Vec<bool> = steps.iter().map(|s| s.contains(Step::LENGTH)).collect();
        assert_eq!(len, [false, true, false, true]);
        assert!(steps.iter().all(|s| s.contains(Step::ENVELOPE)));
        assert!(fc.irq());

        fc.ack_irq();
        assert!(!fc.irq());
    }

    #[test]
    fn test_five_step() {
        let mut fc = FrameCounter::new();
        fc.load(0x80);
        let steps = run_quarters(&mut fc, 5);
        let len: Vec<bool> = steps.iter().map(|s| s.contains(Step::LENGTH)).collect();
        let env: Vec<bool> = steps.iter().map(|s| s.contains(Step::ENVELOPE)).collect();
        assert_eq!(len, [false, true, false, false, true]);
        assert_eq!(env, [true, true, true, false, true]);
        assert!(!fc.irq());
    }

    #[test]
    fn test_inhibit_clears_irq() {
        let mut fc = FrameCounter::new();
        run_quarters(&mut fc, 4);
        assert!(fc.irq());
        fc.load(0x40);
        assert!(!fc.irq());
        run_quarters(&mut fc, 4);
        assert!(!fc.irq());
    }
}
