use super::{Channel, Divider, Envelope, LengthCounter, Sweep};
use crate::state::{StateError, StateReader, StateWriter};
use bit_field::BitField;

const DUTY: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 1, 1, 1, 1, 1],
];

#[derive(Debug)]
pub struct Pulse {
    len_counter: LengthCounter,
    envelope: Envelope,
    sweep: Sweep,

    timer: Divider,
    duty: u8,
    step: u8,
}

impl Pulse {
    pub const STATE_SIZE: usize = LengthCounter::STATE_SIZE
        + Envelope::STATE_SIZE
        + Sweep::STATE_SIZE
        + Divider::STATE_SIZE
        + 2;

    /// `first` selects the one's complement sweep of pulse 1
    pub fn new(first: bool) -> Self {
        Self {
            len_counter: LengthCounter::new(),
            envelope: Envelope::new(),
            sweep: Sweep::new(first),

            timer: Divider::new(),
            duty: 0,
            step: 0,
        }
    }
}

impl Channel for Pulse {
    fn output(&self) -> u8 {
        if !self.len_counter.active() || self.sweep.muting(self.timer.period()) {
            return 0;
        }
        DUTY[self.duty as usize][self.step as usize] * self.envelope.volume()
    }

    fn clock_timer(&mut self) {
        if self.timer.tick() {
            self.step = (self.step + 1) % 8;
        }
    }

    fn clock_quarter(&mut self) {
        self.envelope.tick();
    }

    fn clock_half(&mut self) {
        self.len_counter.tick();
        self.sweep.tick(&mut self.timer);
    }

    fn write(&mut self, reg: u16, data: u8) {
        match reg {
            0 => {
                self.duty = data.get_bits(6..8);
                self.len_counter.set_halt(data.get_bit(5));
                self.envelope.load(data);
            }
            1 => self.sweep.load(data),
            2 => self.timer.set_period_low(data),
            _ => {
                self.timer.set_period_high(data);
                self.len_counter.load(data);
                self.envelope.restart();
                self.step = 0;
            }
        }
    }

    fn set_enable(&mut self, enable: bool) {
        self.len_counter.set_enable(enable);
    }

    fn enabled(&self) -> bool {
        self.len_counter.active()
    }

    fn save(&self, w: &mut StateWriter) {
        self.len_counter.save(w);
        self.envelope.save(w);
        self.sweep.save(w);
        self.timer.save(w);
        w.write_u8(self.duty);
        w.write_u8(self.step);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.len_counter.load_state(r)?;
        self.envelope.load_state(r)?;
        self.sweep.load_state(r)?;
        self.timer.load_state(r)?;
        self.duty = r.read_u8()? & 0b11;
        self.step = r.read_u8()? & 0b111;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_output() {
        let mut p = Pulse::new(false);
        p.set_enable(true);
        p.write(0, 0b1011_1010); // duty 2, halt, constant volume 10
        p.write(2, 0x00);
        p.write(3, 0x09); // period 0x100, length index 1

        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(p.output());
            for _ in 0..=0x100 {
                p.clock_timer();
            }
        }
        assert_eq!(seen, [0, 10, 10, 10, 10, 0, 0, 0]);

        // periods below 8 are silenced by the sweep unit
        p.write(2, 0x05);
        p.write(3, 0x08);
        assert_eq!(p.output(), 0);

        p.set_enable(false);
        assert!(!p.enabled());
    }
}
