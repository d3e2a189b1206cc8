use super::{Channel, Divider, Envelope, LengthCounter};
use crate::state::{StateError, StateReader, StateWriter};
use bit_field::BitField;

/// NTSC periods in CPU cycles
const PERIOD: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

#[derive(Debug)]
pub struct Noise {
    envelope: Envelope,
    len_counter: LengthCounter,

    timer: Divider,
    lfsr: u16,
    short_mode: bool,
}

impl Noise {
    pub const STATE_SIZE: usize =
        Envelope::STATE_SIZE + LengthCounter::STATE_SIZE + Divider::STATE_SIZE + 3;

    pub fn new() -> Self {
        Self {
            envelope: Envelope::new(),
            len_counter: LengthCounter::new(),

            timer: Divider::new(),
            lfsr: 1,
            short_mode: false,
        }
    }
}

impl Channel for Noise {
    fn output(&self) -> u8 {
        if !self.len_counter.active() || self.lfsr.get_bit(0) {
            return 0;
        }
        self.envelope.volume()
    }

    fn clock_timer(&mut self) {
        if self.timer.tick() {
            let tap = if self.short_mode { 6 } else { 1 };
            let feed = self.lfsr.get_bit(0) ^ self.lfsr.get_bit(tap);
            self.lfsr >>= 1;
            self.lfsr.set_bit(14, feed);
        }
    }

    fn clock_quarter(&mut self) {
        self.envelope.tick();
    }

    fn clock_half(&mut self) {
        self.len_counter.tick();
    }

    fn write(&mut self, reg: u16, data: u8) {
        match reg {
            0 => {
                self.len_counter.set_halt(data.get_bit(5));
                self.envelope.load(data);
            }
            1 => {}
            2 => {
                self.short_mode = data.get_bit(7);
                self.timer
                    .set_period(PERIOD[data.get_bits(0..4) as usize] - 1);
            }
            _ => {
                self.len_counter.load(data);
                self.envelope.restart();
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
        self.envelope.save(w);
        self.len_counter.save(w);
        self.timer.save(w);
        w.write_u16(self.lfsr);
        w.write_bool(self.short_mode);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.envelope.load_state(r)?;
        self.len_counter.load_state(r)?;
        self.timer.load_state(r)?;
        // an all-zero register would lock up
        self.lfsr = (r.read_u16()? & 0x7fff).max(1);
        self.short_mode = r.read_bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lfsr_sequence() {
        let mut n = Noise::new();
        n.write(2, 0x00);

        // first shifts from the power-on seed
        let mut states = Vec::new();
        for _ in 0..3 {
            for _ in 0..4 {
                n.clock_timer();
            }
            states.push(n.lfsr);
        }
        assert_eq!(states, [0x4000, 0x2000, 0x1000]);

        // long mode has a period of 32767 shifts
        let mut n = Noise::new();
        n.write(2, 0x00);
        let start = n.lfsr;
        let mut shifts = 0;
        loop {
            for _ in 0..4 {
                n.clock_timer();
            }
            shifts += 1;
            if n.lfsr == start {
                break;
            }
        }
        assert_eq!(shifts, 32767);
    }

    #[test]
    fn test_noise_output() {
        let mut n = Noise::new();
        n.set_enable(true);
        n.write(0, 0x1f);
        n.write(3, 0x08);
        // bit 0 of the seed is set
        assert_eq!(n.output(), 0);
        for _ in 0..4 {
            n.clock_timer();
        }
        assert_eq!(n.output(), 15);
    }
}
