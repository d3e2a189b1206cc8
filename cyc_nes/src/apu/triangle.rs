use super::{Channel, Divider, LengthCounter};
use crate::state::{StateError, StateReader, StateWriter};
use bit_field::BitField;

const SEQ: [u8; 32] = [
    0x0f, 0x0e, 0x0d, 0x0c, 0x0b, 0x0a, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00,
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

#[derive(Debug)]
pub struct Triangle {
    step: u8,
    timer: Divider,
    len_counter: LengthCounter,

    linear_len: u8,
    linear_counter: u8,
    linear_reload: bool,
    linear_control: bool,
}

impl Triangle {
    pub const STATE_SIZE: usize = 1 + Divider::STATE_SIZE + LengthCounter::STATE_SIZE + 4;

    pub fn new() -> Self {
        Self {
            step: 0,
            timer: Divider::new(),
            len_counter: LengthCounter::new(),

            linear_len: 0,
            linear_counter: 0,
            linear_reload: false,
            linear_control: false,
        }
    }
}

impl Channel for Triangle {
    fn output(&self) -> u8 {
        SEQ[self.step as usize]
    }

    fn clock_timer(&mut self) {
        if self.timer.tick() && self.linear_counter != 0 && self.len_counter.active() {
            // ultrasonic periods hold the sequencer
            if self.timer.period() >= 2 {
                self.step = (self.step + 1) % 32;
            }
        }
    }

    fn clock_quarter(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_len;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }

        if !self.linear_control {
            self.linear_reload = false;
        }
    }

    fn clock_half(&mut self) {
        self.len_counter.tick();
    }

    fn write(&mut self, reg: u16, data: u8) {
        match reg {
            0 => {
                self.linear_control = data.get_bit(7);
                self.len_counter.set_halt(data.get_bit(7));
                self.linear_len = data.get_bits(0..7);
            }
            1 => {}
            2 => self.timer.set_period_low(data),
            _ => {
                self.timer.set_period_high(data);
                self.len_counter.load(data);
                self.linear_reload = true;
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
        w.write_u8(self.step);
        self.timer.save(w);
        self.len_counter.save(w);
        w.write_u8(self.linear_len);
        w.write_u8(self.linear_counter);
        w.write_bool(self.linear_reload);
        w.write_bool(self.linear_control);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.step = r.read_u8()? % 32;
        self.timer.load_state(r)?;
        self.len_counter.load_state(r)?;
        self.linear_len = r.read_u8()? & 0x7f;
        self.linear_counter = r.read_u8()? & 0x7f;
        self.linear_reload = r.read_bool()?;
        self.linear_control = r.read_bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_counter_gates_sequencer() {
        let mut t = Triangle::new();
        t.set_enable(true);
        t.write(0, 0x02);
        t.write(2, 0x10);
        t.write(3, 0x08);

        // no linear count loaded yet
        for _ in 0..0x22 {
            t.clock_timer();
        }
        assert_eq!(t.output(), 0x0f);

        t.clock_quarter();
        for _ in 0..0x22 {
            t.clock_timer();
        }
        assert_eq!(t.output(), 0x0d);

        t.clock_quarter();
        t.clock_quarter();
        for _ in 0..0x22 {
            t.clock_timer();
        }
        assert_eq!(t.output(), 0x0d);
    }
}
