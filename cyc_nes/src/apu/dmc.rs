use super::{Channel, Divider};
use crate::state::{StateError, StateReader, StateWriter};
use bit_field::BitField;

/// NTSC rates in CPU cycles
const RATE: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

#[derive(Debug)]
pub struct Dmc {
    irq_on: bool,
    irq_level: bool,
    looping: bool,

    sample_start_address: u16,
    sample_address: u16,
    sample_len: u16,
    sample_remain: u16,
    sample_request: Option<u16>,
    sample_buffer: Option<u8>,

    timer: Divider,
    bits_shifter: u8,
    bits_remain: u8,
    silence: bool,

    output: u8,
}

impl Dmc {
    pub const STATE_SIZE: usize = 3 + 8 + 3 + 2 + Divider::STATE_SIZE + 4;

    pub fn new() -> Self {
        let mut timer = Divider::new();
        timer.set_period(RATE[0] - 1);
        Self {
            irq_on: false,
            irq_level: false,
            looping: false,

            sample_start_address: 0xc000,
            sample_address: 0xc000,
            sample_len: 1,
            sample_remain: 0,
            sample_request: None,
            sample_buffer: None,

            timer,
            bits_shifter: 0,
            bits_remain: 8,
            silence: true,

            output: 0,
        }
    }

    /// Address the memory reader wants fetched, taken once.
    pub fn take_request(&mut self) -> Option<u16> {
        self.sample_request.take()
    }

    pub fn fill_buffer(&mut self, data: u8) {
        self.sample_buffer = Some(data);
    }

    pub fn irq(&self) -> bool {
        self.irq_level
    }

    pub fn ack_irq(&mut self) {
        self.irq_level = false;
    }

    fn restart(&mut self) {
        self.sample_remain = self.sample_len;
        self.sample_address = self.sample_start_address;
    }

    fn fetch(&mut self) {
        self.sample_request = Some(self.sample_address);
        self.sample_address = match self.sample_address {
            0xffff => 0x8000,
            addr => addr + 1,
        };

        self.sample_remain -= 1;
        if self.sample_remain == 0 {
            if self.looping {
                self.restart();
            } else if self.irq_on {
                self.irq_level = true;
            }
        }
    }

    fn clock_output(&mut self) {
        if !self.silence {
            if self.bits_shifter.get_bit(0) {
                if self.output <= 125 {
                    self.output += 2;
                }
            } else if self.output >= 2 {
                self.output -= 2;
            }
        }
        self.bits_shifter >>= 1;

        self.bits_remain -= 1;
        if self.bits_remain == 0 {
            self.bits_remain = 8;
            match self.sample_buffer.take() {
                Some(b) => {
                    self.bits_shifter = b;
                    self.silence = false;
                }
                None => self.silence = true,
            }
        }
    }
}

impl Channel for Dmc {
    fn output(&self) -> u8 {
        self.output
    }

    fn clock_timer(&mut self) {
        if self.sample_buffer.is_none() && self.sample_request.is_none() && self.sample_remain > 0
        {
            self.fetch();
        }

        if self.timer.tick() {
            self.clock_output();
        }
    }

    fn write(&mut self, reg: u16, data: u8) {
        match reg {
            0 => {
                self.irq_on = data.get_bit(7);
                self.looping = data.get_bit(6);
                self.timer.set_period(RATE[data.get_bits(0..4) as usize] - 1);
                if !self.irq_on {
                    self.irq_level = false;
                }
            }
            1 => self.output = data & 0x7f,
            2 => self.sample_start_address = 0xc000 + data as u16 * 64,
            _ => self.sample_len = data as u16 * 16 + 1,
        }
    }

    fn set_enable(&mut self, enable: bool) {
        if !enable {
            self.sample_remain = 0;
        } else if self.sample_remain == 0 {
            self.restart();
        }
    }

    fn enabled(&self) -> bool {
        self.sample_remain > 0
    }

    fn save(&self, w: &mut StateWriter) {
        w.write_bool(self.irq_on);
        w.write_bool(self.irq_level);
        w.write_bool(self.looping);

        w.write_u16(self.sample_start_address);
        w.write_u16(self.sample_address);
        w.write_u16(self.sample_len);
        w.write_u16(self.sample_remain);
        w.write_bool(self.sample_request.is_some());
        w.write_u16(self.sample_request.unwrap_or(0));
        w.write_bool(self.sample_buffer.is_some());
        w.write_u8(self.sample_buffer.unwrap_or(0));

        self.timer.save(w);
        w.write_u8(self.bits_shifter);
        w.write_u8(self.bits_remain);
        w.write_bool(self.silence);
        w.write_u8(self.output);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.irq_on = r.read_bool()?;
        self.irq_level = r.read_bool()?;
        self.looping = r.read_bool()?;

        self.sample_start_address = r.read_u16()? | 0x8000;
        self.sample_address = r.read_u16()? | 0x8000;
        self.sample_len = r.read_u16()?;
        self.sample_remain = r.read_u16()?;
        let has_request = r.read_bool()?;
        let request = r.read_u16()?;
        self.sample_request = has_request.then_some(request);
        let has_buffer = r.read_bool()?;
        let buffer = r.read_u8()?;
        self.sample_buffer = has_buffer.then_some(buffer);

        self.timer.load_state(r)?;
        self.bits_shifter = r.read_u8()?;
        self.bits_remain = r.read_u8()?.clamp(1, 8);
        self.silence = r.read_bool()?;
        self.output = r.read_u8()? & 0x7f;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_fetch() {
        let mut d = Dmc::new();
        d.write(2, 0xff);
        d.write(3, 0x00);
        assert!(!d.enabled());
        d.set_enable(true);
        assert!(d.enabled());

        d.clock_timer();
        assert_eq!(d.take_request(), Some(0xffc0));
        assert_eq!(d.take_request(), None);
        assert!(!d.enabled());

        // one byte sample, no loop and no irq
        d.fill_buffer(0xff);
        for _ in 0..1000 {
            d.clock_timer();
        }
        assert_eq!(d.take_request(), None);
        assert!(!d.irq());
    }

    #[test]
    fn test_irq_and_loop() {
        let mut d = Dmc::new();
        d.write(0, 0x80);
        d.write(3, 0x00);
        d.set_enable(true);
        d.clock_timer();
        assert!(d.irq());
        assert!(d.take_request().is_some());

        // clearing the enable bit acknowledges
        d.write(0, 0x00);
        assert!(!d.irq());

        d.write(0, 0x40);
        d.set_enable(true);
        d.clock_timer();
        assert!(d.enabled());
        assert_eq!(d.take_request(), Some(0xc000));
    }

    #[test]
    fn test_address_wraps() {
        let mut d = Dmc::new();
        d.sample_address = 0xffff;
        d.sample_remain = 2;
        d.clock_timer();
        assert_eq!(d.take_request(), Some(0xffff));
        d.fill_buffer(0);
        // buffer drains after 8 output clocks
        for _ in 0..428 * 9 {
            d.clock_timer();
            if let Some(addr) = d.take_request() {
                assert_eq!(addr, 0x8000);
                return;
            }
        }
        panic!("second byte never requested");
    }

    #[test]
    fn test_delta_output() {
        let mut d = Dmc::new();
        d.write(0, 0x0f);
        d.write(1, 0x40);
        d.write(3, 0x00);
        d.set_enable(true);
        d.clock_timer();
        d.take_request();
        d.fill_buffer(0b0000_0011);

        // the byte plays once the current silent cycle ends
        for _ in 0..54 * 20 {
            d.clock_timer();
        }
        assert_eq!(d.output(), 0x40 + 4 - 12);

        // no step above 125
        d.write(1, 0x7e);
        d.fill_buffer(0xff);
        for _ in 0..54 * 20 {
            d.clock_timer();
        }
        assert_eq!(d.output(), 0x7e);
    }
}
