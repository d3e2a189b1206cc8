use super::Divider;
use crate::state::{StateError, StateReader, StateWriter};
use bit_field::BitField;

#[derive(Debug)]
pub struct Envelope {
    divider: Divider,
    volume: u8,
    decay: u8,
    looping: bool,
    constant: bool,
    start: bool,
}

impl Envelope {
    pub const STATE_SIZE: usize = Divider::STATE_SIZE + 5;

    pub fn new() -> Self {
        Self {
            divider: Divider::new(),
            volume: 0,
            decay: 0,
            looping: false,
            constant: true,
            start: false,
        }
    }

    /// quarter frame clock
    pub fn tick(&mut self) {
        if self.start {
            self.start = false;
            self.decay = 15;
            self.divider.reset();
        } else if self.divider.tick() {
            if self.decay > 0 {
                self.decay -= 1;
            } else if self.looping {
                self.decay = 15;
            }
        }
    }

    pub fn volume(&self) -> u8 {
        if self.constant {
            self.volume
        } else {
            self.decay
        }
    }

    /// `--LC VVVV`
    pub fn load(&mut self, data: u8) {
        self.looping = data.get_bit(5);
        self.constant = data.get_bit(4);
        self.volume = data.get_bits(0..4);
        self.divider.set_period(self.volume as u16);
    }

    pub fn restart(&mut self) {
        self.start = true;
    }

    pub fn save(&self, w: &mut StateWriter) {
        self.divider.save(w);
        w.write_u8(self.volume);
        w.write_u8(self.decay);
        w.write_bool(self.looping);
        w.write_bool(self.constant);
        w.write_bool(self.start);
    }

    pub fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.divider.load_state(r)?;
        self.volume = r.read_u8()? & 0x0f;
        self.decay = r.read_u8()? & 0x0f;
        self.looping = r.read_bool()?;
        self.constant = r.read_bool()?;
        self.start = r.read_bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay() {
        let mut e = Envelope::new();
        e.load(0b0001_0001);
        assert_eq!(e.volume(), 1);

        e.load(0b0010_0000);
        e.restart();
        e.tick();
        assert_eq!(e.volume(), 15);
        for _ in 0..15 {
            e.tick();
        }
        assert_eq!(e.volume(), 0);

        // looping wraps back to 15
        e.tick();
        assert_eq!(e.volume(), 15);
    }
}
