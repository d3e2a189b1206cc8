use crate::state::{StateError, StateReader, StateWriter};

/// Counts down to zero and reloads, firing every `period + 1` clocks.
#[derive(Debug, Default, Clone)]
pub struct Divider {
    period: u16,
    counter: u16,
}

impl Divider {
    pub const STATE_SIZE: usize = 4;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> bool {
        if self.counter == 0 {
            self.counter = self.period;
            true
        } else {
            self.counter -= 1;
            false
        }
    }

    pub fn reset(&mut self) {
        self.counter = self.period;
    }

    pub fn set_period(&mut self, period: u16) {
        self.period = period;
    }

    /// low 8 bits of an 11 bit channel timer
    pub fn set_period_low(&mut self, data: u8) {
        self.period = (self.period & 0x0700) | data as u16;
    }

    /// high 3 bits of an 11 bit channel timer
    pub fn set_period_high(&mut self, data: u8) {
        self.period = (self.period & 0x00ff) | ((data as u16 & 0b111) << 8);
    }

    pub fn period(&self) -> u16 {
        self.period
    }

    pub fn save(&self, w: &mut StateWriter) {
        w.write_u16(self.period);
        w.write_u16(self.counter);
    }

    pub fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.period = r.read_u16()?;
        self.counter = r.read_u16()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divider() {
        let mut d = Divider::new();
        d.set_period(2);
        d.reset();
        let fired: Vec<bool> = (0..6).map(|_| d.tick()).collect();
        assert_eq!(fired, [false, false, true, false, false, true]);

        d.set_period_low(0x34);
        d.set_period_high(0xfa);
        assert_eq!(d.period(), 0x234);
    }
}
