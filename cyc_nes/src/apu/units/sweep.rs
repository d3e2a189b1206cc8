use super::Divider;
use crate::state::{StateError, StateReader, StateWriter};
use bit_field::BitField;

#[derive(Debug)]
pub struct Sweep {
    enabled: bool,
    negate: bool,
    shift: u8,
    period: u8,
    counter: u8,
    reload: bool,
    // pulse 1 negates with one's complement
    ones_complement: bool,
}

impl Sweep {
    pub const STATE_SIZE: usize = 6;

    pub fn new(ones_complement: bool) -> Self {
        Self {
            enabled: false,
            negate: false,
            shift: 0,
            period: 0,
            counter: 0,
            reload: false,
            ones_complement,
        }
    }

    pub fn target(&self, timer: u16) -> u16 {
        let delta = timer >> self.shift;
        if self.negate {
            timer.saturating_sub(delta + self.ones_complement as u16)
        } else {
            timer + delta
        }
    }

    pub fn muting(&self, timer: u16) -> bool {
        timer < 8 || self.target(timer) > 0x7ff
    }

    /// half frame clock, may retune the channel timer
    pub fn tick(&mut self, timer: &mut Divider) {
        let period = timer.period();
        if self.counter == 0 && self.enabled && self.shift > 0 && !self.muting(period) {
            timer.set_period(self.target(period));
        }

        if self.counter == 0 || self.reload {
            self.counter = self.period;
            self.reload = false;
        } else {
            self.counter -= 1;
        }
    }

    /// `EPPP NSSS`
    pub fn load(&mut self, data: u8) {
        self.enabled = data.get_bit(7);
        self.period = data.get_bits(4..7);
        self.negate = data.get_bit(3);
        self.shift = data.get_bits(0..3);
        self.reload = true;
    }

    pub fn save(&self, w: &mut StateWriter) {
        w.write_bool(self.enabled);
        w.write_bool(self.negate);
        w.write_u8(self.shift);
        w.write_u8(self.period);
        w.write_u8(self.counter);
        w.write_bool(self.reload);
    }

    pub fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.enabled = r.read_bool()?;
        self.negate = r.read_bool()?;
        self.shift = r.read_u8()? & 0b111;
        self.period = r.read_u8()? & 0b111;
        self.counter = r.read_u8()? & 0b111;
        self.reload = r.read_bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target() {
        let mut s = Sweep::new(false);
        s.load(0b1000_0001);
        assert_eq!(s.target(200), 300);
        assert!(!s.muting(200));
        assert!(s.muting(0x600));
        assert!(s.muting(7));

        s.load(0b1000_1001);
        assert_eq!(s.target(200), 100);
        let s1 = {
            let mut s = Sweep::new(true);
            s.load(0b1000_1001);
            s
        };
        assert_eq!(s1.target(200), 99);
    }

    #[test]
    fn test_retunes_timer() {
        let mut s = Sweep::new(false);
        let mut timer = Divider::new();
        timer.set_period(200);

        // period 1: update on the first clock after reload, then every 2nd
        s.load(0b1001_0001);
        s.tick(&mut timer);
        assert_eq!(timer.period(), 300);
        s.tick(&mut timer);
        assert_eq!(timer.period(), 300);
        s.tick(&mut timer);
        assert_eq!(timer.period(), 450);

        // muted channels are left alone
        timer.set_period(0x700);
        s.tick(&mut timer);
        s.tick(&mut timer);
        assert_eq!(timer.period(), 0x700);
    }
}
