use crate::state::{StateError, StateReader, StateWriter};

const LEN_TABLE: [u8; 32] = [
    0x0a, 0xfe, 0x14, 0x02, 0x28, 0x04, 0x50, 0x06, 0xa0, 0x08, 0x3c, 0x0a, 0x0e, 0x0c, 0x1a, 0x0e,
    0x0c, 0x10, 0x18, 0x12, 0x30, 0x14, 0x60, 0x16, 0xc0, 0x18, 0x48, 0x1a, 0x10, 0x1c, 0x20, 0x1e,
];

#[derive(Debug, Default)]
pub struct LengthCounter {
    counter: u8,
    enabled: bool,
    halt: bool,
}

impl LengthCounter {
    pub const STATE_SIZE: usize = 3;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> bool {
        self.counter != 0
    }

    pub fn value(&self) -> u8 {
        self.counter
    }

    /// half frame clock
    pub fn tick(&mut self) {
        if !self.halt && self.counter > 0 {
            self.counter -= 1;
        }
    }

    pub fn set_enable(&mut self, enable: bool) {
        self.enabled = enable;
        if !enable {
            self.counter = 0;
        }
    }

    pub fn set_halt(&mut self, halt: bool) {
        self.halt = halt;
    }

    /// loads from the upper 5 bits of a channel's last register
    pub fn load(&mut self, data: u8) {
        if self.enabled {
            self.counter = LEN_TABLE[(data >> 3) as usize];
        }
    }

    pub fn save(&self, w: &mut StateWriter) {
        w.write_u8(self.counter);
        w.write_bool(self.enabled);
        w.write_bool(self.halt);
    }

    pub fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.counter = r.read_u8()?;
        self.enabled = r.read_bool()?;
        self.halt = r.read_bool()?;
        Ok(())
    }
}
