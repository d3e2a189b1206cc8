bitflags::bitflags! {
    /// Pad buttons in shift-out order, A is read first.
    #[derive(Default)]
    pub struct Buttons: u8 {
        const A = 1 << 0;
        const B = 1 << 1;
        const SELECT = 1 << 2;
        const START = 1 << 3;
        const UP = 1 << 4;
        const DOWN = 1 << 5;
        const LEFT = 1 << 6;
        const RIGHT = 1 << 7;
    }
}

/// Standard controllers on $4016/$4017.
#[derive(Debug, Default)]
pub struct Joystick {
    pads: [Buttons; 2],
    shifters: [u8; 2],
    strobe: bool,
}

impl Joystick {
    pub fn set_buttons(&mut self, port: usize, buttons: Buttons) {
        if let Some(pad) = self.pads.get_mut(port) {
            *pad = buttons;
        }
    }

    pub fn buttons(&self, port: usize) -> Buttons {
        self.pads.get(port).copied().unwrap_or_default()
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        let data = self.peek(addr);
        if !self.strobe {
            let s = &mut self.shifters[port(addr)];
            // an empty shifter keeps reading 1
            *s = (*s >> 1) | 0x80;
        }
        data
    }

    pub fn peek(&self, addr: u16) -> u8 {
        let port = port(addr);
        let bit = if self.strobe {
            self.pads[port].bits() & 0x01
        } else {
            self.shifters[port] & 0x01
        };
        bit | 0x40
    }

    /// $4016 write, both pads are latched when the strobe bit goes low.
    pub fn write(&mut self, data: u8) {
        self.strobe = data & 0x01 != 0;
        if !self.strobe {
            self.shifters = [self.pads[0].bits(), self.pads[1].bits()];
        }
    }
}

fn port(addr: u16) -> usize {
    (addr & 0x01) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(joy: &mut Joystick, addr: u16) -> Vec<u8> {
        (0..10).map(|_| joy.read(addr) & 0x01).collect()
    }

    #[test]
    fn test_shift_order() {
        let mut joy = Joystick::default();
        joy.set_buttons(0, Buttons::A | Buttons::START | Buttons::RIGHT);
        joy.set_buttons(1, Buttons::B | Buttons::LEFT);

        joy.write(1);
        joy.write(0);
        assert_eq!(read_all(&mut joy, 0x4016), [1, 0, 0, 1, 0, 0, 0, 1, 1, 1]);
        assert_eq!(read_all(&mut joy, 0x4017), [0, 1, 0, 0, 0, 0, 1, 0, 1, 1]);
    }

    #[test]
    fn test_strobe_high_reads_a() {
        let mut joy = Joystick::default();
        joy.write(1);
        assert_eq!(joy.read(0x4016), 0x40);

        joy.set_buttons(0, Buttons::A);
        assert_eq!(joy.read(0x4016), 0x41);
        assert_eq!(joy.read(0x4016), 0x41);

        // buttons changed after the latch are not seen until the next one
        joy.write(0);
        joy.set_buttons(0, Buttons::empty());
        assert_eq!(joy.read(0x4016), 0x41);
        assert_eq!(joy.read(0x4016), 0x40);
    }
}
