use std::fmt;

bitflags::bitflags! {
    #[derive(Default)]
    pub struct Status: u8 {
        const C = 1 << 0;
        const Z = 1 << 1;
        const I = 1 << 2;
        const D = 1 << 3;
        const B = 1 << 4;
        const U = 1 << 5;
        const V = 1 << 6;
        const N = 1 << 7;
    }
}

impl Status {
    pub const POWER_ON: Status = Status::from_bits_truncate(0x24);

    pub fn set_zn(&mut self, v: u8) {
        self.set(Status::Z, v == 0);
        self.set(Status::N, v & 0x80 != 0);
    }

    /// Value as restored from the stack by PLP / RTI, B only lives on the stack.
    pub fn from_stack(b: u8) -> Self {
        (Status::from_bits_truncate(b) | Status::U) - Status::B
    }

    pub fn carry(self) -> u8 {
        self.contains(Status::C) as u8
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Status, char); 7] = [
            (Status::N, 'N'),
            (Status::V, 'V'),
            (Status::U, '-'),
            (Status::B, 'B'),
            (Status::D, 'D'),
            (Status::I, 'I'),
            (Status::Z, 'Z'),
        ];
        for (flag, c) in NAMES {
            write!(f, "{}", if self.contains(flag) { c } else { '-' })?;
        }
        write!(f, "{}", if self.contains(Status::C) { 'C' } else { '-' })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(Status::POWER_ON.bits(), 0x24);

        let s = Status::from_stack(0xff);
        assert_eq!(s.bits(), 0b1110_1111);
        assert_eq!(format!("{}", s), "NV--DIZC");

        let s = Status::from_stack(0x00);
        assert_eq!(s.bits(), 0b0010_0000);

        let mut s = Status::default();
        s.set_zn(0);
        assert!(s.contains(Status::Z) && !s.contains(Status::N));
        s.set_zn(0x80);
        assert!(!s.contains(Status::Z) && s.contains(Status::N));
    }
}
