use bit_field::BitField;

/// PPU control register
#[derive(Debug, Default, Clone, Copy)]
pub struct PpuCtrl(u8);

impl PpuCtrl {
    pub fn set(&mut self, b: u8) {
        self.0 = b;
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// base nametable address
    pub fn nametable(self) -> u16 {
        self.0.get_bits(..2) as u16
    }

    /// VRAM address increment per CPU read/write of PPUDATA
    pub fn addr_inc(self) -> u16 {
        self.0.get_bit(2) as u16 * 31 + 1
    }

    /// sprite pattern table address for 8x8 sprites
    pub fn sp_pattern_table(self) -> u16 {
        self.0.get_bit(3) as u16 * 0x1000
    }

    /// background pattern table address
    pub fn bg_pattern_table(self) -> u16 {
        self.0.get_bit(4) as u16 * 0x1000
    }

    /// sprite height, 8 or 16
    pub fn sp_size(self) -> u16 {
        (self.0.get_bit(5) as u16 + 1) * 8
    }

    /// generate an NMI at the start of the vblank
    pub fn nmi_on(self) -> bool {
        self.0.get_bit(7)
    }
}

/// PPU mask register
#[derive(Debug, Default, Clone, Copy)]
pub struct PpuMask(u8);

impl PpuMask {
    pub fn set(&mut self, b: u8) {
        self.0 = b;
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn gray_scale(self) -> bool {
        self.0.get_bit(0)
    }

    /// show background in leftmost 8 pixels of screen
    pub fn show_bg_left(self) -> bool {
        self.0.get_bit(1)
    }

    /// show sprites in leftmost 8 pixels of screen
    pub fn show_sp_left(self) -> bool {
        self.0.get_bit(2)
    }

    pub fn show_bg(self) -> bool {
        self.0.get_bit(3)
    }

    pub fn show_sp(self) -> bool {
        self.0.get_bit(4)
    }

    pub fn rendering(self) -> bool {
        self.show_bg() || self.show_sp()
    }
}

bitflags::bitflags! {
    /// PPU status register, the low 5 bits read back the I/O latch
    #[derive(Default)]
    pub struct PpuStatus: u8 {
        const SPRITE_OVERFLOW = 1 << 5;
        const SPRITE_ZERO_HIT = 1 << 6;
        const VBLANK = 1 << 7;
    }
}

// from: https://wiki.nesdev.com/w/index.php?title=PPU_scrolling
// fedcba98 76543210
//  yyyNNYY YYYXXXXX
const VX_MASK: u16 = 0b0000_0100_0001_1111;
const VY_MASK: u16 = 0b0111_1011_1110_0000;
const V_MASK: u16 = 0x7fff;

/// Loopy VRAM address, always kept within 15 bits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VramAddr(u16);

impl VramAddr {
    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn set_raw(&mut self, v: u16) {
        self.0 = v & V_MASK;
    }

    /// address on the 14 bit PPU bus
    pub fn addr(self) -> u16 {
        self.0 & 0x3fff
    }

    pub fn tile_addr(self) -> u16 {
        0x2000 | (self.0 & 0x0fff)
    }

    pub fn attr_addr(self) -> u16 {
        let v = self.0;
        0x23c0 | (v & 0x0c00) | ((v >> 4) & 0x38) | ((v >> 2) & 0x07)
    }

    pub fn inc(&mut self, offset: u16) {
        self.0 = self.0.wrapping_add(offset) & V_MASK;
    }

    pub fn inc_coarse_x(&mut self) {
        let cx = self.coarse_x();
        if cx == 31 {
            self.set_coarse_x(0);
            self.switch_nm(0b01);
        } else {
            self.set_coarse_x(cx + 1);
        }
    }

    pub fn inc_y(&mut self) {
        let y = self.fine_y();
        if y < 7 {
            self.set_fine_y(y + 1);
            return;
        }

        self.set_fine_y(0);
        match self.coarse_y() {
            29 => {
                self.set_coarse_y(0);
                self.switch_nm(0b10);
            }
            // attribute rows, wrap without switching
            31 => self.set_coarse_y(0),
            cy => self.set_coarse_y(cy + 1),
        }
    }

    pub fn coarse_x(self) -> u16 {
        self.0.get_bits(0..5)
    }

    pub fn set_coarse_x(&mut self, b: u16) {
        self.0.set_bits(0..5, b & 0x1f);
    }

    pub fn coarse_y(self) -> u16 {
        self.0.get_bits(5..10)
    }

    pub fn set_coarse_y(&mut self, b: u16) {
        self.0.set_bits(5..10, b & 0x1f);
    }

    pub fn nm(self) -> u16 {
        self.0.get_bits(10..12)
    }

    pub fn set_nm(&mut self, b: u16) {
        self.0.set_bits(10..12, b & 0b11);
    }

    fn switch_nm(&mut self, b: u16) {
        self.set_nm(self.nm() ^ b);
    }

    pub fn fine_y(self) -> u16 {
        self.0.get_bits(12..15)
    }

    pub fn set_fine_y(&mut self, b: u16) {
        self.0.set_bits(12..15, b & 0b111);
    }

    pub fn set_high(&mut self, b: u8) {
        // bit 14 is cleared
        self.0.set_bits(8..15, (b & 0x3f) as u16);
    }

    pub fn set_low(&mut self, b: u8) {
        self.0.set_bits(0..8, b as u16);
    }

    pub fn copy_x(&mut self, other: VramAddr) {
        self.0 = (self.0 & !VX_MASK) | (other.0 & VX_MASK);
    }

    pub fn copy_y(&mut self, other: VramAddr) {
        self.0 = (self.0 & !VY_MASK) | (other.0 & VY_MASK);
    }
}

/// Pair of 16 bit shifters, the next tile is latched into the high byte
/// bit reversed, so pixel `x` of the current tile is bit `x`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShiftReg(u16, u16);

impl ShiftReg {
    pub fn get(self, x: u8) -> u8 {
        self.0.get_bit(x as usize) as u8 | ((self.1.get_bit(x as usize) as u8) << 1)
    }

    pub fn shift(&mut self) {
        self.0 >>= 1;
        self.1 >>= 1;
    }

    pub fn latch(&mut self, b0: u8, b1: u8) {
        self.0.set_bits(8..16, b0.reverse_bits() as u16);
        self.1.set_bits(8..16, b1.reverse_bits() as u16);
    }

    pub fn raw(self) -> (u16, u16) {
        (self.0, self.1)
    }

    pub fn from_raw(lo: u16, hi: u16) -> Self {
        Self(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vram_addr_increments() {
        let mut v = VramAddr::default();
        v.set_coarse_x(31);
        v.inc_coarse_x();
        assert_eq!(v.coarse_x(), 0);
        assert_eq!(v.nm(), 1);

        let mut v = VramAddr::default();
        v.set_fine_y(7);
        v.set_coarse_y(29);
        v.inc_y();
        assert_eq!((v.fine_y(), v.coarse_y(), v.nm()), (0, 0, 2));

        v.set_fine_y(7);
        v.set_coarse_y(31);
        v.inc_y();
        assert_eq!((v.coarse_y(), v.nm()), (0, 2));

        let mut v = VramAddr::default();
        v.set_raw(0x7fff);
        v.inc(32);
        assert_eq!(v.raw(), 0x001f);
    }

    #[test]
    fn test_copy_bits() {
        let mut t = VramAddr::default();
        t.set_raw(0x7fff);
        let mut v = VramAddr::default();
        v.copy_x(t);
        assert_eq!(v.raw(), VX_MASK);
        v.copy_y(t);
        assert_eq!(v.raw(), 0x7fff);
    }

    #[test]
    fn test_shift_reg() {
        let mut s = ShiftReg::default();
        s.latch(0b1000_0001, 0b0100_0000);
        for _ in 0..8 {
            s.shift();
        }
        assert_eq!(s.get(0), 1);
        assert_eq!(s.get(1), 2);
        assert_eq!(s.get(7), 1);
    }
}
