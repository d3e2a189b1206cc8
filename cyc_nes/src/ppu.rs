use self::regs::*;
use crate::state::{Snapshot, StateError, StateReader, StateWriter};
use crate::Mirroring;

mod palettes;
mod regs;

pub use self::palettes::{to_bgra, PALETTES};

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;

const OAM_SIZE: usize = 0x100;
const VRAM_SIZE: usize = 0x800;
const PALETTES_SIZE: usize = 0x20;
const FRAME_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT;
const SPRITE_SLOTS: usize = 8;

const POST_RENDER_LINE: u16 = 240;
const VBLANK_LINE: u16 = 241;
const PRE_RENDER_LINE: u16 = 261;
const LAST_DOT: u16 = 340;
const MAPPER_HOOK_DOT: u16 = 260;

const STATE_SIZE: usize = 6 // ctrl, mask, status, oam addr, read buffer, io latch
    + 6 // v, t, x, w
    + 4 // next tile fetch latches
    + 8 // shift registers
    + SPRITE_SLOTS * 5 + 1
    + 4 // nmi, nmi fired, vbl suppressed, frame ready
    + 1 // mirroring
    + OAM_SIZE
    + VRAM_SIZE
    + PALETTES_SIZE
    + 8 // frame counter
    + 4; // scanline, dot

/// Pattern memory as seen by the PPU, plus the mapper's scanline hook.
pub trait PpuBus {
    fn read_chr(&self, addr: u16) -> u8;
    fn write_chr(&mut self, addr: u16, data: u8);
    fn scanline(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanlinePhase {
    Visible,
    PostRender,
    VerticalBlanking,
    PreRender,
}

impl ScanlinePhase {
    pub fn from_scanline(line: u16) -> Self {
        match line {
            0..=239 => ScanlinePhase::Visible,
            POST_RENDER_LINE => ScanlinePhase::PostRender,
            PRE_RENDER_LINE => ScanlinePhase::PreRender,
            _ => ScanlinePhase::VerticalBlanking,
        }
    }
}

/// Sprite selected for the next scanline, pattern already flipped.
#[derive(Debug, Default, Clone, Copy)]
struct Sprite {
    x: u8,
    attr: u8,
    lo: u8,
    hi: u8,
    zero: bool,
}

impl Sprite {
    fn palette(&self) -> u8 {
        0x10 | ((self.attr & 0b11) << 2)
    }

    fn behind_bg(&self) -> bool {
        self.attr & 0x20 != 0
    }
}

pub struct Ppu {
    vram: Box<[u8; VRAM_SIZE]>,
    palettes: [u8; PALETTES_SIZE],
    oam: Box<[u8; OAM_SIZE]>,
    frame_buf: Box<[u8; FRAME_SIZE]>,

    ctrl: PpuCtrl,
    mask: PpuMask,
    status: PpuStatus,
    oam_addr: u8,
    data_buf: u8,
    io_latch: u8,

    v: VramAddr,
    t: VramAddr,
    x: u8,
    w: bool,

    next_tile: u8,
    next_attr: u8,
    next_lo: u8,
    next_hi: u8,
    bg_pattern: ShiftReg,
    bg_attr: ShiftReg,

    sprites: [Sprite; SPRITE_SLOTS],
    sprite_count: usize,

    nmi: bool,
    nmi_fired: bool,
    vbl_suppressed: bool,
    frame_ready: bool,

    mirroring: Mirroring,
    phase: ScanlinePhase,
    scanline: u16,
    dot: u16,
    frame: u64,
}

impl Ppu {
    pub fn new(mirroring: Mirroring) -> Self {
        Self {
            vram: Box::new([0u8; VRAM_SIZE]),
            palettes: [0u8; PALETTES_SIZE],
            oam: Box::new([0u8; OAM_SIZE]),
            frame_buf: Box::new([0u8; FRAME_SIZE]),

            ctrl: PpuCtrl::default(),
            mask: PpuMask::default(),
            status: PpuStatus::default(),
            oam_addr: 0,
            data_buf: 0,
            io_latch: 0,

            v: VramAddr::default(),
            t: VramAddr::default(),
            x: 0,
            w: false,

            next_tile: 0,
            next_attr: 0,
            next_lo: 0,
            next_hi: 0,
            bg_pattern: ShiftReg::default(),
            bg_attr: ShiftReg::default(),

            sprites: [Sprite::default(); SPRITE_SLOTS],
            sprite_count: 0,

            nmi: false,
            nmi_fired: false,
            vbl_suppressed: false,
            frame_ready: false,

            mirroring,
            phase: ScanlinePhase::PreRender,
            scanline: PRE_RENDER_LINE,
            dot: 0,
            frame: 0,
        }
    }

    pub fn reset(&mut self) {
        self.ctrl.set(0);
        self.mask.set(0);
        self.w = false;
        self.x = 0;
        self.data_buf = 0;
        self.nmi = false;
        self.vbl_suppressed = false;
        self.phase = ScanlinePhase::PreRender;
        self.scanline = PRE_RENDER_LINE;
        self.dot = 0;
    }

    pub fn set_mirroring(&mut self, mirroring: Mirroring) {
        self.mirroring = mirroring;
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    pub fn phase(&self) -> ScanlinePhase {
        self.phase
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Palette indices of the last rendered picture, row major.
    pub fn frame(&self) -> &[u8] {
        &self.frame_buf[..]
    }

    /// Palette RAM entry with the backdrop mirrors applied.
    pub fn palette(&self, index: u8) -> u8 {
        self.palettes[palette_index(index)]
    }

    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi)
    }

    pub fn take_frame(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    /// Advances one dot.
    pub fn step(&mut self, bus: &mut dyn PpuBus) {
        match self.phase {
            ScanlinePhase::PreRender => self.pre_render_dot(bus),
            ScanlinePhase::Visible => self.visible_dot(bus),
            ScanlinePhase::PostRender => {
                if self.dot == 0 {
                    self.frame_ready = true;
                }
            }
            ScanlinePhase::VerticalBlanking => {
                if self.scanline == VBLANK_LINE && self.dot == 1 {
                    self.start_vblank();
                }
            }
        }
        self.advance();
    }

    fn advance(&mut self) {
        let last_dot = if self.scanline == PRE_RENDER_LINE
            && self.frame % 2 == 1
            && self.mask.rendering()
        {
            LAST_DOT - 1
        } else {
            LAST_DOT
        };

        if self.dot < last_dot {
            self.dot += 1;
            return;
        }

        self.dot = 0;
        self.scanline += 1;
        if self.scanline > PRE_RENDER_LINE {
            self.scanline = 0;
            self.frame += 1;
        }
        self.phase = ScanlinePhase::from_scanline(self.scanline);
    }

    fn pre_render_dot(&mut self, bus: &mut dyn PpuBus) {
        if self.dot == 1 {
            self.status.remove(
                PpuStatus::VBLANK | PpuStatus::SPRITE_ZERO_HIT | PpuStatus::SPRITE_OVERFLOW,
            );
            self.vbl_suppressed = false;
            self.nmi_fired = false;
            self.sprite_count = 0;
        }

        if self.mask.rendering() {
            self.background_dot(bus);
            if (280..=304).contains(&self.dot) {
                self.v.copy_y(self.t);
            }
        }
    }

    fn visible_dot(&mut self, bus: &mut dyn PpuBus) {
        if self.mask.rendering() {
            self.background_dot(bus);
            match self.dot {
                257 => self.evaluate_sprites(bus),
                MAPPER_HOOK_DOT => bus.scanline(),
                _ => {}
            }
        } else if self.dot == 257 {
            self.sprite_count = 0;
        }

        if (1..=256).contains(&self.dot) {
            self.render_pixel();
        }
    }

    fn start_vblank(&mut self) {
        if self.vbl_suppressed {
            return;
        }
        self.status.insert(PpuStatus::VBLANK);
        if self.ctrl.nmi_on() {
            self.raise_nmi();
        }
    }

    fn raise_nmi(&mut self) {
        if !self.nmi_fired {
            self.nmi = true;
            self.nmi_fired = true;
        }
    }

    fn background_dot(&mut self, bus: &dyn PpuBus) {
        let dot = self.dot;

        if (2..=257).contains(&dot) || (321..=337).contains(&dot) {
            self.bg_pattern.shift();
            self.bg_attr.shift();

            match (dot - 1) % 8 {
                0 => {
                    self.load_shifters();
                    self.next_tile = self.read_vram(bus, self.v.tile_addr());
                }
                2 => {
                    let at = self.read_vram(bus, self.v.attr_addr());
                    let shift = ((self.v.coarse_y() & 0b10) << 1) | (self.v.coarse_x() & 0b10);
                    self.next_attr = (at >> shift) & 0b11;
                }
                4 => self.next_lo = bus.read_chr(self.bg_tile_addr()),
                6 => self.next_hi = bus.read_chr(self.bg_tile_addr() + 8),
                7 => self.v.inc_coarse_x(),
                _ => {}
            }
        }

        match dot {
            256 => self.v.inc_y(),
            257 => self.v.copy_x(self.t),
            _ => {}
        }
    }

    fn bg_tile_addr(&self) -> u16 {
        self.ctrl.bg_pattern_table() + self.next_tile as u16 * 16 + self.v.fine_y()
    }

    fn load_shifters(&mut self) {
        self.bg_pattern.latch(self.next_lo, self.next_hi);

        let fill = |bit: u8| if self.next_attr & bit != 0 { 0xff } else { 0x00 };
        let (a0, a1) = (fill(0b01), fill(0b10));
        self.bg_attr.latch(a0, a1);
    }

    /// Selects the sprites of the next scanline and fetches their patterns.
    fn evaluate_sprites(&mut self, bus: &dyn PpuBus) {
        let ctrl = self.ctrl;
        let height = ctrl.sp_size();
        self.sprite_count = 0;

        for (i, entry) in self.oam.chunks_exact(4).enumerate() {
            let row = self.scanline.wrapping_sub(entry[0] as u16);
            if row >= height {
                continue;
            }
            if self.sprite_count == SPRITE_SLOTS {
                self.status.insert(PpuStatus::SPRITE_OVERFLOW);
                break;
            }

            let (tile, attr, x) = (entry[1], entry[2], entry[3]);
            let row = if attr & 0x80 != 0 {
                height - 1 - row
            } else {
                row
            };

            let addr = if height == 16 {
                let table = (tile as u16 & 1) * 0x1000;
                let tile = (tile & 0xfe) as u16 + (row >= 8) as u16;
                table + tile * 16 + (row & 7)
            } else {
                ctrl.sp_pattern_table() + tile as u16 * 16 + row
            };

            let (mut lo, mut hi) = (bus.read_chr(addr), bus.read_chr(addr + 8));
            if attr & 0x40 != 0 {
                lo = lo.reverse_bits();
                hi = hi.reverse_bits();
            }

            self.sprites[self.sprite_count] = Sprite {
                x,
                attr,
                lo,
                hi,
                zero: i == 0,
            };
            self.sprite_count += 1;
        }
    }

    fn sprite_pixel(&self, x: u16) -> Option<(u8, Sprite)> {
        self.sprites[..self.sprite_count].iter().find_map(|sp| {
            let offset = x.wrapping_sub(sp.x as u16);
            if offset >= 8 {
                return None;
            }
            let shift = 7 - offset;
            let p = ((sp.lo >> shift) & 1) | (((sp.hi >> shift) & 1) << 1);
            (p != 0).then_some((p, *sp))
        })
    }

    fn render_pixel(&mut self) {
        let x = self.dot - 1;
        let left = x < 8;

        let bg = if self.mask.show_bg() && (!left || self.mask.show_bg_left()) {
            self.bg_pattern.get(self.x)
        } else {
            0
        };
        let sprite = if self.mask.show_sp() && (!left || self.mask.show_sp_left()) {
            self.sprite_pixel(x)
        } else {
            None
        };

        let bg_index = |ppu: &Ppu| (ppu.bg_attr.get(ppu.x) << 2) | bg;
        let index = match (bg, sprite) {
            (0, None) => 0,
            (0, Some((p, sp))) => sp.palette() | p,
            (_, None) => bg_index(self),
            (_, Some((p, sp))) => {
                if sp.zero && x != 255 {
                    self.status.insert(PpuStatus::SPRITE_ZERO_HIT);
                }
                if sp.behind_bg() {
                    bg_index(self)
                } else {
                    sp.palette() | p
                }
            }
        };

        let mut color = self.palette(index);
        if self.mask.gray_scale() {
            color &= 0x30;
        }
        self.frame_buf[self.scanline as usize * SCREEN_WIDTH + x as usize] = color;
    }
}

impl Ppu {
    pub fn read(&mut self, bus: &mut dyn PpuBus, addr: u16) -> u8 {
        let data = match addr & 0x07 {
            0x02 => {
                // reading right as vblank starts hides it for this frame
                if self.scanline == VBLANK_LINE && self.dot == 1 {
                    self.vbl_suppressed = true;
                }
                let b = (self.status.bits() & 0xe0) | (self.io_latch & 0x1f);
                self.status.remove(PpuStatus::VBLANK);
                self.w = false;
                b
            }
            0x04 => {
                if self.phase == ScanlinePhase::Visible && self.mask.rendering() {
                    0xff
                } else {
                    self.oam[self.oam_addr as usize]
                }
            }
            0x07 => {
                let addr = self.v.addr();
                let data = if addr < 0x3f00 {
                    let data = self.data_buf;
                    self.data_buf = self.read_vram(bus, addr);
                    data
                } else {
                    // the buffer sees the nametable byte under the palette
                    self.data_buf = self.read_vram(bus, addr - 0x1000);
                    self.palette(addr as u8)
                };
                self.v.inc(self.ctrl.addr_inc());
                data
            }
            reg => {
                tracing::trace!("read of write-only ppu register {}", reg);
                self.io_latch
            }
        };
        self.io_latch = data;
        data
    }

    /// Side effect free read for debuggers.
    pub fn peek(&self, addr: u16) -> u8 {
        match addr & 0x07 {
            0x02 => (self.status.bits() & 0xe0) | (self.io_latch & 0x1f),
            0x04 => self.oam[self.oam_addr as usize],
            _ => self.io_latch,
        }
    }

    pub fn write(&mut self, bus: &mut dyn PpuBus, addr: u16, data: u8) {
        self.io_latch = data;

        match addr & 0x07 {
            0x00 => {
                let was_on = self.ctrl.nmi_on();
                self.ctrl.set(data);
                self.t.set_nm(self.ctrl.nametable());
                if !was_on && self.ctrl.nmi_on() && self.status.contains(PpuStatus::VBLANK) {
                    self.raise_nmi();
                }
            }
            0x01 => self.mask.set(data),
            0x02 => tracing::trace!("write to ppu status {:02x}", data),
            0x03 => self.oam_addr = data,
            0x04 => {
                self.oam[self.oam_addr as usize] = data;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            0x05 => {
                if !self.w {
                    self.t.set_coarse_x((data >> 3) as u16);
                    self.x = data & 0b0111;
                } else {
                    self.t.set_coarse_y((data >> 3) as u16);
                    self.t.set_fine_y((data & 0b0111) as u16);
                }
                self.w = !self.w;
            }
            0x06 => {
                if !self.w {
                    self.t.set_high(data);
                } else {
                    self.t.set_low(data);
                    self.v = self.t;
                }
                self.w = !self.w;
            }
            _ => {
                self.write_vram(bus, self.v.addr(), data);
                self.v.inc(self.ctrl.addr_inc());
            }
        }
    }

    /// Copies a 256 byte page into OAM starting at OAMADDR.
    pub fn write_oam_dma(&mut self, page: &[u8; OAM_SIZE]) {
        for (i, &b) in page.iter().enumerate() {
            self.oam[(self.oam_addr as usize + i) & 0xff] = b;
        }
    }

    fn read_vram(&self, bus: &dyn PpuBus, addr: u16) -> u8 {
        let addr = addr & 0x3fff;
        match addr {
            0x0000..=0x1fff => bus.read_chr(addr),
            0x2000..=0x3eff => self.vram[self.mirroring.vram_index(addr)],
            _ => self.palette(addr as u8),
        }
    }

    fn write_vram(&mut self, bus: &mut dyn PpuBus, addr: u16, data: u8) {
        let addr = addr & 0x3fff;
        match addr {
            0x0000..=0x1fff => bus.write_chr(addr, data),
            0x2000..=0x3eff => self.vram[self.mirroring.vram_index(addr)] = data,
            _ => self.palettes[palette_index(addr as u8)] = data & 0x3f,
        }
    }
}

fn palette_index(index: u8) -> usize {
    let i = (index & 0x1f) as usize;
    if i >= 0x10 && i & 0b11 == 0 {
        i - 0x10
    } else {
        i
    }
}

impl Snapshot for Ppu {
    fn state_name(&self) -> &'static str {
        "ppu"
    }

    fn state_size(&self, _version: u32) -> usize {
        STATE_SIZE
    }

    fn save_state(&self, w: &mut StateWriter) {
        w.write_u8(self.ctrl.bits());
        w.write_u8(self.mask.bits());
        w.write_u8(self.status.bits());
        w.write_u8(self.oam_addr);
        w.write_u8(self.data_buf);
        w.write_u8(self.io_latch);

        w.write_u16(self.v.raw());
        w.write_u16(self.t.raw());
        w.write_u8(self.x);
        w.write_bool(self.w);

        w.write_bytes(&[self.next_tile, self.next_attr, self.next_lo, self.next_hi]);
        for reg in [self.bg_pattern, self.bg_attr] {
            let (lo, hi) = reg.raw();
            w.write_u16(lo);
            w.write_u16(hi);
        }

        for sp in self.sprites.iter() {
            w.write_bytes(&[sp.x, sp.attr, sp.lo, sp.hi]);
            w.write_bool(sp.zero);
        }
        w.write_u8(self.sprite_count as u8);

        w.write_bool(self.nmi);
        w.write_bool(self.nmi_fired);
        w.write_bool(self.vbl_suppressed);
        w.write_bool(self.frame_ready);
        w.write_u8(self.mirroring as u8);

        w.write_bytes(&self.oam[..]);
        w.write_bytes(&self.vram[..]);
        w.write_bytes(&self.palettes);

        w.write_u64(self.frame);
        w.write_u16(self.scanline);
        w.write_u16(self.dot);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>, _version: u32) -> Result<(), StateError> {
        self.ctrl.set(r.read_u8()?);
        self.mask.set(r.read_u8()?);
        self.status = PpuStatus::from_bits_truncate(r.read_u8()?);
        self.oam_addr = r.read_u8()?;
        self.data_buf = r.read_u8()?;
        self.io_latch = r.read_u8()?;

        self.v.set_raw(r.read_u16()?);
        self.t.set_raw(r.read_u16()?);
        self.x = r.read_u8()? & 0b0111;
        self.w = r.read_bool()?;

        self.next_tile = r.read_u8()?;
        self.next_attr = r.read_u8()? & 0b11;
        self.next_lo = r.read_u8()?;
        self.next_hi = r.read_u8()?;
        for reg in [&mut self.bg_pattern, &mut self.bg_attr] {
            let lo = r.read_u16()?;
            let hi = r.read_u16()?;
            *reg = ShiftReg::from_raw(lo, hi);
        }

        for sp in self.sprites.iter_mut() {
            sp.x = r.read_u8()?;
            sp.attr = r.read_u8()?;
            sp.lo = r.read_u8()?;
            sp.hi = r.read_u8()?;
            sp.zero = r.read_bool()?;
        }
        self.sprite_count = (r.read_u8()? as usize).min(SPRITE_SLOTS);

        self.nmi = r.read_bool()?;
        self.nmi_fired = r.read_bool()?;
        self.vbl_suppressed = r.read_bool()?;
        self.frame_ready = r.read_bool()?;
        self.mirroring = Mirroring::from_u8(r.read_u8()?);

        r.read_bytes(&mut self.oam[..])?;
        r.read_bytes(&mut self.vram[..])?;
        r.read_bytes(&mut self.palettes)?;

        self.frame = r.read_u64()?;
        self.scanline = r.read_u16()?.min(PRE_RENDER_LINE);
        self.dot = r.read_u16()?.min(LAST_DOT);
        self.phase = ScanlinePhase::from_scanline(self.scanline);
        Ok(())
    }
}
