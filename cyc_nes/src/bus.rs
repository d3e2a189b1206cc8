use crate::{
    apu::Apu,
    cart::Cartridge,
    cpu::CpuBus,
    ppu::{Ppu, PpuBus},
};

mod joystick;

pub use joystick::{Buttons, Joystick};

pub(crate) const RAM_SIZE: usize = 0x800;

/// CPU address space: work RAM, PPU and APU registers, controllers and the
/// cartridge.
pub struct Bus {
    pub(crate) ram: Box<[u8; RAM_SIZE]>,
    pub(crate) ppu: Ppu,
    pub(crate) apu: Apu,
    pub(crate) cart: Cartridge,
    pub(crate) joystick: Joystick,

    /// last value on the data bus
    open_bus: u8,
    oam_dma_page: Option<u8>,
}

impl Bus {
    pub fn new(cart: Cartridge, sample_rate: u32) -> Self {
        Self {
            ram: Box::new([0u8; RAM_SIZE]),
            ppu: Ppu::new(cart.mirroring()),
            apu: Apu::new(sample_rate),
            cart,
            joystick: Joystick::default(),

            open_bus: 0,
            oam_dma_page: None,
        }
    }

    pub fn reset(&mut self) {
        self.ppu.reset();
        self.ppu.set_mirroring(self.cart.mirroring());
        self.apu.reset();
        self.open_bus = 0;
        self.oam_dma_page = None;
    }

    pub fn joystick_mut(&mut self) -> &mut Joystick {
        &mut self.joystick
    }

    /// Page written to $4014 since the last call.
    pub(crate) fn take_oam_dma(&mut self) -> Option<u8> {
        self.oam_dma_page.take()
    }

    /// Copies CPU page `page` into OAM through the regular read path.
    pub(crate) fn oam_dma(&mut self, page: u8) {
        let base = (page as u16) << 8;
        let mut data = [0u8; 0x100];
        for (i, b) in data.iter_mut().enumerate() {
            *b = self.read(base | i as u16);
        }
        self.ppu.write_oam_dma(&data);
    }

    /// Feeds a pending DMC sample fetch, returns true if one happened.
    pub(crate) fn service_dmc(&mut self) -> bool {
        match self.apu.dmc_request() {
            Some(addr) => {
                let data = self.read(addr);
                self.apu.dmc_response(data);
                true
            }
            None => false,
        }
    }

    /// One PPU dot with the cartridge as pattern memory.
    pub(crate) fn step_ppu(&mut self) {
        self.ppu.step(&mut self.cart);
    }
}

impl CpuBus for Bus {
    fn read(&mut self, addr: u16) -> u8 {
        let data = match addr {
            0x0000..=0x1fff => self.ram[addr as usize & (RAM_SIZE - 1)],
            0x2000..=0x3fff => self.ppu.read(&mut self.cart, addr),
            0x4015 => self.apu.read(addr) | (self.open_bus & 0x20),
            0x4016 | 0x4017 => self.joystick.read(addr),
            0x6000..=0x7fff => self.cart.read_prg_ram(addr).unwrap_or(self.open_bus),
            0x8000..=0xffff => self.cart.read_prg(addr),
            _ => {
                tracing::trace!("open bus read {:04x}", addr);
                self.open_bus
            }
        };
        self.open_bus = data;
        data
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.open_bus = data;
        match addr {
            0x0000..=0x1fff => self.ram[addr as usize & (RAM_SIZE - 1)] = data,
            0x2000..=0x3fff => self.ppu.write(&mut self.cart, addr, data),
            0x4014 => self.oam_dma_page = Some(data),
            0x4016 => self.joystick.write(data),
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, data),
            0x6000..=0x7fff => self.cart.write_prg_ram(addr, data),
            0x8000..=0xffff => self.cart.write_prg(addr, data),
            _ => tracing::trace!("unmapped write {:04x} <- {:02x}", addr, data),
        }
    }

    fn inspect(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1fff => self.ram[addr as usize & (RAM_SIZE - 1)],
            0x2000..=0x3fff => self.ppu.peek(addr),
            0x4015 => self.apu.peek(addr),
            0x4016 | 0x4017 => self.joystick.peek(addr),
            0x6000..=0x7fff => self.cart.read_prg_ram(addr).unwrap_or(self.open_bus),
            0x8000..=0xffff => self.cart.read_prg(addr),
            _ => self.open_bus,
        }
    }
}

impl PpuBus for Cartridge {
    fn read_chr(&self, addr: u16) -> u8 {
        Cartridge::read_chr(self, addr)
    }

    fn write_chr(&mut self, addr: u16, data: u8) {
        Cartridge::write_chr(self, addr, data)
    }

    fn scanline(&mut self) {
        Cartridge::scanline(self)
    }
}
