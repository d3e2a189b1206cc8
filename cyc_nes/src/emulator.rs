use crate::{
    bus::{Bus, Buttons, RAM_SIZE},
    cart::{Cartridge, CartridgeError},
    cpu::{Cpu, CpuBus},
    device::{Operation, VirtualDevice, FRAME_BYTES},
    ppu::to_bgra,
    state::{Snapshot, StateError, StateReader, StateWriter, SAVE_MAGIC, SAVE_VERSION},
    Config, CPU_FREQUENCY,
};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

const DMC_STALL_CYCLES: u16 = 4;
/// At most this much emulated time is caught up in one batch.
const MAX_CATCH_UP: f64 = 0.1;
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// The whole console: CPU, bus and everything behind it.
pub struct Emulator {
    cpu: Cpu,
    bus: Bus,

    config: Config,
    device: Arc<VirtualDevice>,
    screen: Box<[u8]>,
    state_path: Option<PathBuf>,
}

impl Emulator {
    pub fn new(rom: &[u8], config: Config) -> Result<Self, CartridgeError> {
        let cart = Cartridge::load(rom)?;
        Ok(Self::with_cartridge(cart, config))
    }

    pub fn with_cartridge(cart: Cartridge, config: Config) -> Self {
        let mut cpu = Cpu::new();
        cpu.set_trace(config.trace_cpu);

        let mut emu = Self {
            cpu,
            bus: Bus::new(cart, config.sample_rate),
            device: Arc::new(VirtualDevice::new(&config)),
            config,
            screen: vec![0u8; FRAME_BYTES].into_boxed_slice(),
            state_path: None,
        };
        emu.reset();
        emu
    }

    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        tracing::debug!("reset, pc = {:04x}", self.cpu.pc());
    }

    /// Advances one CPU cycle, returns true when the PPU finished a frame.
    pub fn step(&mut self) -> bool {
        let Self { cpu, bus, .. } = self;

        cpu.step(bus);

        if let Some(page) = bus.take_oam_dma() {
            bus.oam_dma(page);
            cpu.add_dma_stall();
        }
        if bus.service_dmc() {
            cpu.stall(DMC_STALL_CYCLES);
        }

        for _ in 0..3 {
            bus.step_ppu();
            if bus.ppu.take_nmi() {
                cpu.nmi();
            }
        }

        bus.apu.tick();
        bus.cart.cpu_cycle();
        cpu.set_irq_line(bus.apu.irq_pending() || bus.cart.irq_pending());

        if let Some(mirroring) = bus.cart.take_mirroring() {
            bus.ppu.set_mirroring(mirroring);
        }

        bus.ppu.take_frame()
    }

    /// Runs until the next frame is complete.
    pub fn run_frame(&mut self) {
        while !self.step() {}
    }

    /// Runs in real time until `running` is cleared, publishing frames and
    /// audio to the device.
    pub fn run(&mut self, running: &AtomicBool) {
        tracing::info!("emulation started");

        let cycles_per_sec = CPU_FREQUENCY as f64;
        let mut last = Instant::now();
        let mut owed = 0.0f64;

        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            owed += now.duration_since(last).as_secs_f64() * cycles_per_sec;
            owed = owed.min(cycles_per_sec * MAX_CATCH_UP);
            last = now;

            let mut framed = false;
            while owed >= 1.0 {
                owed -= 1.0;
                if self.step() {
                    self.present();
                    self.poll_device();
                    framed = true;
                }
            }

            if !framed {
                thread::sleep(IDLE_SLEEP);
            }
        }

        tracing::info!("emulation stopped");
    }

    /// Publishes the current frame and the audio produced since the last call.
    pub fn present(&mut self) {
        to_bgra(self.bus.ppu.frame(), &mut self.screen);
        if !self.device.publish_frame(&self.screen) {
            tracing::trace!("frame dropped");
        }

        let dropped = self.device.push_audio(self.bus.apu.resampler().drain());
        if dropped > 0 {
            tracing::trace!("{} audio samples dropped", dropped);
        }
    }

    /// Applies frontend input and runs a pending save or load.
    pub fn poll_device(&mut self) {
        let [p1, p2] = self.device.controllers();
        self.set_buttons(0, p1);
        self.set_buttons(1, p2);

        let Some(op) = self.device.take_request() else {
            return;
        };
        let Some(path) = self.state_path.clone() else {
            tracing::warn!("{:?} requested without a state file", op);
            return;
        };
        match op {
            Operation::Save => {
                self.save_to_file(&path);
            }
            Operation::Load => {
                self.load_from_file(&path);
            }
        }
    }

    pub fn device(&self) -> Arc<VirtualDevice> {
        self.device.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_state_path(&mut self, path: impl Into<PathBuf>) {
        self.state_path = Some(path.into());
    }

    pub fn set_buttons(&mut self, port: usize, buttons: Buttons) {
        self.bus.joystick.set_buttons(port, buttons);
    }

    /// Current frame as BGRA bytes.
    pub fn frame_bgra(&mut self) -> &[u8] {
        to_bgra(self.bus.ppu.frame(), &mut self.screen);
        &self.screen
    }

    /// Moves the samples produced so far into `out`.
    pub fn take_audio(&mut self, out: &mut Vec<i16>) {
        out.extend(self.bus.apu.resampler().drain());
    }

    /// Reads CPU memory without side effects.
    pub fn peek(&self, addr: u16) -> u8 {
        self.bus.inspect(addr)
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.bus.cart
    }

    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.bus.cart
    }

    fn state_size(&self, version: u32) -> usize {
        RAM_SIZE
            + self.cpu.state_size(version)
            + self.bus.ppu.state_size(version)
            + self.bus.cart.state_size(version)
            + self.bus.apu.state_size(version)
    }

    pub fn save_state(&self) -> Vec<u8> {
        let mut w = StateWriter::with_capacity(8 + self.state_size(SAVE_VERSION));
        w.write_i32(SAVE_MAGIC);
        w.write_u32(SAVE_VERSION);
        w.write_bytes(&self.bus.ram[..]);
        self.cpu.save_state(&mut w);
        self.bus.ppu.save_state(&mut w);
        self.bus.cart.save_state(&mut w);
        self.bus.apu.save_state(&mut w);
        w.into_inner()
    }

    /// Restores a state written by [`Emulator::save_state`]. Nothing changes
    /// unless the whole file is valid.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        let mut r = StateReader::new(data);
        let magic = r.read_i32()?;
        if magic != SAVE_MAGIC {
            return Err(StateError::BadMagic(magic));
        }
        let version = r.read_u32()?;
        if version > SAVE_VERSION {
            return Err(StateError::UnsupportedVersion(version));
        }

        let expected = self.state_size(version);
        if r.remaining() != expected {
            return Err(StateError::RecordSize {
                name: "save",
                expected,
                found: r.remaining(),
            });
        }

        r.read_bytes(&mut self.bus.ram[..])?;
        load_part(&mut self.cpu, &mut r, version)?;
        load_part(&mut self.bus.ppu, &mut r, version)?;
        load_part(&mut self.bus.cart, &mut r, version)?;
        load_part(&mut self.bus.apu, &mut r, version)?;
        self.bus.ppu.set_mirroring(self.bus.cart.mirroring());
        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> bool {
        match std::fs::write(path, self.save_state()) {
            Ok(()) => {
                tracing::info!("state saved to {}", path.display());
                true
            }
            Err(e) => {
                tracing::warn!("failed to save state to {}: {}", path.display(), e);
                false
            }
        }
    }

    pub fn load_from_file(&mut self, path: &Path) -> bool {
        let result = std::fs::read(path)
            .map_err(StateError::from)
            .and_then(|data| self.load_state(&data));
        match result {
            Ok(()) => {
                tracing::info!("state loaded from {}", path.display());
                true
            }
            Err(e) => {
                tracing::warn!("failed to load state from {}: {}", path.display(), e);
                false
            }
        }
    }
}

fn load_part<T: Snapshot>(
    item: &mut T,
    r: &mut StateReader<'_>,
    version: u32,
) -> Result<(), StateError> {
    let mut part = r.take(item.state_size(version))?;
    item.load_state(&mut part, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::tests::ines;

    /// NROM image whose reset vector points at a `JMP $8000` loop.
    fn looping_rom() -> Vec<u8> {
        let mut rom = ines(0, 2, 1, 0);
        let prg = &mut rom[16..16 + 0x8000];
        prg[..3].copy_from_slice(&[0x4c, 0x00, 0x80]);
        prg[0x7ffc] = 0x00;
        prg[0x7ffd] = 0x80;
        rom
    }

    #[test]
    fn test_reset_vector() {
        let emu = Emulator::new(&looping_rom(), Config::default()).unwrap();
        assert_eq!(emu.cpu().pc(), 0x8000);
    }

    #[test]
    fn test_frame_length() {
        let mut emu = Emulator::new(&looping_rom(), Config::default()).unwrap();
        emu.run_frame();
        let start = emu.cpu().cycles();
        emu.run_frame();
        // 89342 dots / 3, rendering is off so every frame is the same length
        let cycles = emu.cpu().cycles() - start;
        assert!((29780..=29781).contains(&cycles), "{}", cycles);
    }

    #[test]
    fn test_oam_dma_stalls_cpu() {
        let mut rom = ines(0, 2, 1, 0);
        let prg = &mut rom[16..16 + 0x8000];
        // LDA #$02, STA $4014, JMP *
        prg[..8].copy_from_slice(&[0xa9, 0x02, 0x8d, 0x14, 0x40, 0x4c, 0x05, 0x80]);
        prg[0x7ffc] = 0x00;
        prg[0x7ffd] = 0x80;

        let mut emu = Emulator::new(&rom, Config::default()).unwrap();
        // LDA takes 2 cycles, the store executes on the third
        for _ in 0..3 {
            emu.step();
        }
        let mut stalled = 0;
        while !emu.cpu().is_idle() {
            emu.step();
            stalled += 1;
        }
        assert!(stalled >= 513, "{}", stalled);
    }

    #[test]
    fn test_present_feeds_device() {
        let mut emu = Emulator::new(&looping_rom(), Config::default()).unwrap();
        let device = emu.device();
        emu.run_frame();
        emu.present();

        let mut frame = vec![0u8; FRAME_BYTES];
        assert!(device.wait_frame(&mut frame, Duration::from_millis(10)));
        // universal background color 0x00 everywhere
        assert_eq!(&frame[..4], &[84, 84, 84, 0xff]);
        assert!(device.audio_len() > 0);
    }

    #[test]
    fn test_poll_device_applies_input() {
        let mut emu = Emulator::new(&looping_rom(), Config::default()).unwrap();
        let device = emu.device();
        device.key_down(0, crate::device::Key::Start);
        device.turbo_tick(Instant::now());
        emu.poll_device();
        assert_eq!(emu.bus.joystick.buttons(0), Buttons::START);

        // a request without a state path is dropped
        device.request(Operation::Save);
        emu.poll_device();
        assert_eq!(device.take_request(), None);
    }
}
