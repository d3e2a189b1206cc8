use crate::state::{Snapshot, StateError, StateReader, StateWriter};
use bit_field::BitField;

mod dmc;
mod noise;
mod pulse;
mod resampler;
mod triangle;
mod units;

use dmc::Dmc;
use noise::Noise;
use pulse::Pulse;
pub use resampler::Resampler;
use triangle::Triangle;
use units::*;

const STATE_SIZE: usize = FrameCounter::STATE_SIZE
    + Pulse::STATE_SIZE * 2
    + Triangle::STATE_SIZE
    + Noise::STATE_SIZE
    + Dmc::STATE_SIZE
    + 8;

trait Channel {
    fn output(&self) -> u8;

    fn clock_timer(&mut self);
    /// envelope and linear counter
    fn clock_quarter(&mut self) {}
    /// length counter and sweep
    fn clock_half(&mut self) {}

    /// `reg` is the register index within the channel, 0..=3
    fn write(&mut self, reg: u16, data: u8);

    fn set_enable(&mut self, enable: bool);
    fn enabled(&self) -> bool;

    fn save(&self, w: &mut StateWriter);
    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError>;
}

pub struct Apu {
    frame: FrameCounter,
    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,

    cycles: u64,
    resampler: Resampler,
}

impl Apu {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frame: FrameCounter::new(),
            pulse1: Pulse::new(true),
            pulse2: Pulse::new(false),
            triangle: Triangle::new(),
            noise: Noise::new(),
            dmc: Dmc::new(),

            cycles: 0,
            resampler: Resampler::new(sample_rate),
        }
    }

    /// Advances one CPU cycle and feeds the mixer output to the resampler.
    pub fn tick(&mut self) {
        let step = self.frame.tick();
        self.frame_tick(step);

        self.cycles += 1;
        if self.cycles % 2 == 0 {
            self.pulse1.clock_timer();
            self.pulse2.clock_timer();
        }
        self.triangle.clock_timer();
        self.noise.clock_timer();
        self.dmc.clock_timer();

        let s = self.output();
        self.resampler.add_sample(s);
    }

    /// Mixer output in 0.0..=1.0.
    pub fn output(&self) -> f32 {
        let pulse = self.pulse1.output() + self.pulse2.output();
        let tnd = self.triangle.output() as usize * 3
            + self.noise.output() as usize * 2
            + self.dmc.output() as usize;
        PULSE_TABLE[pulse as usize] + TND_TABLE[tnd]
    }

    fn frame_tick(&mut self, step: Step) {
        if step.contains(Step::ENVELOPE) {
            self.pulse1.clock_quarter();
            self.pulse2.clock_quarter();
            self.triangle.clock_quarter();
            self.noise.clock_quarter();
        }
        if step.contains(Step::LENGTH) {
            self.pulse1.clock_half();
            self.pulse2.clock_half();
            self.triangle.clock_half();
            self.noise.clock_half();
        }
    }

    /// Frame or DMC interrupt line.
    pub fn irq_pending(&self) -> bool {
        self.frame.irq() || self.dmc.irq()
    }

    /// Address of a DMC sample byte the bus has to fetch.
    pub fn dmc_request(&mut self) -> Option<u16> {
        self.dmc.take_request()
    }

    pub fn dmc_response(&mut self, data: u8) {
        self.dmc.fill_buffer(data);
    }

    pub fn reset(&mut self) {
        self.write(0x4015, 0x00);
        self.frame.ack_irq();
        self.resampler.clear();
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        let data = self.peek(addr);
        if addr == 0x4015 {
            self.frame.ack_irq();
        }
        data
    }

    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x4015 => {
                let mut data = 0;
                data.set_bit(7, self.dmc.irq());
                data.set_bit(6, self.frame.irq());
                data.set_bit(4, self.dmc.enabled());
                data.set_bit(3, self.noise.enabled());
                data.set_bit(2, self.triangle.enabled());
                data.set_bit(1, self.pulse2.enabled());
                data.set_bit(0, self.pulse1.enabled());
                data
            }
            _ => 0x00,
        }
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        let reg = addr & 0b11;
        match addr {
            0x4000..=0x4003 => self.pulse1.write(reg, data),
            0x4004..=0x4007 => self.pulse2.write(reg, data),
            0x4008..=0x400b => self.triangle.write(reg, data),
            0x400c..=0x400f => self.noise.write(reg, data),
            0x4010..=0x4013 => self.dmc.write(reg, data),
            0x4015 => {
                self.dmc.set_enable(data.get_bit(4));
                self.noise.set_enable(data.get_bit(3));
                self.triangle.set_enable(data.get_bit(2));
                self.pulse2.set_enable(data.get_bit(1));
                self.pulse1.set_enable(data.get_bit(0));
                self.dmc.ack_irq();
            }
            0x4017 => {
                self.frame.load(data);
                if data.get_bit(7) {
                    self.frame_tick(Step::LENGTH | Step::ENVELOPE);
                }
            }
            _ => tracing::trace!("unmapped apu write {:04x}", addr),
        }
    }

    pub fn resampler(&mut self) -> &mut Resampler {
        &mut self.resampler
    }
}

impl Snapshot for Apu {
    fn state_name(&self) -> &'static str {
        "apu"
    }

    fn state_size(&self, _version: u32) -> usize {
        STATE_SIZE
    }

    fn save_state(&self, w: &mut StateWriter) {
        self.frame.save(w);
        self.pulse1.save(w);
        self.pulse2.save(w);
        self.triangle.save(w);
        self.noise.save(w);
        self.dmc.save(w);
        w.write_u64(self.cycles);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>, _version: u32) -> Result<(), StateError> {
        self.frame.load_state(r)?;
        self.pulse1.load(r)?;
        self.pulse2.load(r)?;
        self.triangle.load(r)?;
        self.noise.load(r)?;
        self.dmc.load(r)?;
        self.cycles = r.read_u64()?;
        self.resampler.clear();
        Ok(())
    }
}

lazy_static::lazy_static! {
    static ref PULSE_TABLE: [f32; 31] = {
        let mut table = [0.0f32; 31];
        table.iter_mut().enumerate().skip(1).for_each(|(i, t)| {
            *t = 95.52 / (8128.0 / i as f32 + 100.0);
        });
        table
    };

    static ref TND_TABLE: [f32; 203] = {
        let mut table = [0.0f32; 203];
        table.iter_mut().enumerate().skip(1).for_each(|(i, t)| {
            *t = 163.67 / (24329.0 / i as f32 + 100.0);
        });
        table
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{load_record, save_record};

    const FRAME_CYCLES: usize = 4 * 7458;

    #[test]
    fn test_mixer_tables() {
        assert_eq!(PULSE_TABLE[0], 0.0);
        assert_eq!(TND_TABLE[0], 0.0);
        assert!((PULSE_TABLE[30] - 0.2575).abs() < 1e-3);
        assert!((TND_TABLE[202] - 0.7425).abs() < 1e-3);
    }

    #[test]
    fn test_status_register() {
        let mut apu = Apu::new(44100);
        apu.write(0x4003, 0x08);
        assert_eq!(apu.read(0x4015) & 0x01, 0);

        apu.write(0x4015, 0x0f);
        apu.write(0x4003, 0x08);
        apu.write(0x4007, 0x08);
        apu.write(0x400b, 0x08);
        apu.write(0x400f, 0x08);
        assert_eq!(apu.read(0x4015) & 0x1f, 0x0f);

        apu.write(0x4015, 0x01);
        assert_eq!(apu.read(0x4015) & 0x1f, 0x01);
    }

    #[test]
    fn test_immediate_clock() {
        let mut apu = Apu::new(44100);
        apu.write(0x4015, 0x01);
        // length index 3 loads 2
        apu.write(0x4003, 3 << 3);
        apu.write(0x4017, 0x80);
        assert_eq!(apu.read(0x4015) & 0x01, 0x01);
        apu.write(0x4017, 0x80);
        assert_eq!(apu.read(0x4015) & 0x01, 0x00);
    }

    #[test]
    fn test_frame_irq() {
        let mut apu = Apu::new(44100);
        for _ in 0..FRAME_CYCLES {
            apu.tick();
        }
        assert!(apu.irq_pending());
        assert_eq!(apu.read(0x4015) & 0x40, 0x40);
        assert!(!apu.irq_pending());
        assert_eq!(apu.read(0x4015) & 0x40, 0x00);

        // inhibited
        apu.write(0x4017, 0x40);
        for _ in 0..FRAME_CYCLES {
            apu.tick();
        }
        assert!(!apu.irq_pending());
    }

    #[test]
    fn test_dmc_irq() {
        let mut apu = Apu::new(44100);
        apu.write(0x4017, 0x40);
        apu.write(0x4010, 0x80);
        apu.write(0x4013, 0x00);
        apu.write(0x4015, 0x10);
        apu.tick();

        assert_eq!(apu.dmc_request(), Some(0xc000));
        apu.dmc_response(0x55);
        assert!(apu.irq_pending());
        assert_eq!(apu.peek(0x4015) & 0x80, 0x80);

        // a $4015 read leaves the DMC flag alone, a write clears it
        apu.read(0x4015);
        assert!(apu.irq_pending());
        apu.write(0x4015, 0x00);
        assert!(!apu.irq_pending());
    }

    #[test]
    fn test_audio_output() {
        let mut apu = Apu::new(44100);
        apu.write(0x4015, 0x01);
        apu.write(0x4000, 0b1011_1111);
        apu.write(0x4002, 0xfd);
        apu.write(0x4003, 0x08);

        for _ in 0..FRAME_CYCLES {
            apu.tick();
        }
        let samples: Vec<i16> = apu.resampler().drain().collect();
        assert!(samples.len() > 700);
        // the triangle rests at a non-zero level, so only the pulse swings
        let min = samples.iter().copied().min().unwrap();
        let max = samples.iter().copied().max().unwrap();
        assert!(max - min > 2000, "{} {}", min, max);
    }

    #[test]
    fn test_state_round_trip() {
        let mut apu = Apu::new(44100);
        apu.write(0x4015, 0x1f);
        apu.write(0x4000, 0x3f);
        apu.write(0x4003, 0x08);
        apu.write(0x400c, 0x1f);
        apu.write(0x400e, 0x03);
        apu.write(0x400f, 0x08);
        for _ in 0..10_000 {
            apu.tick();
        }

        let record = save_record(&apu);
        assert_eq!(record.len(), STATE_SIZE);

        let mut other = Apu::new(48000);
        load_record(&mut other, &record, 0).unwrap();
        assert_eq!(save_record(&other), record);

        for _ in 0..5000 {
            apu.tick();
            other.tick();
            assert_eq!(apu.output(), other.output());
        }

        assert!(load_record(&mut other, &record[..10], 0).is_err());
    }
}
