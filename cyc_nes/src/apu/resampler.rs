/// Averages the CPU rate mixer output down to the host sample rate.
///
/// Every output sample is the mean of the mixer values that fell into its
/// period, the fractional remainder carries over into the next one.
#[derive(Debug)]
pub struct Resampler {
    sample_rate: u32,
    cycles_per_sample: f64,
    phase: f64,
    sum: f32,
    count: u32,
    samples: Vec<i16>,
}

impl Resampler {
    pub fn new(sample_rate: u32) -> Self {
        let mut resampler = Self {
            sample_rate: 0,
            cycles_per_sample: 0.0,
            phase: 0.0,
            sum: 0.0,
            count: 0,
            samples: Vec::with_capacity(4096),
        };
        resampler.set_sample_rate(sample_rate);
        resampler
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
        self.cycles_per_sample = crate::CPU_FREQUENCY as f64 / self.sample_rate as f64;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn add_sample(&mut self, s: f32) {
        self.sum += s;
        self.count += 1;
        self.phase += 1.0;

        if self.phase >= self.cycles_per_sample {
            self.phase -= self.cycles_per_sample;
            let mean = self.sum / self.count as f32;
            self.samples
                .push((mean.clamp(0.0, 1.0) * i16::MAX as f32) as i16);
            self.sum = 0.0;
            self.count = 0;
        }
    }

    pub fn avail(&self) -> usize {
        self.samples.len()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, i16> {
        self.samples.drain(..)
    }

    pub fn clear(&mut self) {
        self.phase = 0.0;
        self.sum = 0.0;
        self.count = 0;
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_conversion() {
        let mut r = Resampler::new(44100);
        for _ in 0..crate::CPU_FREQUENCY as usize {
            r.add_sample(0.5);
        }
        let n = r.avail();
        assert!((44099..=44101).contains(&n), "{} samples", n);
        assert!(r.drain().all(|s| s == i16::MAX / 2));
        assert_eq!(r.avail(), 0);
    }

    #[test]
    fn test_averaging() {
        let mut r = Resampler::new(44100);
        r.cycles_per_sample = 2.0;
        r.add_sample(0.0);
        r.add_sample(1.0);
        r.add_sample(1.0);
        r.add_sample(1.0);
        let out: Vec<i16> = r.drain().collect();
        assert_eq!(out, [i16::MAX / 2, i16::MAX]);
    }
}
