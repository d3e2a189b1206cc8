use std::time::Duration;

/// Emulator settings supplied by the frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Capacity of the audio ring shared with the frontend, in samples.
    pub audio_queue_len: usize,
    /// How long `publish_frame` waits for the previous frame to be taken.
    pub frame_timeout: Duration,
    /// Toggle period of the turbo buttons.
    pub turbo_interval: Duration,
    /// Emit a `trace!` line per executed instruction.
    pub trace_cpu: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            audio_queue_len: 2048 * 4,
            frame_timeout: Duration::from_millis(100),
            turbo_interval: Duration::from_millis(20),
            trace_cpu: false,
        }
    }
}
