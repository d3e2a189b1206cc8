//! State shared between the emulator thread and the frontend.
//!
//! The emulator owns the back buffer and publishes finished frames into a
//! single front buffer; the frontend takes them with [`VirtualDevice::wait_frame`].
//! Audio goes through a bounded ring, input comes back as one packed word.

use crate::{
    bus::Buttons,
    ppu::{SCREEN_HEIGHT, SCREEN_WIDTH},
    Config,
};
use crossbeam_queue::ArrayQueue;
use parking_lot::{Condvar, Mutex};
use std::{
    sync::atomic::{AtomicU16, Ordering},
    time::{Duration, Instant},
};

/// Size of a BGRA frame in bytes.
pub const FRAME_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 4;

/// Keys a frontend can press, the first eight map onto [`Buttons`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    A,
    B,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
    TurboA,
    TurboB,
}

impl Key {
    fn mask(self) -> u16 {
        1 << self as u16
    }
}

/// Requests handled by the emulator at the next frame boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Save,
    Load,
}

struct FrontBuffer {
    pixels: Box<[u8]>,
    fresh: bool,
}

struct Turbo {
    on: bool,
    toggled_at: Instant,
}

pub struct VirtualDevice {
    front: Mutex<FrontBuffer>,
    frame_cond: Condvar,
    frame_timeout: Duration,

    audio: ArrayQueue<i16>,

    keys: [AtomicU16; 2],
    turbo: Mutex<Turbo>,
    turbo_interval: Duration,
    /// player 1 in the high byte
    controllers: AtomicU16,

    pending: Mutex<Option<Operation>>,
}

impl VirtualDevice {
    pub fn new(config: &Config) -> Self {
        Self {
            front: Mutex::new(FrontBuffer {
                pixels: vec![0u8; FRAME_BYTES].into_boxed_slice(),
                fresh: false,
            }),
            frame_cond: Condvar::new(),
            frame_timeout: config.frame_timeout,

            audio: ArrayQueue::new(config.audio_queue_len.max(1)),

            keys: [AtomicU16::new(0), AtomicU16::new(0)],
            turbo: Mutex::new(Turbo {
                on: false,
                toggled_at: Instant::now(),
            }),
            turbo_interval: config.turbo_interval,
            controllers: AtomicU16::new(0),

            pending: Mutex::new(None),
        }
    }

    /// Hands a finished frame to the frontend.
    ///
    /// Waits up to the frame timeout for the previous frame to be taken,
    /// then overwrites it anyway. Returns false if a frame was dropped.
    pub fn publish_frame(&self, pixels: &[u8]) -> bool {
        let deadline = Instant::now() + self.frame_timeout;
        let mut front = self.front.lock();
        while front.fresh {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.frame_cond.wait_for(&mut front, remaining);
        }

        let dropped = front.fresh;
        let len = pixels.len().min(front.pixels.len());
        front.pixels[..len].copy_from_slice(&pixels[..len]);
        front.fresh = true;
        self.frame_cond.notify_all();
        !dropped
    }

    /// Copies the next published frame into `out`, waiting up to `timeout`.
    pub fn wait_frame(&self, out: &mut [u8], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut front = self.front.lock();
        while !front.fresh {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.frame_cond.wait_for(&mut front, remaining);
        }

        let len = out.len().min(front.pixels.len());
        out[..len].copy_from_slice(&front.pixels[..len]);
        front.fresh = false;
        self.frame_cond.notify_all();
        true
    }

    /// Queues samples, the ones that do not fit are dropped.
    pub fn push_audio(&self, samples: impl IntoIterator<Item = i16>) -> usize {
        samples
            .into_iter()
            .map(|s| self.audio.push(s).is_ok())
            .filter(|&pushed| !pushed)
            .count()
    }

    /// Fills `out` from the audio ring and returns how many samples were real.
    /// The rest of `out` is silence.
    pub fn pop_audio(&self, out: &mut [i16]) -> usize {
        let mut n = 0;
        for s in out.iter_mut() {
            match self.audio.pop() {
                Some(v) => {
                    *s = v;
                    n += 1;
                }
                None => *s = 0,
            }
        }
        n
    }

    pub fn audio_len(&self) -> usize {
        self.audio.len()
    }

    pub fn key_down(&self, player: usize, key: Key) {
        if let Some(keys) = self.keys.get(player) {
            keys.fetch_or(key.mask(), Ordering::Relaxed);
        }
    }

    pub fn key_up(&self, player: usize, key: Key) {
        if let Some(keys) = self.keys.get(player) {
            keys.fetch_and(!key.mask(), Ordering::Relaxed);
        }
    }

    pub fn is_key_down(&self, player: usize, key: Key) -> bool {
        self.keys
            .get(player)
            .map_or(false, |k| k.load(Ordering::Relaxed) & key.mask() != 0)
    }

    /// Advances the turbo phase and packs the pads for the emulator.
    /// Called by the frontend once per input poll.
    pub fn turbo_tick(&self, now: Instant) {
        let turbo_held = (0..2).any(|p| {
            self.is_key_down(p, Key::TurboA) || self.is_key_down(p, Key::TurboB)
        });

        let on = {
            let mut turbo = self.turbo.lock();
            if turbo_held && now.saturating_duration_since(turbo.toggled_at) >= self.turbo_interval
            {
                turbo.on = !turbo.on;
                turbo.toggled_at = now;
            }
            turbo.on
        };

        let p1 = self.pad(0, on).bits() as u16;
        let p2 = self.pad(1, on).bits() as u16;
        self.controllers.store(p1 << 8 | p2, Ordering::Relaxed);
    }

    fn pad(&self, player: usize, turbo_on: bool) -> Buttons {
        let keys = self.keys[player].load(Ordering::Relaxed);
        let mut pad = Buttons::from_bits_truncate(keys as u8);
        if turbo_on {
            pad.set(Buttons::A, pad.contains(Buttons::A) || keys & Key::TurboA.mask() != 0);
            pad.set(Buttons::B, pad.contains(Buttons::B) || keys & Key::TurboB.mask() != 0);
        }
        pad
    }

    /// Pads as of the last `turbo_tick`.
    pub fn controllers(&self) -> [Buttons; 2] {
        let packed = self.controllers.load(Ordering::Relaxed);
        [
            Buttons::from_bits_truncate((packed >> 8) as u8),
            Buttons::from_bits_truncate(packed as u8),
        ]
    }

    pub fn request(&self, op: Operation) {
        *self.pending.lock() = Some(op);
    }

    pub fn take_request(&self) -> Option<Operation> {
        self.pending.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    fn device() -> VirtualDevice {
        VirtualDevice::new(&Config {
            audio_queue_len: 4,
            frame_timeout: Duration::from_millis(10),
            turbo_interval: Duration::from_millis(20),
            ..Config::default()
        })
    }

    #[test]
    fn test_frame_handoff() {
        let dev = Arc::new(device());
        let mut out = vec![0u8; FRAME_BYTES];
        assert!(!dev.wait_frame(&mut out, Duration::from_millis(1)));

        let producer = {
            let dev = dev.clone();
            thread::spawn(move || dev.publish_frame(&vec![7u8; FRAME_BYTES]))
        };
        assert!(dev.wait_frame(&mut out, Duration::from_secs(5)));
        assert!(producer.join().unwrap());
        assert!(out.iter().all(|&b| b == 7));

        // nobody consumes the first frame, the second one replaces it
        assert!(dev.publish_frame(&vec![1u8; FRAME_BYTES]));
        assert!(!dev.publish_frame(&vec![2u8; FRAME_BYTES]));
        assert!(dev.wait_frame(&mut out, Duration::from_millis(1)));
        assert_eq!(out[0], 2);
    }

    #[test]
    fn test_audio_ring() {
        let dev = device();
        assert_eq!(dev.push_audio([1, 2, 3, 4, 5, 6]), 2);
        assert_eq!(dev.audio_len(), 4);

        let mut out = [9i16; 6];
        assert_eq!(dev.pop_audio(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn test_input_packing() {
        let dev = device();
        dev.key_down(0, Key::A);
        dev.key_down(0, Key::Right);
        dev.key_down(1, Key::Start);
        dev.turbo_tick(Instant::now());
        assert_eq!(dev.controllers(), [Buttons::A | Buttons::RIGHT, Buttons::START]);

        dev.key_up(0, Key::A);
        assert!(!dev.is_key_down(0, Key::A));
        dev.turbo_tick(Instant::now());
        assert_eq!(dev.controllers()[0], Buttons::RIGHT);

        // out of range players are ignored
        dev.key_down(5, Key::B);
    }

    #[test]
    fn test_turbo_toggles() {
        let dev = device();
        dev.key_down(1, Key::TurboB);
        let t0 = Instant::now();

        dev.turbo_tick(t0 + Duration::from_millis(25));
        let first = dev.controllers()[1].contains(Buttons::B);
        dev.turbo_tick(t0 + Duration::from_millis(30));
        assert_eq!(dev.controllers()[1].contains(Buttons::B), first);
        dev.turbo_tick(t0 + Duration::from_millis(50));
        assert_ne!(dev.controllers()[1].contains(Buttons::B), first);
    }

    #[test]
    fn test_pending_operation() {
        let dev = device();
        assert_eq!(dev.take_request(), None);
        dev.request(Operation::Save);
        dev.request(Operation::Load);
        assert_eq!(dev.take_request(), Some(Operation::Load));
        assert_eq!(dev.take_request(), None);
    }
}
