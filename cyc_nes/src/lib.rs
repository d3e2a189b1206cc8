#![allow(clippy::identity_op)]

pub mod apu;
pub mod bus;
pub mod cart;
pub mod cpu;
pub mod device;
pub mod ppu;
pub mod state;

mod config;
mod emulator;

pub use apu::{Apu, Resampler};
pub use bus::{Bus, Buttons};
pub use cart::{Cartridge, CartridgeError, Mirroring};
pub use config::Config;
pub use cpu::Cpu;
pub use device::{Key, Operation, VirtualDevice};
pub use emulator::Emulator;
pub use ppu::{Ppu, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use state::StateError;

/// NES NTSC
pub const MASTER_CLOCK: f32 = 2147_7272.0;

/// cpu frequency
pub const CPU_FREQUENCY: f32 = MASTER_CLOCK / 12.0;
