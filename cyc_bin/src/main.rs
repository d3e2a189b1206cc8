use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use cyc_nes::{device::FRAME_BYTES, Config, Emulator};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

const FRAME_WAIT: Duration = Duration::from_secs(2);
const AUDIO_CHUNK: usize = 2048;

/// Runs a cartridge without a window, consuming video and audio.
#[derive(Parser, Debug)]
#[command(name = "cyc_bin", version)]
struct Args {
    /// Path to the iNES ROM file
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 300)]
    frames: u32,

    /// Audio sample rate in Hz
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,

    /// Save-state file, defaults to the ROM path with a .state extension
    #[arg(long)]
    state: Option<PathBuf>,

    /// Write a save-state when done
    #[arg(long)]
    save_state: bool,

    /// Restore the save-state before running
    #[arg(long)]
    load_state: bool,

    /// Log every executed instruction at trace level
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let rom = std::fs::read(&args.rom)
        .with_context(|| format!("failed to read {}", args.rom.display()))?;
    let config = Config {
        sample_rate: args.sample_rate,
        trace_cpu: args.trace,
        ..Config::default()
    };
    let mut emu = Emulator::new(&rom, config).context("failed to load cartridge")?;

    let sav_path = args.rom.with_extension("sav");
    load_battery(&mut emu, &sav_path);

    let state_path = args
        .state
        .clone()
        .unwrap_or_else(|| args.rom.with_extension("state"));
    emu.set_state_path(&state_path);
    if args.load_state {
        emu.load_from_file(&state_path);
    }

    let device = emu.device();
    let running = Arc::new(AtomicBool::new(true));
    let worker = {
        let running = running.clone();
        thread::Builder::new()
            .name("emulator".into())
            .spawn(move || {
                emu.run(&running);
                emu
            })
            .context("failed to start the emulator thread")?
    };

    let started = Instant::now();
    let mut frame = vec![0u8; FRAME_BYTES];
    let mut audio = vec![0i16; AUDIO_CHUNK];
    let mut frames = 0;
    let mut samples = 0;
    let mut stalled = false;

    while frames < args.frames {
        device.turbo_tick(Instant::now());
        if !device.wait_frame(&mut frame, FRAME_WAIT) {
            stalled = true;
            break;
        }
        frames += 1;
        while device.audio_len() > 0 {
            samples += device.pop_audio(&mut audio);
        }
    }

    running.store(false, Ordering::Relaxed);
    let emu = worker
        .join()
        .map_err(|_| anyhow!("emulator thread panicked"))?;

    if stalled {
        bail!("no frame within {:?} after {} frames", FRAME_WAIT, frames);
    }

    let elapsed = started.elapsed().as_secs_f32();
    tracing::info!(
        frames,
        samples,
        fps = frames as f32 / elapsed,
        "done, pc = {:04x}",
        emu.cpu().pc()
    );

    if args.save_state {
        emu.save_to_file(&state_path);
    }
    save_battery(&emu, &sav_path)
}

fn load_battery(emu: &mut Emulator, path: &Path) {
    if !emu.cartridge().has_battery() {
        return;
    }
    match std::fs::read(path) {
        Ok(data) => {
            if emu.cartridge_mut().load_battery_ram(&data) {
                tracing::info!("battery RAM loaded from {}", path.display());
            } else {
                tracing::warn!("ignoring {}, wrong size", path.display());
            }
        }
        Err(e) => tracing::debug!("no battery RAM at {}: {}", path.display(), e),
    }
}

fn save_battery(emu: &Emulator, path: &Path) -> Result<()> {
    if let Some(ram) = emu.cartridge().battery_ram() {
        std::fs::write(path, ram)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("battery RAM saved to {}", path.display());
    }
    Ok(())
}
