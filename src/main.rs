//! yearn - headless libretro frontend
//!
//! Runs a ROM for a number of frames on a statically linked core, optionally
//! restoring and writing save-state slots along the way.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use yc_core::Config;
use yc_integration::{Game, SessionManager};
use yc_libretro::{CoreRegistry, System};

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to ROM file
    rom: Option<PathBuf>,

    /// Number of frames to run
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// System short name, overriding detection from the file extension
    #[arg(long)]
    system: Option<String>,

    /// Core id to use for this run
    #[arg(long)]
    core: Option<String>,

    /// Configuration file (defaults to the per-user config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Restore this save-state slot before running
    #[arg(long)]
    load_slot: Option<u32>,

    /// Write a save state to this slot after running
    #[arg(long)]
    slot: Option<u32>,

    /// Pace frames against the wall clock instead of running flat out
    #[arg(long)]
    realtime: bool,

    /// Speed multiplier when pacing in real time
    #[arg(long)]
    speed: Option<f32>,

    /// List the linked cores and exit
    #[arg(long)]
    list_cores: bool,
}

fn list_cores() {
    let registry = CoreRegistry::builtin();
    for core in registry.all() {
        let systems: Vec<&str> = core.systems.iter().map(|s| s.short_name()).collect();
        println!("{:<20} {:<28} {}", core.id, core.display_name, systems.join(", "));
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.list_cores {
        list_cores();
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };
    yc_core::logging::init(&config.debug);

    let Some(rom) = args.rom else {
        bail!("no ROM given (see --help)");
    };

    let game = match &args.system {
        Some(name) => {
            let Some(system) = System::from_short_name(name) else {
                bail!("unknown system '{}'", name);
            };
            Game::open_as(&rom, system)?
        }
        None => Game::open(&rom)?,
    };

    if let Some(core) = args.core {
        config
            .cores
            .preferred
            .insert(game.system.short_name().to_string(), core);
    }

    tracing::info!("Starting yearn");
    let mut manager = SessionManager::from_config(config);
    manager
        .start(&game)
        .with_context(|| format!("failed to start {}", game.title))?;

    if let Some(slot) = args.load_slot {
        manager.load_state(slot)?;
    }

    if args.realtime {
        if let Some(speed) = args.speed {
            manager.set_speed(speed)?;
        }
        while manager.frame_count() < args.frames && !manager.shutdown_requested() {
            manager.tick(Instant::now())?;
            std::thread::sleep(Duration::from_millis(1));
        }
    } else {
        for _ in 0..args.frames {
            if manager.shutdown_requested() {
                break;
            }
            manager.run_frame()?;
        }
    }
    tracing::info!("Ran {} frames", manager.frame_count());

    if let Some(slot) = args.slot {
        let blob = manager.save_state(slot)?;
        println!("Saved {} bytes to slot {}", blob.len(), slot);
    }

    manager.stop()?;
    Ok(())
}
