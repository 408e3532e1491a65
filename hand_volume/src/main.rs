//! Binary entry point.

use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use hand_volume::app::{run, AppConfig};

/// Control the system volume with a thumb/index pinch.
#[derive(Parser, Debug)]
#[command(name = "hand_volume", version, about)]
struct Cli {
    /// Restore the mixer to its startup level on exit.
    #[arg(short = 'r', long)]
    reset_volume: bool,

    /// Capture device index.
    #[arg(long, default_value_t = 0)]
    device: u32,

    /// Pinch distance (px) mapped to minimum volume.
    #[arg(long, default_value_t = 20.0)]
    min_distance: f32,

    /// Pinch distance (px) mapped to maximum volume.
    #[arg(long, default_value_t = 200.0)]
    max_distance: f32,

    /// Frame width.
    #[arg(long, default_value_t = 640)]
    width: usize,

    /// Frame height.
    #[arg(long, default_value_t = 480)]
    height: usize,

    /// Hand-landmark worker script (used by `mediapipe` builds).
    #[arg(long, default_value = "scripts/hands_worker.py")]
    worker: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║           Hand Volume — Pinch-to-Volume Controller           ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "camera")]
    println!("  Capture:  webcam device");
    #[cfg(not(feature = "camera"))]
    println!("  Capture:  synthetic scene   (use --features camera for a webcam)");

    #[cfg(feature = "mediapipe")]
    println!("  Detector: mediapipe worker");
    #[cfg(not(feature = "mediapipe"))]
    println!("  Detector: simulated hand    (use --features mediapipe for inference)");

    #[cfg(feature = "alsa")]
    println!("  Mixer:    alsa Master");
    #[cfg(not(feature = "alsa"))]
    println!("  Mixer:    simulated         (use --features alsa for the real device)");
    println!();

    let cfg = AppConfig {
        device:       cli.device,
        width:        cli.width,
        height:       cli.height,
        min_distance: cli.min_distance,
        max_distance: cli.max_distance,
        reset_volume: cli.reset_volume,
        worker:       cli.worker,
    };

    if let Err(e) = run(cfg) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
