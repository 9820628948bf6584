use std::{f64::consts::TAU, path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use moodsync_core::{
    AppConfig, AudioEngine, Genre, ManualClock, PhaseDriver, PointerField, SyncHandle,
    SyncSnapshot, SyncState, DEFAULT_BPM,
};
use tracing_subscriber::EnvFilter;

mod signal;

use signal::{MagnitudeSpectrum, PulseSignal};

const RING_POINTS: usize = 24;
const RING_LAYERS: i32 = 3;
const CLICK_INTERVAL_SECONDS: u32 = 3;

fn main() -> moodsync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            genre,
            seconds,
            seed,
            report_every,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(genre) = genre {
                config.analysis.genre = genre;
            }
            if seed.is_some() {
                config.analysis.seed = seed;
            }
            run_simulate(&config, seconds, report_every.max(1))
        }
        Commands::Genres => {
            print_genres();
            Ok(())
        }
        Commands::Config { config } => {
            let config = load_config(config.as_ref())?;
            println!("{}", config.to_json_pretty()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> moodsync_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::from_path(path)
        }
        None => Ok(AppConfig::default()),
    }
}

/// Runs a deterministic session: a synthetic track drives the beat detector,
/// an orbiting pointer drives interaction, and a simulated display loop ticks
/// the sync state and samples pattern rings the way a renderer would.
fn run_simulate(config: &AppConfig, seconds: f64, report_every: u64) -> moodsync_core::Result<()> {
    let clock = ManualClock::new();
    let engine = AudioEngine::new(&config.analysis);
    let beats = engine.subscribe()?;
    let sync = SyncHandle::new(SyncState::with_clock(
        config.sync.clone(),
        Arc::new(clock.clone()),
    )?);

    let bpm = engine.configured_bpm()?;
    tracing::info!(genre = %config.analysis.genre, bpm, seconds, "starting simulation");

    let audio = &config.audio;
    let animation = &config.animation;
    let mut track = PulseSignal::new(audio.sample_rate, bpm);
    let mut spectrum = MagnitudeSpectrum::new(audio.block_size);
    let pointer = PointerField::from_config(animation);
    let mut driver = PhaseDriver::new(animation.phase_step);

    let frame_seconds = 1.0 / f64::from(animation.frame_rate);
    let block_seconds = audio.block_size as f64 / f64::from(audio.sample_rate);
    let total_frames = (seconds.max(0.0) * f64::from(animation.frame_rate)).round() as u64;
    let click_every = u64::from(animation.frame_rate * CLICK_INTERVAL_SECONDS);

    let mut audio_time = 0.0;
    let mut applied = 0;
    for frame in 0..total_frames {
        let now = frame as f64 * frame_seconds;
        while audio_time <= now {
            let magnitudes = spectrum.process(&track.next_block(audio.block_size))?;
            engine.push_magnitudes(magnitudes)?;
            audio_time += block_seconds;
        }

        clock.advance(Duration::from_secs_f64(frame_seconds));
        applied += sync.apply_pending(&beats)?;

        let (x, y) = orbit(&pointer, now);
        if frame % click_every == click_every - 1 {
            sync.add_interaction_ripple(pointer.ripple_strength(x, y))?;
        }

        let tempo = sync.snapshot()?.tempo;
        sync.update(driver.advance(tempo), pointer.mouse_influence(x, y))?;

        if frame % report_every == 0 {
            let snapshot = sync.snapshot()?;
            let report = serde_json::json!({
                "frame": frame,
                "time": now,
                "pattern_energy": pattern_energy(&snapshot),
                "state": snapshot,
            });
            println!("{report}");
        }
    }

    engine.stop()?;
    let detected = engine.with_analysis(|analyzer| analyzer.beats_detected())?;
    tracing::info!(frames = total_frames, detected, applied, "simulation finished");
    Ok(())
}

/// Pointer circling the center at half the influence radius.
fn orbit(pointer: &PointerField, time: f64) -> (f64, f64) {
    let angle = time * 0.5;
    let reach = pointer.influence_radius * 0.5;
    (
        pointer.center_x + reach * angle.cos(),
        pointer.center_y + reach * angle.sin(),
    )
}

/// Mean absolute pattern value over a few concentric rings.
fn pattern_energy(snapshot: &SyncSnapshot) -> f64 {
    let mut total = 0.0;
    for layer in 0..RING_LAYERS {
        let radius = snapshot.radius_multiplier(60.0 + 40.0 * f64::from(layer), layer);
        for point in 0..RING_POINTS {
            let angle = TAU * point as f64 / RING_POINTS as f64 + snapshot.visual_phase;
            total += snapshot.pattern_value(angle, radius, layer).abs();
        }
    }
    total / (RING_POINTS as f64 * f64::from(RING_LAYERS))
}

fn print_genres() {
    for genre in Genre::KNOWN {
        if let Some(range) = genre.bpm_range() {
            println!("{genre:<10} {:>5.0}-{:<5.0} bpm", range.start, range.end);
        }
    }
    println!("{:<10} {:>5.0} bpm (fixed)", Genre::Other, DEFAULT_BPM);
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Beat-synchronised visual parameter engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a deterministic session against a synthetic track and print
    /// parameter snapshots as JSON lines.
    Simulate {
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Genre label used to seed the tempo.
        #[arg(short, long)]
        genre: Option<String>,
        /// Length of the simulated session.
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f64,
        /// Seed for the tempo draw.
        #[arg(long)]
        seed: Option<u64>,
        /// Print a snapshot every N display frames.
        #[arg(short, long, default_value_t = 30)]
        report_every: u64,
    },
    /// List the genre tempo ranges.
    Genres,
    /// Print the effective configuration.
    Config {
        /// Optional JSON configuration file to validate and expand.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
