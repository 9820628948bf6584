//! Core library for the MoodSync visualiser.
//!
//! Turns a live stream of spectrum magnitudes and pointer interaction into a
//! set of smoothed, bounded visual parameters. The [`analysis`] module detects
//! beats, [`audio`] broadcasts them to subscribers, and [`sync`] fuses beats,
//! display ticks and interaction into the state a renderer samples each frame.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod genre;
pub mod interaction;
pub mod sync;
pub mod timeline;

pub use analysis::{BeatEvent, EnergyHistory, SpectralEnergyAnalyzer, ENERGY_HISTORY_SIZE};
pub use audio::AudioEngine;
pub use config::{AnalysisConfig, AnimationConfig, AppConfig, AudioConfig, SyncConfig};
pub use error::{MoodSyncError, Result};
pub use genre::{BpmSource, FixedBpm, Genre, GenreTempoProfile, RandomBpm, DEFAULT_BPM};
pub use interaction::PointerField;
pub use sync::{SyncHandle, SyncSnapshot, SyncState};
pub use timeline::{Clock, ManualClock, PhaseDriver, SystemClock};
