use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{MoodSyncError, Result};

/// Top-level configuration structure for a visualisation session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub sync: SyncConfig,
    pub animation: AnimationConfig,
    pub audio: AudioConfig,
}

impl AppConfig {
    /// Parses a JSON document. Missing sections and fields fall back to their
    /// defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.sync.validate()?;
        self.animation.validate()?;
        self.audio.validate()
    }
}

/// Settings for the spectral energy analyzer and its beat bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Genre label used to seed the reported tempo.
    pub genre: String,
    /// Seed for the tempo draw. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Capacity of each subscriber's beat channel.
    pub beat_channel_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            genre: "pop".to_string(),
            seed: None,
            beat_channel_capacity: 64,
        }
    }
}

impl AnalysisConfig {
    fn validate(&self) -> Result<()> {
        if self.beat_channel_capacity == 0 {
            return Err(MoodSyncError::config(
                "analysis.beat_channel_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Tunables for [`crate::SyncState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of recent beat intensities kept for the deviation term.
    pub intensity_window: usize,
    /// Idle time after the last interaction before the ripple starts decaying.
    pub ripple_idle_ms: u64,
    /// Per-tick multiplier applied to an idle ripple.
    pub ripple_decay: f64,
    /// Optional ceiling for the accumulated rotation speed.
    pub max_rotation_speed: Option<f64>,
    /// Optional ceiling for the accumulated scale multiplier.
    pub max_scale_multiplier: Option<f64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            intensity_window: 20,
            ripple_idle_ms: 2_000,
            ripple_decay: 0.95,
            max_rotation_speed: None,
            max_scale_multiplier: None,
        }
    }
}

impl SyncConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.intensity_window == 0 {
            return Err(MoodSyncError::config("sync.intensity_window must be at least 1"));
        }
        if !(self.ripple_decay > 0.0 && self.ripple_decay <= 1.0) {
            return Err(MoodSyncError::config(format!(
                "sync.ripple_decay must be in (0, 1], got {}",
                self.ripple_decay
            )));
        }
        if let Some(ceiling) = self.max_rotation_speed {
            if ceiling < crate::sync::MIN_ROTATION_SPEED {
                return Err(MoodSyncError::config(format!(
                    "sync.max_rotation_speed {ceiling} is below the floor {}",
                    crate::sync::MIN_ROTATION_SPEED
                )));
            }
        }
        if let Some(ceiling) = self.max_scale_multiplier {
            if ceiling < crate::sync::MIN_SCALE_MULTIPLIER {
                return Err(MoodSyncError::config(format!(
                    "sync.max_scale_multiplier {ceiling} is below the floor {}",
                    crate::sync::MIN_SCALE_MULTIPLIER
                )));
            }
        }
        Ok(())
    }
}

/// Display-tick settings for the frame driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub frame_rate: u32,
    /// Phase advance per tick at a neutral tempo factor of 1.
    pub phase_step: f64,
    pub width: f64,
    pub height: f64,
    /// Pointer distance that maps to a mouse influence of 1.
    pub influence_radius: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            phase_step: 0.015,
            width: 800.0,
            height: 600.0,
            influence_radius: 200.0,
        }
    }
}

impl AnimationConfig {
    fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 {
            return Err(MoodSyncError::config("animation.frame_rate must be at least 1"));
        }
        if self.width <= 0.0 || self.height <= 0.0 || self.influence_radius <= 0.0 {
            return Err(MoodSyncError::config(
                "animation dimensions and influence_radius must be positive",
            ));
        }
        Ok(())
    }
}

/// Configuration of the audio block producer that feeds magnitude frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 1024,
        }
    }
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.block_size < 2 {
            return Err(MoodSyncError::config(
                "audio.sample_rate must be positive and audio.block_size at least 2",
            ));
        }
        Ok(())
    }
}
