use std::fmt;

use serde::{Deserialize, Serialize};

use crate::genre::{BpmSource, Genre, GenreTempoProfile, RandomBpm, DEFAULT_BPM};

/// Number of instant-energy values kept for the moving average.
pub const ENERGY_HISTORY_SIZE: usize = 43;

const THRESHOLD_SLOPE: f64 = -0.002_571_4;
const THRESHOLD_INTERCEPT: f64 = 1.514_285_7;
const INTENSITY_FLOOR: f64 = 0.6;

/// Beat emitted by the analyzer. `bpm` is the configured tempo, not a
/// measurement of beat cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    pub bpm: f64,
    pub intensity: f64,
}

/// Sensitivity multiplier applied to the moving average. Dynamic passages
/// (high variance) lower it, steady passages raise it.
pub fn adaptive_threshold(variance: f64) -> f64 {
    THRESHOLD_SLOPE * variance + THRESHOLD_INTERCEPT
}

/// Fixed-size circular buffer of instant energies.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyHistory {
    slots: [f64; ENERGY_HISTORY_SIZE],
    index: usize,
}

impl EnergyHistory {
    /// Creates a history where every slot holds `energy`.
    pub fn filled(energy: f64) -> Self {
        Self {
            slots: [energy; ENERGY_HISTORY_SIZE],
            index: 0,
        }
    }

    /// Raw slots in storage order.
    pub fn as_slice(&self) -> &[f64] {
        &self.slots
    }

    /// Slot that the next energy will overwrite.
    pub fn write_index(&self) -> usize {
        self.index
    }

    /// Iterates from the oldest entry to the most recent one.
    pub fn chronological(&self) -> impl Iterator<Item = f64> + '_ {
        self.slots[self.index..]
            .iter()
            .chain(self.slots[..self.index].iter())
            .copied()
    }

    pub fn mean(&self) -> f64 {
        self.slots.iter().sum::<f64>() / ENERGY_HISTORY_SIZE as f64
    }

    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.slots
            .iter()
            .map(|energy| (energy - mean) * (energy - mean))
            .sum::<f64>()
            / ENERGY_HISTORY_SIZE as f64
    }

    pub fn push(&mut self, energy: f64) {
        self.slots[self.index] = energy;
        self.index = (self.index + 1) % ENERGY_HISTORY_SIZE;
    }
}

/// Energy-based adaptive beat detector.
///
/// Each call to [`analyze`](Self::analyze) compares the frame's energy against
/// the history of previous frames, then records the frame. A frame never
/// contributes to its own threshold.
pub struct SpectralEnergyAnalyzer {
    history: Option<EnergyHistory>,
    genre: Genre,
    configured_bpm: f64,
    bpm_source: Box<dyn BpmSource>,
    frames_analyzed: u64,
    beats_detected: u64,
}

impl SpectralEnergyAnalyzer {
    /// Creates an analyzer that draws tempos from OS entropy.
    pub fn new() -> Self {
        Self::with_bpm_source(Box::new(RandomBpm::from_entropy()))
    }

    /// Creates an analyzer with an injected tempo source.
    pub fn with_bpm_source(bpm_source: Box<dyn BpmSource>) -> Self {
        Self {
            history: None,
            genre: Genre::Other,
            configured_bpm: DEFAULT_BPM,
            bpm_source,
            frames_analyzed: 0,
            beats_detected: 0,
        }
    }

    /// Selects a genre and draws the tempo reported with every following beat.
    pub fn set_genre(&mut self, label: &str) -> f64 {
        self.genre = Genre::from_label(label);
        self.configured_bpm = GenreTempoProfile::draw(self.genre, self.bpm_source.as_mut());
        tracing::debug!(
            label,
            genre = %self.genre,
            bpm = self.configured_bpm,
            "configured tempo"
        );
        self.configured_bpm
    }

    pub fn genre(&self) -> Genre {
        self.genre
    }

    pub fn configured_bpm(&self) -> f64 {
        self.configured_bpm
    }

    /// Energy history, `None` until the first non-empty frame.
    pub fn history(&self) -> Option<&EnergyHistory> {
        self.history.as_ref()
    }

    pub fn frames_analyzed(&self) -> u64 {
        self.frames_analyzed
    }

    pub fn beats_detected(&self) -> u64 {
        self.beats_detected
    }

    /// Forgets the energy history. The configured tempo is kept.
    pub fn reset(&mut self) {
        self.history = None;
        self.frames_analyzed = 0;
        self.beats_detected = 0;
    }

    /// Analyses one magnitude frame and returns a beat if it fires.
    ///
    /// Empty frames and frames whose energy is not finite are ignored. A
    /// silent history (zero moving average) skips the decision but still
    /// records the frame.
    pub fn analyze(&mut self, magnitudes: &[f32]) -> Option<BeatEvent> {
        if magnitudes.is_empty() {
            return None;
        }

        let instant_energy = instant_energy(magnitudes);
        if !instant_energy.is_finite() {
            tracing::trace!(energy = instant_energy, "ignoring non-finite frame");
            return None;
        }
        let history = self
            .history
            .get_or_insert_with(|| EnergyHistory::filled(instant_energy));

        let average = history.mean();
        let threshold = adaptive_threshold(history.variance());

        let beat = if average > 0.0 && instant_energy > threshold * average {
            let ratio = instant_energy / average;
            let intensity = (INTENSITY_FLOOR + (ratio - threshold) / (2.0 * threshold)).min(1.0);
            Some(BeatEvent {
                bpm: self.configured_bpm,
                intensity,
            })
        } else {
            None
        };

        history.push(instant_energy);
        self.frames_analyzed += 1;

        if let Some(event) = beat {
            self.beats_detected += 1;
            tracing::trace!(
                energy = instant_energy,
                average,
                threshold,
                intensity = event.intensity,
                "beat detected"
            );
        }

        beat
    }
}

impl Default for SpectralEnergyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpectralEnergyAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralEnergyAnalyzer")
            .field("genre", &self.genre)
            .field("configured_bpm", &self.configured_bpm)
            .field("warmed_up", &self.history.is_some())
            .field("frames_analyzed", &self.frames_analyzed)
            .field("beats_detected", &self.beats_detected)
            .finish()
    }
}

/// Sum of squared magnitudes.
pub fn instant_energy(magnitudes: &[f32]) -> f64 {
    magnitudes
        .iter()
        .map(|&magnitude| {
            let magnitude = f64::from(magnitude);
            magnitude * magnitude
        })
        .sum()
}
