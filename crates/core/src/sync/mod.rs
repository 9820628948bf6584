//! Visual synchronisation state fused from beats, display ticks and pointer
//! interaction.
//!
//! [`SyncState`] owns the numbers. [`SyncHandle`] shares one state between
//! the beat consumer, the frame driver and the interaction source behind a
//! single lock. Renderers should take a [`SyncSnapshot`] once per frame and
//! evaluate pattern queries on it without holding the lock.

use std::{
    collections::VecDeque,
    f64::consts::PI,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::BeatEvent,
    config::SyncConfig,
    timeline::{Clock, SystemClock},
    MoodSyncError, Result,
};

pub const MIN_ROTATION_SPEED: f64 = 0.1;
pub const MIN_SCALE_MULTIPLIER: f64 = 0.5;

/// Renderer-facing copy of the synchronised parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub tempo: f64,
    pub beat_intensity: f64,
    pub beat_influence: f64,
    pub rotation_speed: f64,
    pub scale_multiplier: f64,
    pub color_shift: f64,
    pub complexity: f64,
    pub visual_phase: f64,
    pub interaction_ripple: f64,
}

impl SyncSnapshot {
    /// Pattern value at a polar coordinate, roughly in `[-1, 1]`.
    pub fn pattern_value(&self, angle: f64, radius: f64, layer: i32) -> f64 {
        let base =
            (angle * (3.0 + f64::from(layer)) + self.visual_phase * self.rotation_speed).sin();
        let beat = (radius * 0.1 + self.visual_phase * 2.0 + self.beat_influence * PI).cos();
        let detail = (angle * self.complexity * 5.0 + radius * 0.05).sin() * 0.5;

        (base + beat * self.beat_intensity + detail) / 2.5
    }

    /// Pulsing radius for a layer, scaled by the beat and any ripple.
    pub fn radius_multiplier(&self, base_radius: f64, layer: i32) -> f64 {
        let beat_pulse =
            1.0 + (self.visual_phase * 4.0 + f64::from(layer)).sin() * self.beat_influence * 0.3;
        let ripple_pulse = 1.0 + self.interaction_ripple * 0.2;

        base_radius * self.scale_multiplier * beat_pulse * ripple_pulse
    }
}

/// Mutable synchronisation state for one visualisation session.
pub struct SyncState {
    config: SyncConfig,
    clock: Arc<dyn Clock>,

    tempo: f64,
    beat_intensity: f64,
    beat_influence: f64,
    recent_intensities: VecDeque<f64>,
    last_beat_at: Option<Duration>,

    visual_phase: f64,
    rotation_speed: f64,
    scale_multiplier: f64,
    color_shift: f64,
    complexity: f64,

    interaction_ripple: f64,
    last_interaction_at: Option<Duration>,
}

impl SyncState {
    /// Creates a state driven by the wall clock.
    pub fn new(config: SyncConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::start()))
    }

    /// Creates a state reading time from `clock`. Rejects configurations
    /// that would break the parameter bounds, such as an empty intensity
    /// window or a ripple decay above 1.
    pub fn with_clock(config: SyncConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: SyncConfig, clock: Arc<dyn Clock>) -> Self {
        let window = config.intensity_window;
        Self {
            config,
            clock,
            tempo: 120.0,
            beat_intensity: 0.5,
            beat_influence: 0.0,
            recent_intensities: VecDeque::with_capacity(window + 1),
            last_beat_at: None,
            visual_phase: 0.0,
            rotation_speed: 1.0,
            scale_multiplier: 1.0,
            color_shift: 0.0,
            complexity: 0.5,
            interaction_ripple: 0.0,
            last_interaction_at: None,
        }
    }

    /// Folds a detected beat into the state.
    ///
    /// The decay term uses the time since the previous beat; the first beat
    /// of a session is undecayed.
    pub fn update_beat(&mut self, tempo: f64, intensity: f64) {
        let now = self.clock.now();
        let elapsed = self
            .last_beat_at
            .map(|previous| now.saturating_sub(previous))
            .unwrap_or(Duration::ZERO);
        self.last_beat_at = Some(now);

        self.tempo = tempo;
        self.beat_intensity = intensity;
        self.recent_intensities.push_back(intensity);
        while self.recent_intensities.len() > self.config.intensity_window {
            self.recent_intensities.pop_front();
        }

        let average =
            self.recent_intensities.iter().sum::<f64>() / self.recent_intensities.len() as f64;
        let deviation = (intensity - average).abs();
        let decay = (-elapsed.as_secs_f64()).exp();
        self.beat_influence = ((intensity + deviation) * decay).clamp(0.0, 1.0);

        self.rotation_speed = self.bound_rotation(0.5 + (tempo / 120.0) * 0.5);
        self.scale_multiplier = self.bound_scale(0.8 + intensity * 0.4);
        self.color_shift = (self.color_shift + self.beat_influence * 0.1).rem_euclid(1.0);
        self.complexity = (tempo / 160.0 + intensity * 0.5).clamp(0.0, 1.0);

        tracing::trace!(
            tempo,
            intensity,
            influence = self.beat_influence,
            elapsed_ms = elapsed.as_millis() as u64,
            "beat applied"
        );
    }

    /// Advances the state by one display tick.
    ///
    /// Rotation speed and scale accumulate momentum from the combined
    /// influence; only their floors (and configured ceilings) bound them.
    pub fn update(&mut self, phase: f64, mouse_influence: f64) {
        self.visual_phase = phase;

        let now = self.clock.now();
        let idle_after = Duration::from_millis(self.config.ripple_idle_ms);
        let idle = self
            .last_interaction_at
            .map(|last| now.saturating_sub(last) > idle_after)
            .unwrap_or(true);
        if idle {
            self.interaction_ripple *= self.config.ripple_decay;
        }

        let combined =
            self.beat_influence + mouse_influence * 0.3 + self.interaction_ripple * 0.2;

        self.rotation_speed = self.bound_rotation(self.rotation_speed + combined * 0.5);
        self.scale_multiplier = self.bound_scale(self.scale_multiplier + combined * 0.3);
    }

    /// Adds a pointer ripple. `strength` is typically the click's distance
    /// from the center.
    pub fn add_interaction_ripple(&mut self, strength: f64) {
        self.interaction_ripple = (self.interaction_ripple + strength * 0.01).clamp(0.0, 1.0);
        self.last_interaction_at = Some(self.clock.now());
    }

    pub fn pattern_value(&self, angle: f64, radius: f64, layer: i32) -> f64 {
        self.snapshot().pattern_value(angle, radius, layer)
    }

    pub fn radius_multiplier(&self, base_radius: f64, layer: i32) -> f64 {
        self.snapshot().radius_multiplier(base_radius, layer)
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            tempo: self.tempo,
            beat_intensity: self.beat_intensity,
            beat_influence: self.beat_influence,
            rotation_speed: self.rotation_speed,
            scale_multiplier: self.scale_multiplier,
            color_shift: self.color_shift,
            complexity: self.complexity,
            visual_phase: self.visual_phase,
            interaction_ripple: self.interaction_ripple,
        }
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn beat_intensity(&self) -> f64 {
        self.beat_intensity
    }

    pub fn beat_influence(&self) -> f64 {
        self.beat_influence
    }

    pub fn rotation_speed(&self) -> f64 {
        self.rotation_speed
    }

    pub fn scale_multiplier(&self) -> f64 {
        self.scale_multiplier
    }

    pub fn color_shift(&self) -> f64 {
        self.color_shift
    }

    pub fn complexity(&self) -> f64 {
        self.complexity
    }

    pub fn visual_phase(&self) -> f64 {
        self.visual_phase
    }

    pub fn interaction_ripple(&self) -> f64 {
        self.interaction_ripple
    }

    /// Most recent beat intensities, oldest first.
    pub fn recent_intensities(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.recent_intensities.iter().copied()
    }

    fn bound_rotation(&self, value: f64) -> f64 {
        let value = value.max(MIN_ROTATION_SPEED);
        match self.config.max_rotation_speed {
            Some(ceiling) => value.min(ceiling),
            None => value,
        }
    }

    fn bound_scale(&self, value: f64) -> f64 {
        let value = value.max(MIN_SCALE_MULTIPLIER);
        match self.config.max_scale_multiplier {
            Some(ceiling) => value.min(ceiling),
            None => value,
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::build(SyncConfig::default(), Arc::new(SystemClock::start()))
    }
}

impl fmt::Debug for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncState")
            .field("snapshot", &self.snapshot())
            .field("recent_intensities", &self.recent_intensities.len())
            .field("last_beat_at", &self.last_beat_at)
            .field("last_interaction_at", &self.last_interaction_at)
            .finish()
    }
}

/// Shared, thread-safe handle to one [`SyncState`].
#[derive(Clone)]
pub struct SyncHandle {
    shared: Arc<Mutex<SyncState>>,
}

impl SyncHandle {
    pub fn new(state: SyncState) -> Self {
        Self {
            shared: Arc::new(Mutex::new(state)),
        }
    }

    pub fn update_beat(&self, tempo: f64, intensity: f64) -> Result<()> {
        self.lock()?.update_beat(tempo, intensity);
        Ok(())
    }

    pub fn apply_beat(&self, event: BeatEvent) -> Result<()> {
        self.update_beat(event.bpm, event.intensity)
    }

    pub fn update(&self, phase: f64, mouse_influence: f64) -> Result<()> {
        self.lock()?.update(phase, mouse_influence);
        Ok(())
    }

    pub fn add_interaction_ripple(&self, strength: f64) -> Result<()> {
        self.lock()?.add_interaction_ripple(strength);
        Ok(())
    }

    pub fn snapshot(&self) -> Result<SyncSnapshot> {
        Ok(self.lock()?.snapshot())
    }

    /// Applies every beat already queued on `beats` without blocking and
    /// returns how many were applied.
    pub fn apply_pending(&self, beats: &Receiver<BeatEvent>) -> Result<usize> {
        let mut state = self.lock()?;
        let mut applied = 0;
        for event in beats.try_iter() {
            state.update_beat(event.bpm, event.intensity);
            applied += 1;
        }
        Ok(applied)
    }

    /// Consumes `beats` on a dedicated thread until every sender is dropped.
    /// The thread yields the number of beats it applied.
    pub fn spawn_beat_listener(&self, beats: Receiver<BeatEvent>) -> JoinHandle<Result<usize>> {
        let handle = self.clone();
        thread::spawn(move || {
            let mut applied = 0;
            for event in beats.iter() {
                handle.apply_beat(event)?;
                applied += 1;
            }
            tracing::debug!(applied, "beat stream closed");
            Ok(applied)
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, SyncState>> {
        self.shared
            .lock()
            .map_err(|_| MoodSyncError::Poisoned("sync state"))
    }
}

impl fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHandle").finish()
    }
}
