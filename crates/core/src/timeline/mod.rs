use std::{
    f64::consts::TAU,
    fmt,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// Monotonic time source measured from the start of a session.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall clock anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock. Clones share the same time, so a driver can
/// advance it while the sync state reads it.
#[derive(Clone, Default)]
pub struct ManualClock {
    time: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, delta: Duration) {
        let mut time = self.time.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *time += delta;
    }

    pub fn advance_ms(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    pub fn reset(&self) {
        let mut time = self.time.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *time = Duration::ZERO;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.time.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock").field("now", &self.now()).finish()
    }
}

/// Advances the visual phase once per display tick. Faster tempos advance
/// faster; the phase loops every full turn.
#[derive(Debug, Clone)]
pub struct PhaseDriver {
    phase: f64,
    step: f64,
}

impl PhaseDriver {
    pub fn new(step: f64) -> Self {
        Self { phase: 0.0, step }
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Moves the phase forward by one tick at `tempo` and returns it.
    pub fn advance(&mut self, tempo: f64) -> f64 {
        self.phase = (self.phase + self.step * tempo_factor(tempo)).rem_euclid(TAU);
        self.phase
    }
}

impl Default for PhaseDriver {
    fn default() -> Self {
        Self::new(0.015)
    }
}

/// Smooth tempo scaling in `(0.2, 1.0)`, 0.6 at 90 BPM.
pub fn tempo_factor(tempo: f64) -> f64 {
    0.6 + 0.4 * ((tempo - 90.0) / 60.0).tanh()
}
