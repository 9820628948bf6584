use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::{
    analysis::{BeatEvent, SpectralEnergyAnalyzer},
    config::AnalysisConfig,
    genre::RandomBpm,
    MoodSyncError, Result,
};

/// Session-owned façade over the beat detector.
///
/// Magnitude frames come in through [`push_magnitudes`](Self::push_magnitudes);
/// detected beats go out to every subscriber over bounded channels. Sending
/// never blocks: a subscriber that falls behind misses beats.
#[derive(Debug, Clone)]
pub struct AudioEngine {
    analysis: Arc<Mutex<SpectralEnergyAnalyzer>>,
    subscribers: Arc<Mutex<Vec<Sender<BeatEvent>>>>,
    running: Arc<AtomicBool>,
    channel_capacity: usize,
}

impl AudioEngine {
    /// Creates an engine from configuration and applies the configured genre.
    pub fn new(config: &AnalysisConfig) -> Self {
        let bpm_source = match config.seed {
            Some(seed) => RandomBpm::seeded(seed),
            None => RandomBpm::from_entropy(),
        };
        let mut analyzer = SpectralEnergyAnalyzer::with_bpm_source(Box::new(bpm_source));
        analyzer.set_genre(&config.genre);
        Self::with_analyzer(analyzer, config.beat_channel_capacity)
    }

    /// Wraps an existing analyzer.
    pub fn with_analyzer(analyzer: SpectralEnergyAnalyzer, channel_capacity: usize) -> Self {
        Self {
            analysis: Arc::new(Mutex::new(analyzer)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(true)),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Registers a new beat consumer.
    pub fn subscribe(&self) -> Result<Receiver<BeatEvent>> {
        let (tx, rx) = bounded(self.channel_capacity);
        self.lock_subscribers()?.push(tx);
        Ok(rx)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> Result<usize> {
        Ok(self.lock_subscribers()?.len())
    }

    /// Analyses one frame and broadcasts the beat, if any. Frames pushed
    /// while the engine is stopped are ignored.
    pub fn push_magnitudes(&self, magnitudes: &[f32]) -> Result<Option<BeatEvent>> {
        if !self.is_running() {
            return Ok(None);
        }

        let beat = self.lock_analysis()?.analyze(magnitudes);
        if let Some(event) = beat {
            self.broadcast(event)?;
        }
        Ok(beat)
    }

    /// Changes the genre and returns the newly drawn tempo.
    pub fn set_genre(&self, label: &str) -> Result<f64> {
        Ok(self.lock_analysis()?.set_genre(label))
    }

    pub fn configured_bpm(&self) -> Result<f64> {
        Ok(self.lock_analysis()?.configured_bpm())
    }

    /// Runs `f` with read access to the analyzer.
    pub fn with_analysis<T>(&self, f: impl FnOnce(&SpectralEnergyAnalyzer) -> T) -> Result<T> {
        let analyzer = self.lock_analysis()?;
        Ok(f(&analyzer))
    }

    /// Resumes analysis with a fresh energy history.
    pub fn start(&self) -> Result<()> {
        self.lock_analysis()?.reset();
        self.running.store(true, Ordering::SeqCst);
        tracing::debug!("beat detection started");
        Ok(())
    }

    /// Stops analysis and closes every subscriber's stream.
    pub fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        let closed = {
            let mut subscribers = self.lock_subscribers()?;
            let closed = subscribers.len();
            subscribers.clear();
            closed
        };
        tracing::debug!(closed, "beat detection stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn broadcast(&self, event: BeatEvent) -> Result<()> {
        let mut subscribers = self.lock_subscribers()?;
        subscribers.retain(|tx| match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("beat subscriber is full, dropping event");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        Ok(())
    }

    fn lock_analysis(&self) -> Result<MutexGuard<'_, SpectralEnergyAnalyzer>> {
        self.analysis
            .lock()
            .map_err(|_| MoodSyncError::Poisoned("beat analyzer"))
    }

    fn lock_subscribers(&self) -> Result<MutexGuard<'_, Vec<Sender<BeatEvent>>>> {
        self.subscribers
            .lock()
            .map_err(|_| MoodSyncError::Poisoned("beat subscribers"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::ENERGY_HISTORY_SIZE, genre::FixedBpm};

    fn build_engine(capacity: usize) -> AudioEngine {
        let analyzer = SpectralEnergyAnalyzer::with_bpm_source(Box::new(FixedBpm(0.0)));
        AudioEngine::with_analyzer(analyzer, capacity)
    }

    fn warm_up(engine: &AudioEngine) {
        for _ in 0..ENERGY_HISTORY_SIZE {
            engine.push_magnitudes(&[1.0]).unwrap();
        }
    }

    #[test]
    fn broadcasts_beats_to_every_subscriber() {
        let engine = build_engine(8);
        engine.set_genre("rock").unwrap();
        let first = engine.subscribe().unwrap();
        let second = engine.subscribe().unwrap();

        warm_up(&engine);
        let beat = engine.push_magnitudes(&[3.0]).unwrap().expect("spike fires");

        assert_eq!(first.try_recv().unwrap(), beat);
        assert_eq!(second.try_recv().unwrap(), beat);
        assert_eq!(beat.bpm, 110.0);
    }

    #[test]
    fn full_subscribers_drop_events_without_blocking() {
        let engine = build_engine(1);
        let rx = engine.subscribe().unwrap();
        warm_up(&engine);

        engine.push_magnitudes(&[3.0]).unwrap();
        engine.push_magnitudes(&[9.0]).unwrap();

        assert_eq!(rx.len(), 1);
        assert_eq!(engine.subscriber_count().unwrap(), 1);
    }

    #[test]
    fn prunes_disconnected_subscribers() {
        let engine = build_engine(4);
        let kept = engine.subscribe().unwrap();
        drop(engine.subscribe().unwrap());
        warm_up(&engine);

        engine.push_magnitudes(&[3.0]).unwrap();
        assert_eq!(engine.subscriber_count().unwrap(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn stop_closes_streams_and_ignores_frames() {
        let engine = build_engine(4);
        let rx = engine.subscribe().unwrap();
        engine.stop().unwrap();

        assert!(!engine.is_running());
        assert_eq!(engine.push_magnitudes(&[5.0]).unwrap(), None);
        assert!(rx.recv().is_err());
        assert_eq!(engine.with_analysis(|a| a.frames_analyzed()).unwrap(), 0);

        engine.start().unwrap();
        engine.push_magnitudes(&[5.0]).unwrap();
        assert_eq!(engine.with_analysis(|a| a.frames_analyzed()).unwrap(), 1);
    }

    #[test]
    fn config_seed_makes_tempo_reproducible() {
        let config = AnalysisConfig {
            genre: "edm".to_string(),
            seed: Some(42),
            ..AnalysisConfig::default()
        };
        let first = AudioEngine::new(&config).configured_bpm().unwrap();
        let second = AudioEngine::new(&config).configured_bpm().unwrap();
        assert_eq!(first, second);
        assert!((120.0..150.0).contains(&first));
    }
}
