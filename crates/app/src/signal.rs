//! Stand-in for the decoder: a synthetic pulsing tone and the FFT that turns
//! each block into the magnitude frames the beat detector consumes.

use std::{
    f32::consts::{PI, TAU},
    fmt,
    sync::Arc,
};

use moodsync_core::{MoodSyncError, Result};
use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

const CARRIER_HZ: f32 = 110.0;
const OVERTONE_HZ: f32 = 440.0;
const PULSE_DECAY: f32 = 14.0;
const FLOOR: f32 = 0.08;

/// Tone whose loudness pulses once per beat at a fixed tempo.
#[derive(Debug, Clone)]
pub struct PulseSignal {
    sample_rate: f32,
    beat_period: f32,
    sample_index: u64,
}

impl PulseSignal {
    pub fn new(sample_rate: u32, bpm: f64) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            beat_period: (60.0 / bpm.max(1.0)) as f32,
            sample_index: 0,
        }
    }

    pub fn next_block(&mut self, len: usize) -> Vec<f32> {
        (0..len)
            .map(|_| {
                let t = self.sample_index as f32 / self.sample_rate;
                self.sample_index += 1;
                let since_beat = t % self.beat_period;
                let envelope = FLOOR + (1.0 - FLOOR) * (-since_beat * PULSE_DECAY).exp();
                let tone = (TAU * CARRIER_HZ * t).sin() + 0.3 * (TAU * OVERTONE_HZ * t).sin();
                envelope * tone
            })
            .collect()
    }
}

/// Reusable real FFT producing normalised magnitude frames.
pub struct MagnitudeSpectrum {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    magnitudes: Vec<f32>,
}

impl MagnitudeSpectrum {
    pub fn new(size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        let magnitudes = vec![0.0; spectrum.len()];
        Self {
            size,
            plan,
            input,
            spectrum,
            scratch,
            magnitudes,
        }
    }

    /// Windows `samples` (zero padded or truncated to the FFT size) and
    /// returns the magnitude of every bin.
    pub fn process(&mut self, samples: &[f32]) -> Result<&[f32]> {
        for (index, slot) in self.input.iter_mut().enumerate() {
            let sample = samples.get(index).copied().unwrap_or(0.0);
            *slot = sample * hann_value(index, self.size);
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|err| MoodSyncError::msg(format!("fft failed: {err}")))?;

        let scale = 2.0 / self.size as f32;
        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *magnitude = bin.norm() * scale;
        }
        Ok(&self.magnitudes)
    }
}

impl fmt::Debug for MagnitudeSpectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MagnitudeSpectrum")
            .field("size", &self.size)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_no_magnitude() {
        let mut spectrum = MagnitudeSpectrum::new(256);
        let magnitudes = spectrum.process(&[0.0; 256]).unwrap();
        assert_eq!(magnitudes.len(), 129);
        assert!(magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn pulses_are_louder_than_the_tail() {
        let mut signal = PulseSignal::new(48_000, 120.0);
        let mut spectrum = MagnitudeSpectrum::new(1024);

        let attack: f32 = spectrum
            .process(&signal.next_block(1024))
            .unwrap()
            .iter()
            .map(|m| m * m)
            .sum();
        for _ in 0..10 {
            signal.next_block(1024);
        }
        let tail: f32 = spectrum
            .process(&signal.next_block(1024))
            .unwrap()
            .iter()
            .map(|m| m * m)
            .sum();

        assert!(attack > tail * 4.0, "attack {attack} tail {tail}");
    }
}
