//! Genre to tempo mapping used to seed the analyzer's reported BPM.
//!
//! The reported tempo is configuration, not a measurement: beats are detected
//! from the signal, while the BPM attached to them is drawn once from the
//! genre's range whenever the genre changes.

use std::{convert::Infallible, fmt, ops::Range, str::FromStr};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Tempo reported for labels that do not name a known genre.
pub const DEFAULT_BPM: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Pop,
    Rock,
    HipHop,
    Edm,
    Jazz,
    Classical,
    Other,
}

impl Genre {
    pub const KNOWN: [Genre; 6] = [
        Genre::Pop,
        Genre::Rock,
        Genre::HipHop,
        Genre::Edm,
        Genre::Jazz,
        Genre::Classical,
    ];

    /// Maps a free-form label onto a genre. Matching ignores case and
    /// surrounding whitespace; unknown labels map to [`Genre::Other`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "pop" => Genre::Pop,
            "rock" => Genre::Rock,
            "hiphop" | "rap" => Genre::HipHop,
            "edm" | "dance" => Genre::Edm,
            "jazz" => Genre::Jazz,
            "classical" => Genre::Classical,
            _ => Genre::Other,
        }
    }

    /// Half-open BPM range for the genre, `None` for the fixed default.
    pub fn bpm_range(self) -> Option<Range<f64>> {
        match self {
            Genre::Pop => Some(100.0..120.0),
            Genre::Rock => Some(110.0..140.0),
            Genre::HipHop => Some(85.0..100.0),
            Genre::Edm => Some(120.0..150.0),
            Genre::Jazz => Some(60.0..80.0),
            Genre::Classical => Some(50.0..70.0),
            Genre::Other => None,
        }
    }
}

impl FromStr for Genre {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Genre::Pop => "pop",
            Genre::Rock => "rock",
            Genre::HipHop => "hiphop",
            Genre::Edm => "edm",
            Genre::Jazz => "jazz",
            Genre::Classical => "classical",
            Genre::Other => "other",
        };
        f.pad(name)
    }
}

/// Source of uniform draws in `[0, 1)` used to pick a tempo inside a range.
pub trait BpmSource: Send {
    fn unit(&mut self) -> f64;
}

/// [`BpmSource`] backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RandomBpm<R = StdRng> {
    rng: R,
}

impl<R: Rng> RandomBpm<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomBpm<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng + Send> BpmSource for RandomBpm<R> {
    fn unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Always returns the same fraction of the range. Handy for pinning draws.
#[derive(Debug, Clone, Copy)]
pub struct FixedBpm(pub f64);

impl BpmSource for FixedBpm {
    fn unit(&mut self) -> f64 {
        self.0.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

/// Static genre to tempo table.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenreTempoProfile;

impl GenreTempoProfile {
    /// Draws a tempo for `genre`. The default genre never consumes a draw.
    pub fn draw(genre: Genre, source: &mut dyn BpmSource) -> f64 {
        match genre.bpm_range() {
            Some(range) => range.start + source.unit() * (range.end - range.start),
            None => DEFAULT_BPM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSource {
        draws: usize,
    }

    impl BpmSource for CountingSource {
        fn unit(&mut self) -> f64 {
            self.draws += 1;
            0.25
        }
    }

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!(Genre::from_label("RAP"), Genre::HipHop);
        assert_eq!(Genre::from_label(" Dance "), Genre::Edm);
        assert_eq!("Classical".parse::<Genre>().unwrap(), Genre::Classical);
        assert_eq!(Genre::from_label("polka"), Genre::Other);
    }

    #[test]
    fn classical_and_edm_stay_in_range() {
        let mut source = RandomBpm::seeded(11);
        for _ in 0..500 {
            let classical = GenreTempoProfile::draw(Genre::Classical, &mut source);
            assert!((50.0..70.0).contains(&classical), "{classical}");
            let edm = GenreTempoProfile::draw(Genre::Edm, &mut source);
            assert!((120.0..150.0).contains(&edm), "{edm}");
        }
    }

    #[test]
    fn injected_source_pins_the_draw() {
        let bpm = GenreTempoProfile::draw(Genre::Jazz, &mut FixedBpm(0.5));
        assert!((bpm - 70.0).abs() < 1e-12);

        let low = GenreTempoProfile::draw(Genre::Rock, &mut FixedBpm(0.0));
        assert_eq!(low, 110.0);
    }

    #[test]
    fn unknown_genre_uses_default_without_drawing() {
        let mut source = CountingSource { draws: 0 };
        assert_eq!(GenreTempoProfile::draw(Genre::Other, &mut source), DEFAULT_BPM);
        assert_eq!(source.draws, 0);

        GenreTempoProfile::draw(Genre::Pop, &mut source);
        assert_eq!(source.draws, 1);
    }

    #[test]
    fn display_round_trips_through_labels() {
        for genre in Genre::KNOWN {
            assert_eq!(Genre::from_label(&genre.to_string()), genre);
        }
    }
}
