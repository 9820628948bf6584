use serde::{Deserialize, Serialize};

use crate::config::AnimationConfig;

/// Reduces pointer positions to the scalar strengths consumed by
/// [`crate::SyncState`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerField {
    pub center_x: f64,
    pub center_y: f64,
    /// Distance from the center that maps to a mouse influence of 1.
    pub influence_radius: f64,
}

impl PointerField {
    pub fn new(width: f64, height: f64, influence_radius: f64) -> Self {
        Self {
            center_x: width / 2.0,
            center_y: height / 2.0,
            influence_radius,
        }
    }

    pub fn from_config(config: &AnimationConfig) -> Self {
        Self::new(config.width, config.height, config.influence_radius)
    }

    pub fn distance(&self, x: f64, y: f64) -> f64 {
        (x - self.center_x).hypot(y - self.center_y)
    }

    /// Continuous influence of a hovering pointer, passed to every tick.
    pub fn mouse_influence(&self, x: f64, y: f64) -> f64 {
        self.distance(x, y) / self.influence_radius
    }

    /// Strength of a click ripple: clicks further out ripple harder.
    pub fn ripple_strength(&self, x: f64, y: f64) -> f64 {
        self.distance(x, y)
    }
}

impl Default for PointerField {
    fn default() -> Self {
        Self::from_config(&AnimationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_has_no_influence() {
        let field = PointerField::default();
        assert_eq!(field.mouse_influence(400.0, 300.0), 0.0);
        assert_eq!(field.ripple_strength(400.0, 300.0), 0.0);
    }

    #[test]
    fn influence_scales_with_distance() {
        let field = PointerField::default();
        assert!((field.mouse_influence(400.0, 500.0) - 1.0).abs() < 1e-12);
        assert!((field.ripple_strength(430.0, 340.0) - 50.0).abs() < 1e-12);
    }
}
