//! Falloff curves mapping normalized distance to an effect multiplier.

use crate::lerp;
use serde::{Deserialize, Serialize};

/// Piecewise-linear curve over [0,1], evaluated between sorted control points.
///
/// Inputs outside [0,1] are clamped; an evaluation is a pure function of its
/// input, so radial effects built on a curve are reproducible.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FalloffCurve {
    points: Vec<(f32, f32)>,
}

impl FalloffCurve {
    pub fn new(mut points: Vec<(f32, f32)>) -> Self {
        if points.is_empty() {
            points.push((0.0, 1.0));
        }
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Self { points }
    }

    /// Full effect at the source, nothing at the rim.
    pub fn linear() -> Self {
        Self::new(vec![(0.0, 1.0), (1.0, 0.0)])
    }

    /// Same multiplier everywhere inside the radius.
    pub fn constant(value: f32) -> Self {
        Self::new(vec![(0.0, value)])
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        let first = self.points[0];
        if t <= first.0 {
            return first.1;
        }

        for pair in self.points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if t <= x1 {
                if (x1 - x0).abs() < f32::EPSILON {
                    return y1;
                }
                return lerp(y0, y1, (t - x0) / (x1 - x0));
            }
        }

        self.points[self.points.len() - 1].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_linear_endpoints() {
        let curve = FalloffCurve::linear();
        assert_approx_eq!(curve.evaluate(0.0), 1.0, 0.001);
        assert_approx_eq!(curve.evaluate(1.0), 0.0, 0.001);
        assert_approx_eq!(curve.evaluate(0.5), 0.5, 0.001);
    }

    #[test]
    fn test_input_clamped() {
        let curve = FalloffCurve::linear();
        assert_approx_eq!(curve.evaluate(-2.0), 1.0, 0.001);
        assert_approx_eq!(curve.evaluate(3.0), 0.0, 0.001);
    }

    #[test]
    fn test_constant() {
        let curve = FalloffCurve::constant(0.75);
        assert_approx_eq!(curve.evaluate(0.0), 0.75, 0.001);
        assert_approx_eq!(curve.evaluate(0.9), 0.75, 0.001);
    }

    #[test]
    fn test_unsorted_points_are_sorted() {
        let curve = FalloffCurve::new(vec![(1.0, 0.0), (0.0, 1.0), (0.5, 0.8)]);
        assert_approx_eq!(curve.evaluate(0.5), 0.8, 0.001);
        assert_approx_eq!(curve.evaluate(0.25), 0.9, 0.001);
    }

    #[test]
    fn test_plateau_then_drop() {
        // Near-field plateau at full strength, then linear drop to the rim.
        let curve = FalloffCurve::new(vec![(0.0, 1.0), (0.4, 1.0), (1.0, 0.2)]);
        assert_approx_eq!(curve.evaluate(0.2), 1.0, 0.001);
        assert_approx_eq!(curve.evaluate(0.7), 0.6, 0.001);
        assert_approx_eq!(curve.evaluate(1.0), 0.2, 0.001);
    }

    #[test]
    fn test_empty_defaults_to_full_effect() {
        let curve = FalloffCurve::new(vec![]);
        assert_approx_eq!(curve.evaluate(0.3), 1.0, 0.001);
    }
}
