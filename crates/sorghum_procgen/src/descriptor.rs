//! Per-organ plant parameters and the L1 -> Base expansion.
//!
//! A descriptor is authored either directly (`Cascade::Base`: one stem plus
//! an explicit leaf list) or from the compact L1 parameter set, in which case
//! [`ProceduralDescriptor::ready`] samples the leaf list from response curves
//! and Gaussian variance.

use std::path::Path;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use sorghum_core::{Error, Result};

use crate::curve::ResponseCurve;

/// Source of Gaussian draws used by the L1 expansion
pub trait GaussianSource {
    /// Draw from N(mean, std_dev). Non-positive `std_dev` returns `mean`.
    fn sample(&mut self, mean: f32, std_dev: f32) -> f32;
}

/// Seeded Gaussian source for reproducible expansions
#[derive(Debug, Clone)]
pub struct SeededGaussian {
    rng: StdRng,
}

impl SeededGaussian {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl GaussianSource for SeededGaussian {
    fn sample(&mut self, mean: f32, std_dev: f32) -> f32 {
        if !(std_dev > 0.0) {
            return mean;
        }
        match Normal::new(mean, std_dev) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => mean,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Cascade {
    /// Stem and leaves derived from [`L1Parameters`]
    #[default]
    L1,
    /// Stem and leaves authored directly
    Base,
}

/// `max * curve(step)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveParameter {
    pub max: f32,
    pub curve: ResponseCurve,
}

impl Default for CurveParameter {
    fn default() -> Self {
        Self::new(1.0, ResponseCurve::constant(1.0))
    }
}

impl CurveParameter {
    pub fn new(max: f32, curve: ResponseCurve) -> Self {
        Self { max, curve }
    }

    pub fn evaluate(&self, step: f32) -> f32 {
        self.max * self.curve.evaluate(step)
    }
}

/// `max * curve(step) + N(0, variance_max * variance_curve(step))`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariedParameter {
    pub max: f32,
    pub curve: ResponseCurve,
    pub variance_max: f32,
    pub variance_curve: ResponseCurve,
}

impl Default for VariedParameter {
    fn default() -> Self {
        Self::new(1.0, ResponseCurve::constant(1.0))
    }
}

impl VariedParameter {
    pub fn new(max: f32, curve: ResponseCurve) -> Self {
        Self {
            max,
            curve,
            variance_max: 0.0,
            variance_curve: ResponseCurve::new(0.5, 0.5),
        }
    }

    pub fn with_variance(mut self, variance_max: f32) -> Self {
        self.variance_max = variance_max;
        self
    }

    pub fn sample(&self, step: f32, gauss: &mut dyn GaussianSource) -> f32 {
        self.max * self.curve.evaluate(step)
            + gauss.sample(0.0, self.variance_max * self.variance_curve.evaluate(step))
    }

    fn curves(&self) -> [&ResponseCurve; 2] {
        [&self.curve, &self.variance_curve]
    }
}

/// Compact parameter set from which the leaf list is generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct L1Parameters {
    pub leaf_count: u32,
    pub stem_length: f32,
    pub first_leaf_starting_point: f32,
    pub leaf_length: VariedParameter,
    pub branching_angle: VariedParameter,
    /// Roll alternates 0/180 by parity; this is the std-dev of the jitter
    pub roll_angle_variance: CurveParameter,
    pub gravitropism: VariedParameter,
    pub gravitropism_factor: VariedParameter,
    pub leaf_width: CurveParameter,
    pub width_decrease_start: CurveParameter,
    pub waviness: CurveParameter,
    pub waviness_period: CurveParameter,
}

impl Default for L1Parameters {
    fn default() -> Self {
        Self {
            leaf_count: 8,
            stem_length: 0.875,
            first_leaf_starting_point: 0.2,
            leaf_length: VariedParameter::new(2.55, ResponseCurve::new(0.333, 0.247)),
            branching_angle: VariedParameter::new(50.0, ResponseCurve::new(0.5, 0.1)),
            roll_angle_variance: CurveParameter::new(10.0, ResponseCurve::new(0.1, 1.0)),
            gravitropism: VariedParameter::new(4.0, ResponseCurve::new(0.5, 0.0)),
            gravitropism_factor: VariedParameter::new(1.0, ResponseCurve::new(0.9, 0.0)),
            leaf_width: CurveParameter::new(0.05, ResponseCurve::constant(1.0)),
            width_decrease_start: CurveParameter::new(1.0, ResponseCurve::constant(0.5)),
            waviness: CurveParameter::new(10.0, ResponseCurve::constant(0.5)),
            waviness_period: CurveParameter::new(1.5, ResponseCurve::constant(1.0)),
        }
    }
}

impl L1Parameters {
    fn curves(&self) -> Vec<&ResponseCurve> {
        let mut curves = vec![
            &self.roll_angle_variance.curve,
            &self.leaf_width.curve,
            &self.width_decrease_start.curve,
            &self.waviness.curve,
            &self.waviness_period.curve,
        ];
        for varied in [
            &self.leaf_length,
            &self.branching_angle,
            &self.gravitropism,
            &self.gravitropism_factor,
        ] {
            curves.extend(varied.curves());
        }
        curves
    }

    /// Sample the leaf list. `step = i / (N - 1)`, or 0 for a single leaf.
    pub fn expand(&self, gauss: &mut dyn GaussianSource) -> Result<Vec<LeafDescriptor>> {
        if self.leaf_count == 0 {
            return Err(Error::config("L1 leaf count must be positive"));
        }
        let n = self.leaf_count as usize;
        let first = self.first_leaf_starting_point;

        let leaves = (0..n)
            .map(|i| {
                let step = if n > 1 {
                    i as f32 / (n - 1) as f32
                } else {
                    0.0
                };
                let parity_roll = (i % 2) as f32 * 180.0;
                LeafDescriptor {
                    leaf_index: i as u32,
                    starting_point: first + step * (1.0 - first),
                    length: self.leaf_length.sample(step, gauss),
                    branching_angle: self.branching_angle.sample(step, gauss),
                    roll_angle: parity_roll
                        + gauss.sample(0.0, self.roll_angle_variance.evaluate(step)),
                    gravitropism: self.gravitropism.sample(step, gauss),
                    gravitropism_factor: self.gravitropism_factor.sample(step, gauss),
                    leaf_max_width: self.leaf_width.evaluate(step),
                    width_decrease_start: self.width_decrease_start.evaluate(step),
                    waviness: self.waviness.evaluate(step),
                    waviness_period: self.waviness_period.evaluate(step),
                }
            })
            .collect();
        Ok(leaves)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StemDescriptor {
    pub direction: Vec3,
    pub length: f32,
    pub width_max: f32,
    /// Width along the stem relative to `width_max`
    pub width_distribution: ResponseCurve,
    /// Fraction of the angle to gravity bent per unit step
    pub gravitropism_factor: f32,
}

impl Default for StemDescriptor {
    fn default() -> Self {
        Self {
            direction: Vec3::Y,
            length: 0.875,
            width_max: 0.015,
            width_distribution: ResponseCurve::new(1.0, 0.4),
            gravitropism_factor: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeafDescriptor {
    pub leaf_index: u32,
    /// Fraction of the stem length where the sheath starts
    pub starting_point: f32,
    pub length: f32,
    /// Degrees away from the stem axis
    pub branching_angle: f32,
    /// Degrees around the stem axis
    pub roll_angle: f32,
    /// Degrees bent toward gravity at the first blade step
    pub gravitropism: f32,
    /// Per-step increase of `gravitropism`
    pub gravitropism_factor: f32,
    pub leaf_max_width: f32,
    /// Fraction of the blade after which the width decreases to 0
    pub width_decrease_start: f32,
    pub waviness_period: f32,
    /// Roll oscillation amplitude in degrees
    pub waviness: f32,
}

impl Default for LeafDescriptor {
    fn default() -> Self {
        Self {
            leaf_index: 0,
            starting_point: 0.5,
            length: 0.8,
            branching_angle: 30.0,
            roll_angle: 0.0,
            gravitropism: 2.0,
            gravitropism_factor: 0.5,
            leaf_max_width: 0.2,
            width_decrease_start: 0.5,
            waviness_period: 1.25,
            waviness: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinnacleDescriptor {
    pub has_pinnacle: bool,
    pub pinnacle_size: Vec3,
    pub seed_amount: u32,
    pub seed_radius: f32,
}

impl Default for PinnacleDescriptor {
    fn default() -> Self {
        Self {
            has_pinnacle: false,
            pinnacle_size: Vec3::new(0.2, 0.75, 0.2),
            seed_amount: 1200,
            seed_radius: 0.02,
        }
    }
}

/// Complete plant description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProceduralDescriptor {
    pub cascade: Cascade,
    pub l1: L1Parameters,
    pub stem: StemDescriptor,
    pub leaves: Vec<LeafDescriptor>,
    pub pinnacle: PinnacleDescriptor,
}

impl ProceduralDescriptor {
    /// Directly authored descriptor
    pub fn base(stem: StemDescriptor, leaves: Vec<LeafDescriptor>) -> Self {
        Self {
            cascade: Cascade::Base,
            stem,
            leaves,
            ..Default::default()
        }
    }

    /// Resolve the generation-ready stem and leaf list.
    ///
    /// L1 descriptors replace `stem` and `leaves` with the sampled expansion.
    /// On error the leaf list is left empty so a plant can still be built
    /// from the stem alone.
    pub fn ready(&mut self, gauss: &mut dyn GaussianSource) -> Result<()> {
        let result = self.resolve(gauss);
        if let Err(err) = &result {
            log::error!("Descriptor not ready: {}", err);
            self.leaves.clear();
        }
        result
    }

    fn resolve(&mut self, gauss: &mut dyn GaussianSource) -> Result<()> {
        self.stem.width_distribution.validate()?;
        match self.cascade {
            Cascade::L1 => {
                for curve in self.l1.curves() {
                    curve.validate()?;
                }
                self.stem = StemDescriptor {
                    length: self.l1.stem_length,
                    ..StemDescriptor::default()
                };
                self.leaves = self.l1.expand(gauss)?;
            }
            Cascade::Base => {
                self.leaves.sort_by_key(|leaf| leaf.leaf_index);
                if self
                    .leaves
                    .windows(2)
                    .any(|w| w[1].starting_point < w[0].starting_point)
                {
                    return Err(Error::config(
                        "leaf starting points must not decrease with leaf index",
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|e| Error::io(path, e))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns the mean plus a fixed offset scaled by the deviation
    struct FixedGaussian(f32);

    impl GaussianSource for FixedGaussian {
        fn sample(&mut self, mean: f32, std_dev: f32) -> f32 {
            mean + self.0 * std_dev.max(0.0)
        }
    }

    #[test]
    fn test_starting_points_monotonic_within_range() {
        for n in 2..20 {
            let l1 = L1Parameters {
                leaf_count: n,
                ..Default::default()
            };
            let leaves = l1.expand(&mut SeededGaussian::new(n as u64)).unwrap();
            assert_eq!(leaves.len(), n as usize);
            for w in leaves.windows(2) {
                assert!(w[1].starting_point >= w[0].starting_point);
            }
            for leaf in &leaves {
                assert!(leaf.starting_point >= l1.first_leaf_starting_point);
                assert!(leaf.starting_point <= 1.0);
            }
            assert_eq!(leaves[n as usize - 1].starting_point, 1.0);
        }
    }

    #[test]
    fn test_expansion_without_variance() {
        let l1 = L1Parameters {
            leaf_count: 3,
            ..Default::default()
        };
        let leaves = l1.expand(&mut FixedGaussian(0.0)).unwrap();

        assert_eq!(leaves[0].starting_point, 0.2);
        assert!((leaves[1].starting_point - 0.6).abs() < 1e-6);
        assert!((leaves[0].length - 2.55 * 0.333).abs() < 1e-5);
        assert!((leaves[2].length - 2.55 * 0.247).abs() < 1e-5);
        assert!((leaves[0].branching_angle - 25.0).abs() < 1e-5);
        assert!((leaves[2].branching_angle - 5.0).abs() < 1e-5);
        assert_eq!(leaves[0].roll_angle, 0.0);
        assert_eq!(leaves[1].roll_angle, 180.0);
        assert_eq!(leaves[2].roll_angle, 0.0);
        assert!((leaves[0].gravitropism - 2.0).abs() < 1e-6);
        assert!(leaves[2].gravitropism.abs() < 1e-6);
    }

    #[test]
    fn test_roll_variance_uses_curve() {
        let l1 = L1Parameters {
            leaf_count: 2,
            ..Default::default()
        };
        let leaves = l1.expand(&mut FixedGaussian(1.0)).unwrap();
        // std-dev 10 * 0.1 at step 0, 10 * 1.0 at step 1
        assert!((leaves[0].roll_angle - 1.0).abs() < 1e-5);
        assert!((leaves[1].roll_angle - 190.0).abs() < 1e-4);
    }

    #[test]
    fn test_single_leaf_uses_step_zero() {
        let l1 = L1Parameters {
            leaf_count: 1,
            ..Default::default()
        };
        let leaves = l1.expand(&mut FixedGaussian(0.0)).unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].starting_point, 0.2);
        assert!((leaves[0].length - 2.55 * 0.333).abs() < 1e-5);
    }

    #[test]
    fn test_zero_leaf_count_degrades_to_empty() {
        let mut descriptor = ProceduralDescriptor::default();
        descriptor.l1.leaf_count = 0;
        descriptor.leaves.push(LeafDescriptor::default());
        let result = descriptor.ready(&mut SeededGaussian::new(1));
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(descriptor.leaves.is_empty());
    }

    #[test]
    fn test_ready_same_seed_same_leaves() {
        let mut l1 = L1Parameters::default();
        l1.leaf_length = l1.leaf_length.with_variance(0.3);
        let mut a = ProceduralDescriptor {
            l1: l1.clone(),
            ..Default::default()
        };
        let mut b = a.clone();
        a.ready(&mut SeededGaussian::new(42)).unwrap();
        b.ready(&mut SeededGaussian::new(42)).unwrap();
        assert_eq!(a.leaves, b.leaves);
        assert_eq!(a.stem.length, 0.875);
    }

    #[test]
    fn test_base_rejects_decreasing_starting_points() {
        let leaves = vec![
            LeafDescriptor {
                leaf_index: 0,
                starting_point: 0.6,
                ..Default::default()
            },
            LeafDescriptor {
                leaf_index: 1,
                starting_point: 0.3,
                ..Default::default()
            },
        ];
        let mut descriptor = ProceduralDescriptor::base(StemDescriptor::default(), leaves);
        assert!(descriptor.ready(&mut SeededGaussian::new(0)).is_err());
        assert!(descriptor.leaves.is_empty());
    }

    #[test]
    fn test_non_positive_deviation_returns_mean() {
        let mut gauss = SeededGaussian::new(9);
        assert_eq!(gauss.sample(3.0, 0.0), 3.0);
        assert_eq!(gauss.sample(3.0, -1.0), 3.0);
        assert_eq!(gauss.sample(3.0, f32::NAN), 3.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut descriptor = ProceduralDescriptor::default();
        descriptor.pinnacle.has_pinnacle = true;
        descriptor.ready(&mut SeededGaussian::new(5)).unwrap();

        let text = descriptor.to_json().unwrap();
        let restored = ProceduralDescriptor::from_json(&text).unwrap();
        assert_eq!(descriptor, restored);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = ProceduralDescriptor::load("/nonexistent/descriptor.json");
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
