//! Self-adversarial pruning.
//!
//! After a first backward pass, the points whose input features received the
//! largest gradients are the ones the network leans on most. Dropping a small
//! fraction of them before a second pass makes the model robust to losing
//! its most influential evidence.

use std::cmp::Ordering;

use burn::prelude::*;

use crate::data::{float_values, PointSet};
use crate::error::{PolarError, Result};

/// Per-sample keep mask produced by one pruning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruningDecision {
    keep: Vec<bool>,
}

impl PruningDecision {
    /// Keep every point.
    pub fn keep_all(n: usize) -> Self {
        Self { keep: vec![true; n] }
    }

    /// Keep flags, one per point.
    pub fn mask(&self) -> &[bool] {
        &self.keep
    }

    /// Number of retained points.
    pub fn kept(&self) -> usize {
        self.keep.iter().filter(|&&k| k).count()
    }

    /// Number of removed points.
    pub fn removed(&self) -> usize {
        self.keep.len() - self.kept()
    }

    /// Indices of retained points, in their original order.
    pub fn kept_indices(&self) -> Vec<usize> {
        self.keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect()
    }

    /// Build a filtered copy of `points`; the input is left untouched.
    pub fn apply<B: Backend>(&self, points: &PointSet<B>) -> Result<PointSet<B>> {
        if points.len() != self.keep.len() {
            return Err(PolarError::ShapeMismatch {
                expected: vec![self.keep.len()],
                got: vec![points.len()],
            });
        }
        if self.removed() == 0 {
            return Ok(points.clone());
        }

        let kept = self.kept_indices();
        let coords = kept.iter().map(|&i| points.coords[i]).collect();
        let index: Vec<i64> = kept.iter().map(|&i| i as i64).collect();
        let device = points.features.device();
        let index = Tensor::<B, 1, Int>::from_data(TensorData::new(index, [kept.len()]), &device);

        PointSet::new(points.features.clone().select(0, index), coords)
    }
}

/// Removes the points with the largest input-gradient magnitudes.
///
/// For `N > 1` points exactly `k = clamp(floor(rate · N), 1, N - 1)` are
/// removed. Magnitudes are ranked in descending order; among equal
/// magnitudes the lower index is removed first. So every retained point has
/// a magnitude no larger than any removed one, and at least one point always
/// survives. Dropping every point tied at the `k`-th magnitude would empty a
/// sample whose magnitudes are all equal, so ties are split by index instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SapPruner {
    rate: f64,
}

impl SapPruner {
    /// Create a pruner. `rate` must lie strictly between 0 and 1.
    pub fn new(rate: f64) -> Result<Self> {
        if !(rate > 0.0 && rate < 1.0) {
            return Err(PolarError::invalid_config(format!(
                "SAP rate must lie in (0, 1), got {}",
                rate
            )));
        }
        Ok(Self { rate })
    }

    /// Pruning rate.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Number of points removed from a sample of `n` points.
    pub fn removal_count(&self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        let k = (self.rate * n as f64).floor() as usize;
        k.clamp(1, n - 1)
    }

    /// Decide which points of one sample to keep.
    pub fn decide(&self, magnitudes: &[f32]) -> PruningDecision {
        let n = magnitudes.len();
        let k = self.removal_count(n);
        let mut decision = PruningDecision::keep_all(n);
        if k == 0 {
            return decision;
        }

        let mut order: Vec<usize> = (0..n).collect();
        let by_magnitude_desc = |a: &usize, b: &usize| -> Ordering {
            magnitudes[*b]
                .total_cmp(&magnitudes[*a])
                .then_with(|| a.cmp(b))
        };
        order.select_nth_unstable_by(k - 1, by_magnitude_desc);
        for &i in &order[..k] {
            decision.keep[i] = false;
        }
        decision
    }

    /// Prune one sample given its per-point gradient magnitudes.
    pub fn prune<B: Backend>(
        &self,
        points: &PointSet<B>,
        magnitudes: &[f32],
    ) -> Result<PointSet<B>> {
        self.decide(magnitudes).apply(points)
    }
}

/// L2 norm of each row of a gradient: [N, C] -> N values.
pub fn gradient_magnitudes<B: Backend>(grad: Tensor<B, 2>) -> Result<Vec<f32>> {
    float_values(grad.powf_scalar(2.0).sum_dim(1).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use polar_core::VoxelCoord;

    type TestBackend = NdArray;

    #[test]
    fn test_rate_validation() {
        assert!(SapPruner::new(0.0).is_err());
        assert!(SapPruner::new(1.0).is_err());
        assert!(SapPruner::new(f64::NAN).is_err());
        assert!(SapPruner::new(0.01).is_ok());
    }

    #[test]
    fn test_removal_count_clamps() {
        let pruner = SapPruner::new(0.01).unwrap();
        assert_eq!(pruner.removal_count(0), 0);
        assert_eq!(pruner.removal_count(1), 0);
        assert_eq!(pruner.removal_count(2), 1);
        assert_eq!(pruner.removal_count(50), 1);
        assert_eq!(pruner.removal_count(1000), 10);

        let greedy = SapPruner::new(0.99).unwrap();
        assert_eq!(greedy.removal_count(3), 2);
    }

    #[test]
    fn test_decide_removes_largest() {
        let pruner = SapPruner::new(0.4).unwrap();
        let decision = pruner.decide(&[0.1, 5.0, 0.3, 4.0, 0.2]);
        assert_eq!(decision.mask(), &[true, false, true, false, true]);
        assert_eq!(decision.removed(), 2);
    }

    #[test]
    fn test_ties_remove_lowest_index_first() {
        let pruner = SapPruner::new(0.5).unwrap();
        let decision = pruner.decide(&[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(decision.mask(), &[false, false, true, true]);
    }

    #[test]
    fn test_single_point_untouched() {
        let pruner = SapPruner::new(0.5).unwrap();
        assert_eq!(pruner.decide(&[3.0]).removed(), 0);
        assert_eq!(pruner.decide(&[]).removed(), 0);
    }

    #[test]
    fn test_prune_copies_points() {
        let device = Default::default();
        let features = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0], [3, 2]),
            &device,
        );
        let coords = vec![
            VoxelCoord::new(0, 0, 0),
            VoxelCoord::new(1, 0, 0),
            VoxelCoord::new(2, 0, 0),
        ];
        let points = PointSet::new(features, coords).unwrap();
        let pruner = SapPruner::new(0.34).unwrap();

        let pruned = pruner.prune(&points, &[0.5, 9.0, 0.1]).unwrap();
        assert_eq!(pruned.len(), 2);
        assert_eq!(pruned.coords, vec![VoxelCoord::new(0, 0, 0), VoxelCoord::new(2, 0, 0)]);
        let values = float_values(pruned.features).unwrap();
        assert_eq!(values, vec![0.0, 1.0, 4.0, 5.0]);

        // Original untouched.
        assert_eq!(points.len(), 3);
        assert_eq!(float_values(points.features).unwrap().len(), 6);
    }

    #[test]
    fn test_gradient_magnitudes() {
        let device = Default::default();
        let grad = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![3.0f32, 4.0, 0.0, 0.0], [2, 2]),
            &device,
        );
        let mags = gradient_magnitudes(grad).unwrap();
        assert!((mags[0] - 5.0).abs() < 1e-6);
        assert_eq!(mags[1], 0.0);
    }
}
