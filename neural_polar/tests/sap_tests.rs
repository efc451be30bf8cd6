//! Property tests for self-adversarial pruning.

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;
use proptest::prelude::*;

use neural_polar::data::PointSet;
use neural_polar::training::{gradient_magnitudes, SapPruner};
use neural_polar::VoxelCoord;

type TestBackend = NdArray;

fn magnitudes() -> impl Strategy<Value = Vec<f32>> {
    // Few distinct values so ties are common.
    prop::collection::vec((0u8..6).prop_map(|v| v as f32 * 0.5), 1..200)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Pruning never empties a sample and always removes something from N > 1.
    #[test]
    fn retains_between_one_and_n_minus_one(mags in magnitudes(), rate in 0.001f64..0.999) {
        let pruner = SapPruner::new(rate).unwrap();
        let decision = pruner.decide(&mags);
        let n = mags.len();

        prop_assert_eq!(decision.kept() + decision.removed(), n);
        if n == 1 {
            prop_assert_eq!(decision.kept(), 1);
        } else {
            prop_assert!(decision.kept() >= 1);
            prop_assert!(decision.kept() <= n - 1);
            prop_assert_eq!(decision.removed(), pruner.removal_count(n));
        }
    }

    /// Every retained point has a magnitude no larger than any removed point.
    #[test]
    fn retained_never_exceed_removed(mags in magnitudes(), rate in 0.001f64..0.999) {
        let decision = SapPruner::new(rate).unwrap().decide(&mags);
        let kept_max = mags
            .iter()
            .zip(decision.mask())
            .filter(|(_, &keep)| keep)
            .map(|(&m, _)| m)
            .fold(f32::NEG_INFINITY, f32::max);
        let removed_min = mags
            .iter()
            .zip(decision.mask())
            .filter(|(_, &keep)| !keep)
            .map(|(&m, _)| m)
            .fold(f32::INFINITY, f32::min);
        prop_assert!(kept_max <= removed_min);
    }

    /// Applying a decision keeps features and coordinates aligned.
    #[test]
    fn apply_keeps_features_and_coords_aligned(
        mags in prop::collection::vec(0.0f32..10.0, 2..64),
        rate in 0.01f64..0.9,
    ) {
        let device = NdArrayDevice::Cpu;
        let n = mags.len();
        let features: Vec<f32> = (0..n).flat_map(|i| [i as f32, -(i as f32)]).collect();
        let coords: Vec<VoxelCoord> = (0..n as u32).map(|i| VoxelCoord::new(i, 0, 0)).collect();
        let points = PointSet::<TestBackend>::new(
            Tensor::from_data(TensorData::new(features, [n, 2]), &device),
            coords,
        )
        .unwrap();

        let pruner = SapPruner::new(rate).unwrap();
        let pruned = pruner.prune(&points, &mags).unwrap();
        let values = pruned.features.into_data().to_vec::<f32>().unwrap();

        prop_assert_eq!(pruned.coords.len(), n - pruner.removal_count(n));
        for (row, coord) in pruned.coords.iter().enumerate() {
            prop_assert_eq!(values[row * 2], coord.x as f32);
        }
    }
}

#[test]
fn test_single_point_sample_is_untouched() {
    let pruner = SapPruner::new(0.5).unwrap();
    let decision = pruner.decide(&[3.0]);
    assert_eq!(decision.kept(), 1);
    assert_eq!(decision.removed(), 0);
}

#[test]
fn test_equal_magnitudes_never_empty_a_sample() {
    let pruner = SapPruner::new(0.5).unwrap();
    let decision = pruner.decide(&[1.0; 10]);
    assert_eq!(decision.removed(), 5);
    // Ties go to the lower index first.
    assert_eq!(decision.kept_indices(), vec![5, 6, 7, 8, 9]);
}

#[test]
fn test_small_rate_still_removes_one_point() {
    let pruner = SapPruner::new(0.01).unwrap();
    assert_eq!(pruner.removal_count(10), 1);
    assert_eq!(pruner.removal_count(1000), 10);
    assert_eq!(pruner.removal_count(2), 1);
}

#[test]
fn test_pruning_uses_input_gradients() {
    type AdBackend = Autodiff<NdArray>;
    let device = NdArrayDevice::Cpu;

    let features = Tensor::<AdBackend, 2>::from_data(
        TensorData::new(vec![1.0f32, 0.0, 0.0, 5.0, 0.5, 0.5, 2.0, 2.0], [4, 2]),
        &device,
    );
    let coords: Vec<VoxelCoord> = (0..4).map(|i| VoxelCoord::new(i, 0, 0)).collect();
    let points = PointSet::new(features, coords).unwrap().tracked();

    // d/dx of sum(x^2) is 2x, so the largest row is the most salient.
    let loss = points.features.clone().powf_scalar(2.0).sum();
    let grads = loss.backward();
    let grad = points.features.grad(&grads).unwrap();
    let mags = gradient_magnitudes(grad).unwrap();
    assert_eq!(mags.len(), 4);

    let pruned = SapPruner::new(0.25).unwrap().prune(&points, &mags).unwrap();
    let kept: Vec<u32> = pruned.coords.iter().map(|c| c.x).collect();
    assert_eq!(kept, vec![0, 2, 3]);
    assert_eq!(pruned.features.dims(), [3, 2]);
}
