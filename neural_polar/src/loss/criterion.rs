//! Reference panoptic criterion.

use burn::prelude::*;
use burn::tensor::activation::log_softmax;
use burn::tensor::ElementConversion;

use crate::config::PanopticLossConfig;
use crate::data::PanopticTargets;
use crate::error::{PolarError, Result};
use crate::model::PanopticOutput;

use super::tracker::{LossComponents, LossTracker};
use super::{LossOutput, PanopticLoss};

/// Weighted sum of three terms:
///
/// - semantic: voxel cross-entropy, voxels labelled `ignore_label` excluded
/// - heatmap: `center_loss_weight · mean((ĉ - c)²)`
/// - offset: `offset_loss_weight · Σ|ô - o|` over cells with a non-zero
///   ground-truth offset, divided by their count
#[derive(Debug, Clone)]
pub struct PanopticCriterion {
    config: PanopticLossConfig,
    tracker: LossTracker,
}

impl PanopticCriterion {
    /// Create a new criterion.
    pub fn new(config: PanopticLossConfig) -> Self {
        Self {
            config,
            tracker: LossTracker::new(),
        }
    }

    /// Loss weights.
    pub fn config(&self) -> &PanopticLossConfig {
        &self.config
    }

    /// Masked cross-entropy.
    ///
    /// Input: logits [batch, classes, X, Y, Z], labels [batch, X, Y, Z]
    pub fn semantic_loss<B: Backend>(
        &self,
        logits: Tensor<B, 5>,
        labels: Tensor<B, 4, Int>,
    ) -> Tensor<B, 1> {
        let [b, c, x, y, z] = logits.dims();
        let m = b * x * y * z;

        let flat = logits.permute([0, 2, 3, 4, 1]).reshape([m, c]);
        let labels = labels.reshape([m]);
        let valid = labels.clone().not_equal_elem(self.config.ignore_label).float();
        let safe = labels.clamp(0, c as i64 - 1).reshape([m, 1]);

        let picked = log_softmax(flat, 1).gather(1, safe).reshape([m]);
        let nll = picked.neg() * valid.clone();
        nll.sum() / valid.sum().clamp_min(1.0)
    }

    /// Weighted MSE between heatmaps.
    pub fn heatmap_loss<B: Backend>(&self, pred: Tensor<B, 4>, gt: Tensor<B, 4>) -> Tensor<B, 1> {
        (pred - gt)
            .powf_scalar(2.0)
            .mean()
            .mul_scalar(self.config.center_loss_weight)
    }

    /// Weighted L1 over cells that belong to an instance.
    pub fn offset_loss<B: Backend>(&self, pred: Tensor<B, 4>, gt: Tensor<B, 4>) -> Tensor<B, 1> {
        let mask = gt.clone().abs().sum_dim(1).greater_elem(0.0).float();
        let l1 = (pred - gt).abs() * mask.clone();
        (l1.sum() / mask.sum().clamp_min(1.0)).mul_scalar(self.config.offset_loss_weight)
    }
}

fn check_dims(expected: &[usize], got: &[usize]) -> Result<()> {
    if expected != got {
        return Err(PolarError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}

impl<B: Backend> PanopticLoss<B> for PanopticCriterion {
    fn compute(
        &self,
        output: &PanopticOutput<B>,
        targets: &PanopticTargets<B>,
    ) -> Result<LossOutput<B>> {
        let [b, _, x, y, z] = output.semantic.dims();
        check_dims(&[b, x, y, z], &targets.voxel_labels.dims())?;
        check_dims(&targets.center.dims(), &output.center.dims())?;
        check_dims(&targets.offset.dims(), &output.offset.dims())?;

        let semantic =
            self.semantic_loss(output.semantic.clone(), targets.voxel_labels.clone());
        let heatmap = self.heatmap_loss(output.center.clone(), targets.center.clone());
        let offset = self.offset_loss(output.offset.clone(), targets.offset.clone());

        let components = LossComponents::new(
            semantic.clone().into_scalar().elem::<f64>(),
            heatmap.clone().into_scalar().elem::<f64>(),
            offset.clone().into_scalar().elem::<f64>(),
        );

        Ok(LossOutput {
            total: semantic + heatmap + offset,
            components,
        })
    }

    fn record(&mut self, components: &LossComponents) {
        self.tracker.add(components);
    }

    fn components(&self) -> LossComponents {
        self.tracker.averages()
    }

    fn reset(&mut self) {
        self.tracker.reset();
    }
}
