//! Loss functions for panoptic training.
//!
//! - [`PanopticLoss`]: the interface the training loop drives
//! - [`PanopticCriterion`]: semantic cross-entropy, center heatmap MSE and offset L1
//! - [`LossTracker`]: running averages of the loss terms between reports

mod criterion;
mod tracker;

pub use criterion::PanopticCriterion;
pub use tracker::{LossComponents, LossTracker};

use burn::prelude::*;

use crate::data::PanopticTargets;
use crate::error::Result;
use crate::model::PanopticOutput;

/// Scalar loss plus the host values of its terms.
#[derive(Debug, Clone)]
pub struct LossOutput<B: Backend> {
    /// Total loss to backpropagate.
    pub total: Tensor<B, 1>,
    /// Unweighted-by-count values of each term, already scaled by their weights.
    pub components: LossComponents,
}

/// A panoptic loss with running statistics.
///
/// [`compute`](Self::compute) has no side effects, so the caller decides
/// which passes count towards the statistics by calling
/// [`record`](Self::record).
pub trait PanopticLoss<B: Backend> {
    /// Compute the loss of a batch.
    fn compute(
        &self,
        output: &PanopticOutput<B>,
        targets: &PanopticTargets<B>,
    ) -> Result<LossOutput<B>>;

    /// Add one step's terms to the running averages.
    fn record(&mut self, components: &LossComponents);

    /// Running averages since the last reset.
    fn components(&self) -> LossComponents;

    /// Clear the running averages.
    fn reset(&mut self);
}
