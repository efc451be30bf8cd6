//! The network interface consumed by training and evaluation.

use burn::prelude::*;

use crate::data::NetworkInput;
use crate::error::{PolarError, Result};

/// Raw network predictions for a batch.
#[derive(Debug, Clone)]
pub struct PanopticOutput<B: Backend> {
    /// Semantic logits: [batch, classes, X, Y, Z]
    pub semantic: Tensor<B, 5>,
    /// Center heatmap: [batch, 1, X, Y]
    pub center: Tensor<B, 4>,
    /// Offset field: [batch, 2, X, Y]
    pub offset: Tensor<B, 4>,
}

/// Predictions for one sample of a batch.
#[derive(Debug, Clone)]
pub struct SampleOutput<B: Backend> {
    /// Semantic logits: [classes, X, Y, Z]
    pub semantic: Tensor<B, 4>,
    /// Center heatmap: [1, X, Y]
    pub center: Tensor<B, 3>,
    /// Offset field: [2, X, Y]
    pub offset: Tensor<B, 3>,
}

impl<B: Backend> PanopticOutput<B> {
    /// Number of samples.
    pub fn batch_size(&self) -> usize {
        self.semantic.dims()[0]
    }

    /// Slice out sample `index`.
    pub fn sample(&self, index: usize) -> Result<SampleOutput<B>> {
        let batch = self.batch_size();
        if index >= batch {
            return Err(PolarError::InvalidData(format!(
                "sample {} out of range for batch of {}",
                index, batch
            )));
        }
        let range = index..index + 1;
        Ok(SampleOutput {
            semantic: self.semantic.clone().slice([range.clone()]).squeeze::<4>(0),
            center: self.center.clone().slice([range.clone()]).squeeze::<3>(0),
            offset: self.offset.clone().slice([range]).squeeze::<3>(0),
        })
    }
}

/// A panoptic segmentation network.
///
/// Whether visibility features are consumed is decided when the network is
/// built and reported by [`uses_visibility`](Self::uses_visibility); it never
/// changes between calls.
pub trait PanopticNetwork<B: Backend> {
    /// Run the network on a batch.
    fn forward(&self, input: &NetworkInput<B>) -> Result<PanopticOutput<B>>;

    /// Whether [`NetworkInput::visibility`] is read.
    fn uses_visibility(&self) -> bool;
}
