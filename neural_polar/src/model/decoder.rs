//! The panoptic decoder interface.
//!
//! A decoder turns one sample's dense predictions into a grid of packed
//! panoptic codes. Center clustering and non-maximum suppression live behind
//! this trait.

use burn::prelude::*;
use polar_core::{ForegroundMask, PanopticGrid, PanopticLabel};

use crate::config::TrainingConfig;
use crate::data::int_values;
use crate::error::{PolarError, Result};

/// Decoder settings for one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeParams {
    /// Classes that carry instances (evaluation label space).
    pub thing_classes: Vec<u32>,
    /// Minimum heatmap score for a center.
    pub threshold: f32,
    /// NMS window size.
    pub nms_kernel: usize,
    /// Maximum number of centers.
    pub top_k: usize,
    /// Whether the grid is polar, so the angular axis wraps around.
    pub polar: bool,
}

impl DecodeParams {
    /// Collect decoder settings from a training configuration.
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            thing_classes: config.thing_classes.clone(),
            threshold: config.post_processing.threshold,
            nms_kernel: config.post_processing.nms_kernel,
            top_k: config.post_processing.top_k,
            polar: config.grid.polar,
        }
    }

    /// Whether `class` is a thing class.
    pub fn is_thing(&self, class: u32) -> bool {
        self.thing_classes.contains(&class)
    }
}

/// Decoder output for one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPanoptic {
    /// Packed codes for every voxel; zero outside the foreground mask.
    pub grid: PanopticGrid,
    /// Detected instance centers as BEV cells.
    pub centers: Vec<[u32; 2]>,
}

/// Turns dense predictions into panoptic labels.
pub trait PanopticDecoder<B: Backend> {
    /// Decode one sample.
    ///
    /// - `semantic`: [classes, X, Y, Z] logits
    /// - `center`: [1, X, Y] heatmap
    /// - `offset`: [2, X, Y] offsets
    ///
    /// Only voxels set in `mask` may receive a non-zero code.
    fn decode(
        &self,
        semantic: Tensor<B, 4>,
        center: Tensor<B, 3>,
        offset: Tensor<B, 3>,
        params: &DecodeParams,
        mask: &ForegroundMask,
    ) -> Result<DecodedPanoptic>;
}

/// Decoder that labels every foreground voxel with its argmax class and no instance.
///
/// Train-space class `t` becomes evaluation class `t + class_offset`. Useful
/// as a baseline and for checking the evaluation path without clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgmaxDecoder {
    class_offset: u32,
}

impl Default for ArgmaxDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArgmaxDecoder {
    /// Decoder mapping train class `t` to evaluation class `t + 1`.
    pub fn new() -> Self {
        Self { class_offset: 1 }
    }

    /// Decoder with a custom class offset.
    pub fn with_class_offset(class_offset: u32) -> Self {
        Self { class_offset }
    }
}

impl<B: Backend> PanopticDecoder<B> for ArgmaxDecoder {
    fn decode(
        &self,
        semantic: Tensor<B, 4>,
        _center: Tensor<B, 3>,
        _offset: Tensor<B, 3>,
        _params: &DecodeParams,
        mask: &ForegroundMask,
    ) -> Result<DecodedPanoptic> {
        let [_, x, y, z] = semantic.dims();
        let shape = mask.shape();
        if shape.dims() != [x, y, z] {
            return Err(PolarError::ShapeMismatch {
                expected: shape.dims().to_vec(),
                got: vec![x, y, z],
            });
        }

        let classes = int_values(semantic.argmax(0))?;
        let codes = classes
            .iter()
            .zip(mask.as_slice())
            .map(|(&class, &occupied)| {
                if occupied {
                    PanopticLabel::pack(class as u32 + self.class_offset, 0).code()
                } else {
                    0
                }
            })
            .collect();

        Ok(DecodedPanoptic {
            grid: PanopticGrid::from_codes(shape, codes)?,
            centers: Vec::new(),
        })
    }
}
