//! Training configuration types.

use burn::config::Config;
use serde::{Deserialize, Serialize};

use super::{PostProcessingConfig, VoxelGridConfig};

/// SemanticKITTI class names in evaluation order, without `unlabeled`.
pub fn semantic_kitti_class_names() -> Vec<String> {
    [
        "car",
        "bicycle",
        "motorcycle",
        "truck",
        "other-vehicle",
        "person",
        "bicyclist",
        "motorcyclist",
        "road",
        "parking",
        "sidewalk",
        "other-ground",
        "building",
        "fence",
        "vegetation",
        "trunk",
        "terrain",
        "pole",
        "traffic-sign",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_checkpoint_path() -> String {
    "./panoptic_polar.bin".to_string()
}

/// What the training loop does when a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BatchFailurePolicy {
    /// Count the failure, log the first one of the epoch and continue.
    #[default]
    Skip,
    /// Stop training and return the error.
    Abort,
}

/// Self-adversarial pruning settings.
#[derive(Config, Debug)]
pub struct SapConfig {
    /// Whether the two-pass pruning step is used at all.
    #[config(default = false)]
    pub enabled: bool,

    /// Fraction of points removed per sample, in (0, 1).
    #[config(default = 0.01)]
    pub rate: f64,

    /// First epoch (0-based) that uses the pruning step.
    #[config(default = 30)]
    pub start_epoch: usize,
}

impl Default for SapConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SapConfig {
    /// Whether the pruning step applies to `epoch`.
    pub fn active_at(&self, epoch: usize) -> bool {
        self.enabled && epoch >= self.start_epoch
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.rate > 0.0 && self.rate < 1.0) {
            return Err(format!("SAP rate must lie in (0, 1), got {}", self.rate));
        }
        Ok(())
    }
}

/// Weights for the panoptic loss terms.
#[derive(Config, Debug)]
pub struct PanopticLossConfig {
    /// Weight of the center heatmap term.
    #[config(default = 100.0)]
    pub center_loss_weight: f32,

    /// Weight of the offset term.
    #[config(default = 10.0)]
    pub offset_loss_weight: f32,

    /// Voxel label excluded from the semantic term.
    #[config(default = 255)]
    pub ignore_label: i64,
}

impl Default for PanopticLossConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the panoptic training loop.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Voxel grid.
    #[config(default = "VoxelGridConfig::new()")]
    pub grid: VoxelGridConfig,

    /// Decoder parameters used during evaluation and export.
    #[config(default = "PostProcessingConfig::new()")]
    pub post_processing: PostProcessingConfig,

    /// Self-adversarial pruning.
    #[config(default = "SapConfig::new()")]
    pub sap: SapConfig,

    /// Loss weights.
    #[config(default = "PanopticLossConfig::new()")]
    pub loss: PanopticLossConfig,

    /// Number of epochs; each starts with an evaluation round.
    #[config(default = 100)]
    pub max_epoch: usize,

    /// Scans per training batch.
    #[config(default = 2)]
    pub train_batch_size: usize,

    /// Scans per validation batch.
    #[config(default = 2)]
    pub val_batch_size: usize,

    /// Optimizer learning rate.
    #[config(default = 1e-3)]
    pub learning_rate: f64,

    /// Number of evaluation classes, including the ignored class 0.
    #[config(default = 20)]
    pub n_classes: usize,

    /// Evaluation classes that carry instances.
    #[config(default = "vec![1, 2, 3, 4, 5, 6, 7, 8]")]
    pub thing_classes: Vec<u32>,

    /// Evaluation classes excluded from every metric.
    #[config(default = "vec![0]")]
    pub ignore_classes: Vec<u32>,

    /// Minimum segment size for unmatched segments to count as FP/FN.
    #[config(default = 50)]
    pub min_points: u64,

    /// Display names for classes 1.., used in the evaluation report.
    #[config(default = "semantic_kitti_class_names()")]
    pub class_names: Vec<String>,

    /// Reaction to a failing training batch.
    #[config(default = "BatchFailurePolicy::Skip")]
    pub failure_policy: BatchFailurePolicy,

    /// Where the best checkpoint is written and resumed from.
    #[config(default = "default_checkpoint_path()")]
    pub model_save_path: String,

    /// Weights loaded when no checkpoint exists yet.
    pub pretrained_model: Option<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingConfig {
    /// Display name of an evaluation class.
    pub fn class_name(&self, class: usize) -> String {
        class
            .checked_sub(1)
            .and_then(|i| self.class_names.get(i))
            .cloned()
            .unwrap_or_else(|| format!("class {}", class))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.grid.validate()?;
        self.post_processing.validate()?;
        if self.sap.enabled {
            self.sap.validate()?;
        }

        if self.learning_rate <= 0.0 {
            return Err("learning_rate must be positive".to_string());
        }
        if self.train_batch_size == 0 || self.val_batch_size == 0 {
            return Err("batch sizes must be positive".to_string());
        }
        if self.n_classes < 2 || self.n_classes > (1 << polar_core::SEMANTIC_BITS) {
            return Err(format!(
                "n_classes must lie in [2, 65536], got {}",
                self.n_classes
            ));
        }
        if let Some(&c) = self
            .thing_classes
            .iter()
            .chain(&self.ignore_classes)
            .find(|&&c| c as usize >= self.n_classes)
        {
            return Err(format!("class {} out of range for {} classes", c, self.n_classes));
        }

        Ok(())
    }
}
