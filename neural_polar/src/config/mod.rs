//! Configuration types for neural_polar.
//!
//! Burn-style configuration structs for the voxel grid, post-processing,
//! self-adversarial pruning, the loss, the reference network and the
//! training loop. Every struct can be saved to and loaded from JSON through
//! Burn's `Config` trait.

mod grid;
mod network;
mod training;

pub use grid::{PostProcessingConfig, VoxelGridConfig};
pub use network::PointBevNetConfig;
pub use training::{
    semantic_kitti_class_names, BatchFailurePolicy, PanopticLossConfig, SapConfig,
    TrainingConfig,
};
