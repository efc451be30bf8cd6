//! # polar_core
//!
//! Tensor-free building blocks for panoptic point-cloud segmentation.
//!
//! This crate holds everything that can be expressed without a tensor
//! library, so it can be shared by the training crate, the I/O layer and
//! offline evaluation tools.
//!
//! ## Modules
//!
//! - [`types`]: Voxel coordinates, grid shapes, packed panoptic labels
//! - [`grid`]: Foreground masks and dense panoptic label grids with gather
//! - [`eval`]: Panoptic quality / semantic IoU accumulator with merge
//! - [`error`]: Error types
//!
//! ## Panoptic codes
//!
//! A panoptic code packs the semantic class into the low 16 bits and the
//! instance id into the remaining bits:
//!
//! ```
//! use polar_core::PanopticLabel;
//!
//! let label = PanopticLabel::pack(10, 3);
//! assert_eq!(label.code() & 0xFFFF, 10);
//! assert_eq!(label.instance(), 3);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Serialize/deserialize coordinates, labels and accumulators

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod eval;
pub mod grid;
pub mod types;

pub use error::{PolarCoreError, Result};
pub use eval::{PanopticEval, PanopticQuality, SemanticIou};
pub use grid::{semantic_of, ForegroundMask, PanopticGrid};
pub use types::{
    to_train_label, GridShape, PanopticLabel, VoxelCoord, IGNORE_LABEL, SEMANTIC_BITS,
    SEMANTIC_MASK,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::PolarCoreError;
    pub use crate::eval::{PanopticEval, PanopticQuality, SemanticIou};
    pub use crate::grid::{semantic_of, ForegroundMask, PanopticGrid};
    pub use crate::types::{to_train_label, GridShape, PanopticLabel, VoxelCoord};
}
