//! Error types for polar_core operations.
//!
//! A plain enum with a hand-written `Display`, so the crate stays free of
//! external dependencies.

use core::fmt;

/// Errors that can occur during polar_core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarCoreError {
    /// A voxel coordinate lies outside the configured grid bounds.
    VoxelOutOfBounds {
        /// The offending coordinate.
        coord: [u32; 3],
        /// Grid extent along each axis.
        bounds: [usize; 3],
    },
    /// Parallel per-point arrays have different lengths.
    LengthMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },
    /// A class id is not representable by the accumulator.
    ClassOutOfRange {
        /// The class id encountered.
        class: u32,
        /// Number of classes in the accumulator.
        n_classes: usize,
    },
    /// Two accumulators with different class counts cannot be merged.
    ClassCountMismatch {
        /// Class count of the receiving accumulator.
        expected: usize,
        /// Class count of the other accumulator.
        got: usize,
    },
    /// A dense buffer does not match the grid volume.
    VolumeMismatch {
        /// Expected number of voxels.
        expected: usize,
        /// Number of values provided.
        got: usize,
    },
}

impl fmt::Display for PolarCoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolarCoreError::VoxelOutOfBounds { coord, bounds } => write!(
                f,
                "voxel ({}, {}, {}) is outside grid {}x{}x{}",
                coord[0], coord[1], coord[2], bounds[0], bounds[1], bounds[2]
            ),
            PolarCoreError::LengthMismatch { expected, got } => {
                write!(f, "length mismatch: expected {}, got {}", expected, got)
            }
            PolarCoreError::ClassOutOfRange { class, n_classes } => {
                write!(f, "class id {} out of range for {} classes", class, n_classes)
            }
            PolarCoreError::ClassCountMismatch { expected, got } => write!(
                f,
                "cannot merge accumulators: expected {} classes, got {}",
                expected, got
            ),
            PolarCoreError::VolumeMismatch { expected, got } => {
                write!(f, "grid volume mismatch: expected {} voxels, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for PolarCoreError {}

/// Result type alias for polar_core operations.
pub type Result<T> = core::result::Result<T, PolarCoreError>;
