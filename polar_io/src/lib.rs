//! polar_io - prediction files for panoptic segmentation runs.
//!
//! Exported predictions are one file per scan holding raw little-endian
//! `u32` panoptic codes (semantic class in the low 16 bits, instance id
//! above). This crate owns that format and the directory layout it is
//! written to.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use polar_io::{prediction_path, read_labels, save_prediction};
//!
//! let scan = Path::new("/data/sequences/08/velodyne/000000.bin");
//! let written = save_prediction(Path::new("/results"), scan, &[0x0001_000A, 9]).unwrap();
//! assert_eq!(written, prediction_path(Path::new("/results"), scan).unwrap());
//! assert_eq!(read_labels(&written).unwrap().len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod labels;
pub mod paths;

pub use error::{PolarIoError, Result};
pub use labels::{
    ensure_parent_dir, read_codes, read_labels, read_labels_for, write_codes, write_labels,
    CODE_BYTES,
};
pub use paths::{prediction_path, save_prediction};

// Re-export the label type so callers can decode what they read.
pub use polar_core::PanopticLabel;
