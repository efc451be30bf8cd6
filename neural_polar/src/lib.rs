//! # neural_polar
//!
//! Training and evaluation orchestration with Burn for panoptic
//! segmentation of LiDAR point clouds on polar bird's-eye-view grids.
//!
//! The network, the loss and the panoptic decoder are pluggable through
//! traits; this crate owns everything around them: batching, the epoch
//! loop, self-adversarial pruning (SAP), distributed metric merging and
//! checkpointing.
//!
//! ## Features
//!
//! - **Training loop**: `PanopticTrainer` evaluates, checkpoints on PQ
//!   improvement and trains, one round per epoch
//! - **SAP**: two-pass steps that drop the points with the largest input
//!   gradients before the parameter update
//! - **Evaluation**: `EvaluationRound` decodes, gathers per-point labels and
//!   accumulates panoptic quality and semantic IoU
//! - **Distributed**: `Collective` merges accumulators across workers;
//!   `LocalGroup` runs workers as threads in one process
//! - **Reference model**: `PointBevNet`, a small point-to-BEV network
//!
//! ## Quick Start
//!
//! ```ignore
//! use burn::backend::{Autodiff, NdArray};
//! use burn::optim::AdamConfig;
//! use neural_polar::prelude::*;
//!
//! type MyBackend = Autodiff<NdArray>;
//!
//! let device = Default::default();
//! let config = TrainingConfig::new();
//! let net = PointBevNetConfig::new(
//!     config.n_classes - 1,
//!     config.grid.grid_size,
//!     config.grid.fea_dim(),
//! );
//! let model = PointBevNet::<MyBackend>::new(&net, &device);
//!
//! let mut trainer = PanopticTrainer::new(
//!     model,
//!     AdamConfig::new().init(),
//!     PanopticCriterion::new(config.loss.clone()),
//!     ArgmaxDecoder::new(),
//!     SingleProcess,
//!     config,
//!     device,
//! )?;
//! let summary = trainer.fit(&train_scans, &val_scans)?;
//! println!("best PQ {:.3}", summary.best_pq);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! polar_core (labels, grids, PQ/IoU accumulator)
//!     │
//!     ├──────────────────┐
//!     ▼                  ▼
//! polar_io          neural_polar
//! (label files)     (training, evaluation)
//!     │                  │
//!     └────────◄─────────┘
//!        prediction files
//! ```
//!
//! ## Feature Flags
//!
//! - `wgpu`: GPU acceleration via WebGPU

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod data;
pub mod distributed;
pub mod error;
pub mod loss;
pub mod model;
pub mod training;

// Re-export key types for convenience
pub use config::{PanopticLossConfig, SapConfig, TrainingConfig, VoxelGridConfig};
pub use error::{PolarError, Result};
pub use model::{PanopticDecoder, PanopticNetwork, PointBevNet};
pub use training::{EvaluationRound, PanopticTrainer, SapPruner};

// Re-export from polar_core for convenience
pub use polar_core::{PanopticEval, PanopticLabel, VoxelCoord};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{
        BatchFailurePolicy, PanopticLossConfig, PointBevNetConfig, PostProcessingConfig,
        SapConfig, TrainingConfig, VoxelGridConfig,
    };
    pub use crate::data::{
        collate, load_batches, DistributedShard, InMemoryScans, PanopticBatch, Scan,
        ScanDataset,
    };
    pub use crate::distributed::{Collective, LocalGroup, LocalMember, SingleProcess};
    pub use crate::error::{PolarError, Result};
    pub use crate::loss::{LossComponents, LossTracker, PanopticCriterion, PanopticLoss};
    pub use crate::model::{
        ArgmaxDecoder, DecodeParams, DecodedPanoptic, PanopticDecoder, PanopticNetwork,
        PanopticOutput, PointBevNet,
    };
    pub use crate::training::{
        export_predictions, validate_only, CheckpointMetadata, CheckpointPolicy,
        EvaluationRound, ModelSource, PanopticTrainer, RoundReport, SapPruner,
        TrainingSummary,
    };

    pub use polar_core::{PanopticEval, PanopticLabel, VoxelCoord};
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::{Autodiff, NdArray};
    use config::PointBevNetConfig;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_public_api() {
        let config = TrainingConfig::default();
        assert!(config.validate().is_ok());
        let _sap = SapConfig::default();
        let _loss = PanopticLossConfig::default();
    }

    #[test]
    fn test_model_creation() {
        let device = NdArrayDevice::Cpu;
        let config = PointBevNetConfig::new(4, [8, 8, 2], 9);
        let model = PointBevNet::<TestBackend>::new(&config, &device);
        assert_eq!(model.grid_shape().dims(), [8, 8, 2]);
    }
}
