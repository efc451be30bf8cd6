//! Training and evaluation orchestration.
//!
//! This module provides:
//! - `PanopticTrainer`: the epoch loop of evaluate, checkpoint and train
//! - `SapPruner`: saliency-adaptive point pruning for the two-pass step
//! - `EvaluationRound`: inference, decoding and metric accumulation
//! - `CheckpointPolicy` and checkpoint save/load
//! - Standalone validation and prediction export

mod checkpoint;
mod eval;
mod inference;
mod sap;
mod trainer;

pub use checkpoint::{
    initialize_model, load_model, read_metadata, save_checkpoint, save_model, sidecar_path,
    CheckpointMetadata, CheckpointPolicy, ModelSource, CHECKPOINT_VERSION,
};
pub use eval::{EvaluationRound, RoundOutcome, RoundReport, RunningMean};
pub use inference::{export_predictions, validate_only, ExportSummary};
pub use sap::{gradient_magnitudes, PruningDecision, SapPruner};
pub use trainer::{PanopticTrainer, StepOutput, TrainingState, TrainingSummary};
