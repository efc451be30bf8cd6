//! Epoch loop: evaluate, checkpoint, train.

use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::config::{BatchFailurePolicy, TrainingConfig};
use crate::data::{collate, DistributedShard, PanopticBatch, PointSet, ScanDataset};
use crate::distributed::Collective;
use crate::error::{PolarError, Result};
use crate::loss::{LossComponents, PanopticLoss};
use crate::model::{PanopticDecoder, PanopticNetwork};

use super::checkpoint::{
    initialize_model, save_checkpoint, CheckpointMetadata, CheckpointPolicy, ModelSource,
};
use super::eval::{EvaluationRound, RoundReport};
use super::sap::{gradient_magnitudes, SapPruner};

/// Mutable progress of a training run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainingState {
    /// Current epoch, zero-based.
    pub epoch: usize,
    /// Whether at least one optimizer step has completed.
    pub started: bool,
    /// Failed batches since the last evaluation round.
    pub exceptions: usize,
    /// Completed optimizer steps over the whole run.
    pub global_iter: usize,
}

/// Result of one optimizer step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutput {
    /// Loss terms of the step that updated the parameters.
    pub components: LossComponents,
    /// Points removed by SAP across the batch; zero for a plain step.
    pub pruned: usize,
}

/// What [`PanopticTrainer::fit`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    /// Epochs trained.
    pub epochs_run: usize,
    /// Best validation PQ seen by the checkpoint policy.
    pub best_pq: f64,
    /// Completed optimizer steps.
    pub global_iter: usize,
    /// Epochs at which a checkpoint was written.
    pub saves: Vec<usize>,
    /// Where the initial parameters came from.
    pub source: ModelSource,
}

/// Drives training of a panoptic network.
///
/// Each epoch first evaluates the current parameters on the validation
/// shard, lets the coordinator checkpoint on improvement, then trains one
/// pass over the training shard. When SAP is active for the epoch, every
/// batch is stepped twice: a first pass only to read input gradients and
/// prune the most sensitive points, a second on the pruned points to
/// update the parameters.
pub struct PanopticTrainer<B, M, O, L, D, C>
where
    B: AutodiffBackend,
{
    model: M,
    optimizer: O,
    loss: L,
    decoder: D,
    collective: C,
    config: TrainingConfig,
    pruner: Option<SapPruner>,
    round: EvaluationRound,
    policy: CheckpointPolicy,
    state: TrainingState,
    checkpoint_path: PathBuf,
    saves: Vec<usize>,
    device: B::Device,
}

impl<B, M, O, L, D, C> PanopticTrainer<B, M, O, L, D, C>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + PanopticNetwork<B>,
    M::InnerModule: PanopticNetwork<B::InnerBackend>,
    O: Optimizer<M, B>,
    L: PanopticLoss<B>,
    D: PanopticDecoder<B::InnerBackend>,
    C: Collective,
{
    /// Create a trainer. The configuration is validated here.
    pub fn new(
        model: M,
        optimizer: O,
        loss: L,
        decoder: D,
        collective: C,
        config: TrainingConfig,
        device: B::Device,
    ) -> Result<Self> {
        config.validate().map_err(PolarError::invalid_config)?;
        let pruner = if config.sap.enabled {
            Some(SapPruner::new(config.sap.rate)?)
        } else {
            None
        };
        let round = EvaluationRound::from_config(&config);
        let checkpoint_path = PathBuf::from(&config.model_save_path);

        Ok(Self {
            model,
            optimizer,
            loss,
            decoder,
            collective,
            config,
            pruner,
            round,
            policy: CheckpointPolicy::new(),
            state: TrainingState::default(),
            checkpoint_path,
            saves: Vec::new(),
            device,
        })
    }

    /// Current model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The loss and its running statistics.
    pub fn loss(&self) -> &L {
        &self.loss
    }

    /// Training configuration.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Progress counters.
    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    /// Checkpoint policy.
    pub fn policy(&self) -> &CheckpointPolicy {
        &self.policy
    }

    /// Where checkpoints are written.
    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Load start-up parameters: checkpoint, then pretrained weights, then
    /// keep the random initialization.
    pub fn initialize(&mut self) -> Result<ModelSource> {
        let pretrained = self.config.pretrained_model.as_ref().map(PathBuf::from);
        let (model, source) = initialize_model::<B, M>(
            self.model.clone(),
            &self.checkpoint_path,
            pretrained.as_deref(),
            &self.device,
        )?;
        self.model = model;
        Ok(source)
    }

    /// Run the whole schedule: `max_epoch` rounds of evaluate, checkpoint, train.
    pub fn fit<T, V>(&mut self, train: &T, val: &V) -> Result<TrainingSummary>
    where
        T: ScanDataset + ?Sized,
        V: ScanDataset + ?Sized,
    {
        let source = self.initialize()?;
        if self.collective.is_coordinator() {
            log::info!(
                "Training {} parameters for {} epochs on {} workers",
                self.model.num_params(),
                self.config.max_epoch,
                self.collective.world_size()
            );
        }

        while self.state.epoch < self.config.max_epoch {
            self.evaluate_and_checkpoint(val)?;
            self.train_epoch(train)?;
            self.state.epoch += 1;
        }

        Ok(TrainingSummary {
            epochs_run: self.state.epoch,
            best_pq: self.policy.best_pq(),
            global_iter: self.state.global_iter,
            saves: self.saves.clone(),
            source,
        })
    }

    /// Evaluate the current parameters on this worker's validation shard.
    ///
    /// Every worker must call this together. The report is returned on the
    /// coordinator only.
    pub fn evaluate<V>(&self, val: &V) -> Result<Option<RoundReport>>
    where
        V: ScanDataset + ?Sized,
    {
        let model = self.model.valid();
        self.round.evaluate::<B::InnerBackend, _, _, _, _>(
            &model,
            &self.decoder,
            val,
            &self.collective,
            self.config.val_batch_size,
            &self.config.grid,
            &self.device,
        )
    }

    /// One evaluation round plus the coordinator's report and checkpoint.
    ///
    /// Returns whether a checkpoint was written.
    pub fn evaluate_and_checkpoint<V>(&mut self, val: &V) -> Result<bool>
    where
        V: ScanDataset + ?Sized,
    {
        if self.collective.is_coordinator() {
            log::info!("{}", "*".repeat(80));
            log::info!("Epoch {}: evaluating on validation split", self.state.epoch);
        }

        let mut saved = false;
        if let Some(report) = self.evaluate(val)? {
            let epoch = self.state.epoch;
            let metadata = CheckpointMetadata::new(epoch, report.pq(), report.miou());
            let model = &self.model;
            let path = &self.checkpoint_path;
            saved = self.policy.observe(report.pq(), || {
                save_checkpoint::<B, M>(model, path, &metadata)
            })?;
            if saved {
                self.saves.push(epoch);
            }

            report.log(&self.config);
            log::info!(
                "Current val PQ is {:.3} while the best val PQ is {:.3}",
                report.pq() * 100.0,
                self.policy.best_pq() * 100.0
            );
            if self.state.started {
                self.loss.components().log(&format!(
                    "epoch {} iter {:5}",
                    epoch, self.state.global_iter
                ));
            }
            log::info!(
                "{} exceptions encountered during last training",
                self.state.exceptions
            );
        }

        self.state.exceptions = 0;
        self.loss.reset();
        Ok(saved)
    }

    /// One pass over this worker's training shard.
    pub fn train_epoch<T>(&mut self, train: &T) -> Result<()>
    where
        T: ScanDataset + ?Sized,
    {
        let shard = DistributedShard::new(
            train.len(),
            self.collective.rank(),
            self.collective.world_size(),
        )?;
        let sap = self.config.sap.active_at(self.state.epoch);
        if sap && self.collective.is_coordinator() {
            log::info!("SAP active at epoch {}", self.state.epoch);
        }

        for indices in shard.batches(self.config.train_batch_size) {
            match self.train_indices(train, &indices, sap) {
                Ok(step) => {
                    self.state.started = true;
                    self.state.global_iter += 1;
                    log::trace!(
                        "iter {}: loss {:.5}, pruned {}",
                        self.state.global_iter,
                        step.components.total(),
                        step.pruned
                    );
                }
                Err(err) => match self.config.failure_policy {
                    BatchFailurePolicy::Abort => return Err(err),
                    BatchFailurePolicy::Skip => {
                        if self.state.exceptions == 0 {
                            log::warn!("Skipping failed batch {:?}: {}", indices, err);
                        }
                        self.state.exceptions += 1;
                    }
                },
            }
        }
        Ok(())
    }

    fn train_indices<T>(&mut self, train: &T, indices: &[usize], sap: bool) -> Result<StepOutput>
    where
        T: ScanDataset + ?Sized,
    {
        let scans = indices
            .iter()
            .map(|&i| train.get(i))
            .collect::<Result<Vec<_>>>()?;
        let batch = collate::<B>(&scans, &self.config.grid, &self.device)?;

        match self.pruner {
            Some(pruner) if sap => self.sap_step(&batch, &pruner),
            _ => self.plain_step(&batch),
        }
    }

    /// Forward, loss, backward and one optimizer update.
    pub fn plain_step(&mut self, batch: &PanopticBatch<B>) -> Result<StepOutput> {
        let output = self.model.forward(&batch.input)?;
        let loss = self.loss.compute(&output, &batch.targets)?;
        self.apply(loss.total);
        self.loss.record(&loss.components);

        Ok(StepOutput {
            components: loss.components,
            pruned: 0,
        })
    }

    /// Two-pass step: prune by input-gradient magnitude, then update on the
    /// pruned points.
    ///
    /// The first pass never touches the parameters or the loss statistics.
    pub fn sap_step(
        &mut self,
        batch: &PanopticBatch<B>,
        pruner: &SapPruner,
    ) -> Result<StepOutput> {
        let tracked: Vec<PointSet<B>> =
            batch.input.points.iter().map(PointSet::tracked).collect();
        let probe = self.model.forward(&batch.input.with_points(tracked.clone()))?;
        let probe_loss = self.loss.compute(&probe, &batch.targets)?;
        let grads = probe_loss.total.backward();

        let mut pruned = Vec::with_capacity(tracked.len());
        let mut removed = 0;
        for (sample, (original, leaf)) in batch.input.points.iter().zip(&tracked).enumerate() {
            let grad = leaf
                .features
                .grad(&grads)
                .ok_or(PolarError::MissingGradient { sample })?;
            let decision = pruner.decide(&gradient_magnitudes(grad)?);
            removed += decision.removed();
            pruned.push(decision.apply(original)?);
        }
        drop(grads);

        let output = self.model.forward(&batch.input.with_points(pruned))?;
        let loss = self.loss.compute(&output, &batch.targets)?;
        self.apply(loss.total);
        self.loss.record(&loss.components);

        Ok(StepOutput {
            components: loss.components,
            pruned: removed,
        })
    }

    fn apply(&mut self, total: Tensor<B, 1>) {
        let grads = total.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self
            .optimizer
            .step(self.config.learning_rate, self.model.clone(), grads);
    }
}
