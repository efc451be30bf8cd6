//! One evaluation pass over the validation shard.

use std::time::Duration;

use burn::prelude::*;
use instant::Instant;
use polar_core::{semantic_of, ForegroundMask, PanopticEval, PanopticQuality, SemanticIou};

use crate::config::{TrainingConfig, VoxelGridConfig};
use crate::data::{load_batches, DistributedShard, PanopticBatch, ScanDataset};
use crate::distributed::Collective;
use crate::error::{PolarError, Result};
use crate::model::{DecodeParams, PanopticDecoder, PanopticNetwork};

/// Mean of a series of durations, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    total: f64,
    count: usize,
}

impl RunningMean {
    /// Add one sample.
    pub fn push(&mut self, elapsed: Duration) {
        self.total += elapsed.as_secs_f64();
        self.count += 1;
    }

    /// Number of samples.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean in seconds; zero when empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// What one worker accumulated during a round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    /// Local confusion accumulator.
    pub eval: PanopticEval,
    /// Network time per batch.
    pub inference: RunningMean,
    /// Decoder time per scan.
    pub post_processing: RunningMean,
    /// Batches processed.
    pub batches: usize,
}

/// Metrics of a round after merging every worker.
#[derive(Debug, Clone)]
pub struct RoundReport {
    /// Panoptic quality.
    pub quality: PanopticQuality,
    /// Semantic IoU.
    pub iou: SemanticIou,
    /// Mean network time per batch on the reporting worker.
    pub inference_secs: f64,
    /// Mean decoder time per scan on the reporting worker.
    pub post_processing_secs: f64,
}

impl RoundReport {
    /// Overall PQ.
    pub fn pq(&self) -> f64 {
        self.quality.pq
    }

    /// Mean IoU.
    pub fn miou(&self) -> f64 {
        self.iou.miou
    }

    /// Log the per-class table and the summary lines.
    pub fn log(&self, config: &TrainingConfig) {
        log::info!("Validation per class PQ, SQ, RQ and IoU:");
        let q = &self.quality;
        for class in 1..q.class_pq.len() {
            if config.ignore_classes.contains(&(class as u32)) {
                continue;
            }
            log::info!(
                "{:>15} : {:6.2}%  {:6.2}%  {:6.2}%  {:6.2}%",
                config.class_name(class),
                q.class_pq[class] * 100.0,
                q.class_sq[class] * 100.0,
                q.class_rq[class] * 100.0,
                self.iou.class_iou.get(class).copied().unwrap_or(0.0) * 100.0,
            );
        }
        log::info!("Current val PQ is {:.3}", self.pq() * 100.0);
        log::info!("Current val miou is {:.3}", self.miou() * 100.0);
        log::info!(
            "Inference time per {} is {:.4} seconds, postprocessing time is {:.4} seconds per scan",
            config.val_batch_size,
            self.inference_secs,
            self.post_processing_secs,
        );
    }
}

/// Runs the model over validation batches and fills a confusion accumulator.
///
/// The caller provides a model on a non-differentiable backend, so no
/// gradients are recorded.
#[derive(Debug, Clone)]
pub struct EvaluationRound {
    params: DecodeParams,
    n_classes: usize,
    ignore: Vec<u32>,
    min_points: u64,
}

impl EvaluationRound {
    /// Create a round with explicit accumulator settings.
    pub fn new(params: DecodeParams, n_classes: usize, ignore: &[u32], min_points: u64) -> Self {
        Self {
            params,
            n_classes,
            ignore: ignore.to_vec(),
            min_points,
        }
    }

    /// Create a round from a training configuration.
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(
            DecodeParams::from_config(config),
            config.n_classes,
            &config.ignore_classes,
            config.min_points,
        )
    }

    /// Decoder settings.
    pub fn params(&self) -> &DecodeParams {
        &self.params
    }

    /// A fresh, empty accumulator.
    pub fn accumulator(&self) -> PanopticEval {
        PanopticEval::new(self.n_classes, &self.ignore, self.min_points)
    }

    /// Evaluate every batch. Fails on the first error.
    pub fn run<B, M, D, I>(&self, model: &M, decoder: &D, batches: I) -> Result<RoundOutcome>
    where
        B: Backend,
        M: PanopticNetwork<B>,
        D: PanopticDecoder<B>,
        I: IntoIterator<Item = Result<PanopticBatch<B>>>,
    {
        let mut outcome = RoundOutcome {
            eval: self.accumulator(),
            inference: RunningMean::default(),
            post_processing: RunningMean::default(),
            batches: 0,
        };
        for batch in batches {
            self.run_batch(model, decoder, &batch?, &mut outcome)?;
        }
        Ok(outcome)
    }

    /// Evaluate one batch into `outcome`.
    pub fn run_batch<B, M, D>(
        &self,
        model: &M,
        decoder: &D,
        batch: &PanopticBatch<B>,
        outcome: &mut RoundOutcome,
    ) -> Result<()>
    where
        B: Backend,
        M: PanopticNetwork<B>,
        D: PanopticDecoder<B>,
    {
        let start = Instant::now();
        let output = model.forward(&batch.input)?;
        outcome.inference.push(start.elapsed());

        for (i, points) in batch.input.points.iter().enumerate() {
            let sample = output.sample(i)?;
            let [_, x, y, z] = sample.semantic.dims();
            let mask = ForegroundMask::from_coords(
                polar_core::GridShape::new([x, y, z]),
                &points.coords,
            )?;

            let start = Instant::now();
            let decoded = decoder.decode(
                sample.semantic,
                sample.center,
                sample.offset,
                &self.params,
                &mask,
            )?;
            outcome.post_processing.push(start.elapsed());

            if decoded.grid.shape() != mask.shape() {
                return Err(PolarError::ShapeMismatch {
                    expected: mask.shape().dims().to_vec(),
                    got: decoded.grid.shape().dims().to_vec(),
                });
            }

            let codes = decoded.grid.gather(&points.coords)?;
            let sem = semantic_of(&codes);
            outcome.eval.add_batch(
                &sem,
                &codes,
                &batch.point_labels[i],
                &batch.point_instances[i],
            )?;
        }
        outcome.batches += 1;
        Ok(())
    }

    /// Evaluate this worker's shard of `dataset` and combine across workers.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate<B, M, D, S, C>(
        &self,
        model: &M,
        decoder: &D,
        dataset: &S,
        collective: &C,
        batch_size: usize,
        grid: &VoxelGridConfig,
        device: &B::Device,
    ) -> Result<Option<RoundReport>>
    where
        B: Backend,
        M: PanopticNetwork<B>,
        D: PanopticDecoder<B>,
        S: ScanDataset + ?Sized,
        C: Collective,
    {
        let shard =
            DistributedShard::new(dataset.len(), collective.rank(), collective.world_size())?;
        let batches = load_batches::<B, S>(dataset, &shard, batch_size, grid, device);
        let outcome = self.run(model, decoder, batches)?;
        log::debug!(
            "rank {} evaluated {} batches",
            collective.rank(),
            outcome.batches
        );
        Self::finish(outcome, collective)
    }

    /// Merge every worker's accumulator, then wait for all of them.
    ///
    /// Returns the report on the coordinator and `None` elsewhere.
    pub fn finish<C: Collective>(
        outcome: RoundOutcome,
        collective: &C,
    ) -> Result<Option<RoundReport>> {
        let merged = collective.all_merge(outcome.eval)?;
        collective.barrier()?;

        if !collective.is_coordinator() {
            return Ok(None);
        }
        Ok(Some(RoundReport {
            quality: merged.get_pq(),
            iou: merged.get_sem_iou(),
            inference_secs: outcome.inference.mean(),
            post_processing_secs: outcome.post_processing.mean(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_mean() {
        let mut mean = RunningMean::default();
        assert_eq!(mean.mean(), 0.0);
        mean.push(Duration::from_millis(100));
        mean.push(Duration::from_millis(300));
        assert_eq!(mean.count(), 2);
        assert!((mean.mean() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_accumulator_settings() {
        let config = TrainingConfig::new().with_min_points(7);
        let round = EvaluationRound::from_config(&config);
        let eval = round.accumulator();
        assert_eq!(eval.n_classes(), 20);
        assert_eq!(eval.min_points(), 7);
        assert!(eval.is_empty());
    }
}
