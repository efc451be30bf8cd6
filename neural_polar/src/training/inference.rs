//! Standalone validation and prediction export.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use polar_core::ForegroundMask;

use crate::config::TrainingConfig;
use crate::data::{collate, DistributedShard, ScanDataset};
use crate::distributed::Collective;
use crate::error::{PolarError, Result};
use crate::model::{DecodeParams, PanopticDecoder, PanopticNetwork};

use super::eval::{EvaluationRound, RoundReport};

/// Run one evaluation round and log the report. Nothing is checkpointed.
pub fn validate_only<B, M, D, S, C>(
    model: &M,
    decoder: &D,
    dataset: &S,
    collective: &C,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<Option<RoundReport>>
where
    B: Backend,
    M: Module<B> + PanopticNetwork<B>,
    D: PanopticDecoder<B>,
    S: ScanDataset + ?Sized,
    C: Collective,
{
    if collective.is_coordinator() {
        log::info!("Number of parameters: {}", model.num_params());
    }
    let round = EvaluationRound::from_config(config);
    let report = round.evaluate::<B, _, _, _, _>(
        model,
        decoder,
        dataset,
        collective,
        config.val_batch_size,
        &config.grid,
        device,
    )?;
    if let Some(report) = &report {
        report.log(config);
    }
    Ok(report)
}

/// What [`export_predictions`] wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Prediction files written.
    pub written: Vec<PathBuf>,
    /// Samples whose file could not be written.
    pub failed: usize,
    /// Points labeled across all written files.
    pub points: usize,
}

/// Decode every scan of `shard` and write one prediction file per scan.
///
/// Files land under `output_root` at the path derived from each scan's
/// source path. A write failure skips that sample and is counted; every
/// other error aborts the export.
#[allow(clippy::too_many_arguments)]
pub fn export_predictions<B, M, D, S>(
    model: &M,
    decoder: &D,
    dataset: &S,
    shard: &DistributedShard,
    config: &TrainingConfig,
    output_root: &Path,
    device: &B::Device,
) -> Result<ExportSummary>
where
    B: Backend,
    M: Module<B> + PanopticNetwork<B>,
    D: PanopticDecoder<B>,
    S: ScanDataset + ?Sized,
{
    log::info!("Number of parameters: {}", model.num_params());
    let params = DecodeParams::from_config(config);
    let shape = config.grid.shape();
    let mut summary = ExportSummary::default();

    for indices in shard.batches(config.val_batch_size) {
        let scans = indices
            .iter()
            .map(|&i| dataset.get(i))
            .collect::<Result<Vec<_>>>()?;
        let batch = collate::<B>(&scans, &config.grid, device)?;
        let output = model.forward(&batch.input)?;

        for (i, points) in batch.input.points.iter().enumerate() {
            let scan_path = batch.paths[i]
                .as_ref()
                .ok_or(PolarError::MissingScanPath { index: indices[i] })?;

            let sample = output.sample(i)?;
            let mask = ForegroundMask::from_coords(shape, &points.coords)?;
            let decoded =
                decoder.decode(sample.semantic, sample.center, sample.offset, &params, &mask)?;
            let codes = decoded.grid.gather(&points.coords)?;

            match polar_io::save_prediction(output_root, scan_path, &codes) {
                Ok(path) => {
                    log::debug!("Wrote {} labels to {}", codes.len(), path.display());
                    summary.points += codes.len();
                    summary.written.push(path);
                }
                Err(e) => {
                    log::error!("Failed to write prediction for {}: {}", scan_path.display(), e);
                    summary.failed += 1;
                }
            }
        }
    }

    log::info!(
        "Wrote {} prediction files ({} failed)",
        summary.written.len(),
        summary.failed
    );
    Ok(summary)
}
