//! Best-model checkpointing.
//!
//! The parameter blob is written with Burn's binary recorder to a sibling
//! temporary file and renamed into place, so the configured path always
//! holds either the previous or the new state. A JSON sidecar next to it
//! records which epoch and score the state belongs to; it is staged and
//! committed together with the blob.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use serde::{Deserialize, Serialize};

use crate::error::{PolarError, Result};

/// Version written into new sidecars.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Keeps the best PQ seen so far and saves only on strict improvement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointPolicy {
    best_pq: f64,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckpointPolicy {
    /// A policy that has seen nothing; the first finite score always saves.
    pub fn new() -> Self {
        Self {
            best_pq: f64::NEG_INFINITY,
        }
    }

    /// Best PQ so far.
    pub fn best_pq(&self) -> f64 {
        self.best_pq
    }

    /// Offer a new score.
    ///
    /// When `pq` beats the best so far, `save` runs and the best is updated
    /// only if it succeeds. Returns whether a checkpoint was written.
    pub fn observe<F>(&mut self, pq: f64, save: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        if !(pq > self.best_pq) {
            return Ok(false);
        }
        save()?;
        self.best_pq = pq;
        Ok(true)
    }
}

/// Sidecar stored next to a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Epoch whose evaluation produced the checkpoint.
    pub epoch: usize,
    /// PQ of that evaluation.
    pub pq: f64,
    /// Mean IoU of that evaluation.
    pub miou: f64,
    /// Format version.
    pub version: u32,
}

impl CheckpointMetadata {
    /// Metadata for a checkpoint taken after `epoch`'s evaluation.
    pub fn new(epoch: usize, pq: f64, miou: f64) -> Self {
        Self {
            epoch,
            pq,
            miou,
            version: CHECKPOINT_VERSION,
        }
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Where a model's parameters came from at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    /// Resumed from the training checkpoint.
    Checkpoint,
    /// Loaded from pretrained weights.
    Pretrained,
    /// Freshly initialized.
    Random,
}

/// Path of the JSON sidecar for a checkpoint.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn recorder() -> BinBytesRecorder<FullPrecisionSettings> {
    BinBytesRecorder::<FullPrecisionSettings>::default()
}

fn encode_model<B, M>(model: &M) -> Result<Vec<u8>>
where
    B: Backend,
    M: Module<B>,
{
    Recorder::<B>::record(&recorder(), model.clone().into_record(), ()).map_err(|e| {
        PolarError::Checkpoint {
            message: format!("{:?}", e),
        }
    })
}

/// Write the full parameter state of `model` to `path`.
pub fn save_model<B, M>(model: &M, path: &Path) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let bytes = encode_model::<B, M>(model)?;
    polar_io::ensure_parent_dir(path)?;
    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Load parameters stored at `path` into `model`.
pub fn load_model<B, M>(model: M, path: &Path, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let bytes = fs::read(path)?;
    let record = Recorder::<B>::load::<M::Record>(&recorder(), bytes, device).map_err(|e| {
        PolarError::Checkpoint {
            message: format!("{}: {:?}", path.display(), e),
        }
    })?;
    Ok(model.load_record(record))
}

/// Save the model together with its sidecar.
///
/// Both files are staged next to their targets. The sidecar is moved into
/// place first; if the blob cannot follow, the previous sidecar is restored.
/// On error the checkpoint and its sidecar keep their previous contents.
pub fn save_checkpoint<B, M>(model: &M, path: &Path, metadata: &CheckpointMetadata) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let bytes = encode_model::<B, M>(model)?;
    let json = metadata.to_json()?;
    polar_io::ensure_parent_dir(path)?;

    let sidecar = sidecar_path(path);
    let staged = [temp_path(path), temp_path(&sidecar)];
    if let Err(e) = commit_checkpoint(path, &bytes, &sidecar, &json) {
        for tmp in &staged {
            let _ = fs::remove_file(tmp);
        }
        return Err(e);
    }

    log::info!(
        "Saved checkpoint to {} (epoch {}, PQ {:.3})",
        path.display(),
        metadata.epoch,
        metadata.pq * 100.0
    );
    Ok(())
}

fn commit_checkpoint(path: &Path, bytes: &[u8], sidecar: &Path, json: &str) -> Result<()> {
    let blob_tmp = temp_path(path);
    let sidecar_tmp = temp_path(sidecar);
    fs::write(&blob_tmp, bytes)?;
    fs::write(&sidecar_tmp, json)?;

    let previous = match fs::read(sidecar) {
        Ok(old) => Some(old),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    fs::rename(&sidecar_tmp, sidecar)?;
    if let Err(e) = fs::rename(&blob_tmp, path) {
        let restored = match previous {
            Some(old) => fs::write(sidecar, old),
            None => fs::remove_file(sidecar),
        };
        if let Err(restore) = restored {
            log::warn!("Could not restore {}: {}", sidecar.display(), restore);
        }
        return Err(e.into());
    }
    Ok(())
}

/// Read the sidecar of a checkpoint, if one exists.
pub fn read_metadata(path: &Path) -> Result<Option<CheckpointMetadata>> {
    let sidecar = sidecar_path(path);
    if !sidecar.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(sidecar)?;
    CheckpointMetadata::from_json(&json).map(Some)
}

/// Load start-up parameters: the checkpoint if present, else pretrained
/// weights if present, else keep the freshly initialized model.
///
/// A missing file is not an error. A file that exists but cannot be decoded is.
pub fn initialize_model<B, M>(
    model: M,
    checkpoint: &Path,
    pretrained: Option<&Path>,
    device: &B::Device,
) -> Result<(M, ModelSource)>
where
    B: Backend,
    M: Module<B>,
{
    if checkpoint.exists() {
        let model = load_model::<B, M>(model, checkpoint, device)?;
        match read_metadata(checkpoint) {
            Ok(Some(meta)) => log::info!(
                "Resumed from {} (epoch {}, PQ {:.3})",
                checkpoint.display(),
                meta.epoch,
                meta.pq * 100.0
            ),
            Ok(None) => log::info!("Resumed from {}", checkpoint.display()),
            Err(e) => log::warn!("Ignoring unreadable checkpoint metadata: {}", e),
        }
        return Ok((model, ModelSource::Checkpoint));
    }

    if let Some(pretrained) = pretrained.filter(|p| p.exists()) {
        let model = load_model::<B, M>(model, pretrained, device)?;
        log::info!("Loaded pretrained weights from {}", pretrained.display());
        return Ok((model, ModelSource::Pretrained));
    }

    log::warn!(
        "No checkpoint at {} and no pretrained weights; starting from random initialization",
        checkpoint.display()
    );
    Ok((model, ModelSource::Random))
}
