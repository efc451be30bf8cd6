//! Host-side scan records and datasets.

use std::path::PathBuf;

use polar_core::{VoxelCoord, IGNORE_LABEL};

use crate::config::VoxelGridConfig;
use crate::error::{PolarError, Result};

/// One voxelized LiDAR scan, ready for collation.
///
/// Dense per-grid buffers are row-major: `voxel_labels` over `(x, y, z)`,
/// `center` over `(x, y)`, `offset` and `visibility` channel-first over
/// `(c, x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    /// Flattened per-point features, `num_points × fea_dim`.
    pub features: Vec<f32>,
    /// Feature channels per point.
    pub fea_dim: usize,
    /// Voxel of every point.
    pub coords: Vec<VoxelCoord>,
    /// Per-point ground-truth semantic class (evaluation label space).
    pub point_labels: Vec<u32>,
    /// Per-point ground-truth instance id (0 = none).
    pub point_instances: Vec<u32>,
    /// Voxelized semantic labels in raw label space (0 = unlabeled).
    pub voxel_labels: Vec<u8>,
    /// Ground-truth center heatmap.
    pub center: Vec<f32>,
    /// Ground-truth offset field, two channels.
    pub offset: Vec<f32>,
    /// Optional per-cell visibility features.
    pub visibility: Option<Vec<f32>>,
    /// Source file of the scan, used to place exported predictions.
    pub path: Option<PathBuf>,
}

impl Scan {
    /// A scan with all-empty targets for the given grid.
    ///
    /// Useful for inference, where only features and coordinates matter.
    pub fn unlabeled(
        features: Vec<f32>,
        fea_dim: usize,
        coords: Vec<VoxelCoord>,
        grid: &VoxelGridConfig,
    ) -> Self {
        let [x, y, z] = grid.grid_size;
        let n = coords.len();
        Self {
            features,
            fea_dim,
            coords,
            point_labels: vec![0; n],
            point_instances: vec![0; n],
            voxel_labels: vec![0; x * y * z],
            center: vec![0.0; x * y],
            offset: vec![0.0; 2 * x * y],
            visibility: None,
            path: None,
        }
    }

    /// Attach the source path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.coords.len()
    }

    /// Number of visibility channels, if present.
    pub fn vis_channels(&self, grid: &VoxelGridConfig) -> Option<usize> {
        let area = grid.grid_size[0] * grid.grid_size[1];
        self.visibility.as_ref().map(|v| v.len() / area.max(1))
    }

    /// Check every buffer against the grid and the point count.
    pub fn validate(&self, grid: &VoxelGridConfig) -> Result<()> {
        let n = self.coords.len();
        if n == 0 {
            return Err(PolarError::InvalidData("scan has no points".into()));
        }
        if self.fea_dim == 0 || self.features.len() != n * self.fea_dim {
            return Err(PolarError::InvalidData(format!(
                "expected {} feature values ({} points × {}), got {}",
                n * self.fea_dim,
                n,
                self.fea_dim,
                self.features.len()
            )));
        }
        for (name, len) in [
            ("point_labels", self.point_labels.len()),
            ("point_instances", self.point_instances.len()),
        ] {
            if len != n {
                return Err(PolarError::InvalidData(format!(
                    "{} has {} entries for {} points",
                    name, len, n
                )));
            }
        }

        grid.shape().check_all(&self.coords)?;

        let [x, y, z] = grid.grid_size;
        for (name, len, expected) in [
            ("voxel_labels", self.voxel_labels.len(), x * y * z),
            ("center", self.center.len(), x * y),
            ("offset", self.offset.len(), 2 * x * y),
        ] {
            if len != expected {
                return Err(PolarError::InvalidData(format!(
                    "{} has {} values, grid needs {}",
                    name, len, expected
                )));
            }
        }
        if let Some(vis) = &self.visibility {
            if vis.is_empty() || vis.len() % (x * y) != 0 {
                return Err(PolarError::InvalidData(format!(
                    "visibility has {} values, not a multiple of {}",
                    vis.len(),
                    x * y
                )));
            }
        }
        Ok(())
    }

    /// Voxel labels mapped to the train label space (unlabeled becomes the ignore label).
    pub fn train_voxel_labels(&self) -> impl Iterator<Item = u8> + '_ {
        self.voxel_labels
            .iter()
            .map(|&raw| polar_core::to_train_label(raw))
    }

    /// Whether any voxel carries a trainable label.
    pub fn has_voxel_targets(&self) -> bool {
        self.train_voxel_labels().any(|l| l != IGNORE_LABEL)
    }
}

/// Random-access collection of scans.
pub trait ScanDataset {
    /// Number of scans.
    fn len(&self) -> usize;

    /// Load the scan at `index`.
    fn get(&self, index: usize) -> Result<Scan>;

    /// Whether the dataset holds no scans.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dataset backed by a vector of already-loaded scans.
#[derive(Debug, Clone, Default)]
pub struct InMemoryScans {
    scans: Vec<Scan>,
}

impl InMemoryScans {
    /// Wrap loaded scans.
    pub fn new(scans: Vec<Scan>) -> Self {
        Self { scans }
    }

    /// Append a scan.
    pub fn push(&mut self, scan: Scan) {
        self.scans.push(scan);
    }

    /// Borrow the scans.
    pub fn scans(&self) -> &[Scan] {
        &self.scans
    }
}

impl From<Vec<Scan>> for InMemoryScans {
    fn from(scans: Vec<Scan>) -> Self {
        Self::new(scans)
    }
}

impl ScanDataset for InMemoryScans {
    fn len(&self) -> usize {
        self.scans.len()
    }

    fn get(&self, index: usize) -> Result<Scan> {
        self.scans.get(index).cloned().ok_or_else(|| {
            PolarError::InvalidData(format!(
                "scan index {} out of range for {} scans",
                index,
                self.scans.len()
            ))
        })
    }
}
