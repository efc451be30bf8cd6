//! Device-side batches and collation.

use std::path::PathBuf;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use polar_core::VoxelCoord;

use crate::config::VoxelGridConfig;
use crate::error::{PolarError, Result};

use super::scan::Scan;

/// Point features of one sample together with their voxel coordinates.
#[derive(Debug, Clone)]
pub struct PointSet<B: Backend> {
    /// Point features: [num_points, fea_dim]
    pub features: Tensor<B, 2>,
    /// Voxel of every point, parallel to the feature rows.
    pub coords: Vec<VoxelCoord>,
}

impl<B: Backend> PointSet<B> {
    /// Pair features with coordinates, checking the row count.
    pub fn new(features: Tensor<B, 2>, coords: Vec<VoxelCoord>) -> Result<Self> {
        let [rows, _] = features.dims();
        if rows != coords.len() {
            return Err(PolarError::ShapeMismatch {
                expected: vec![coords.len()],
                got: vec![rows],
            });
        }
        Ok(Self { features, coords })
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether the set holds no points.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Feature channels per point.
    pub fn fea_dim(&self) -> usize {
        self.features.dims()[1]
    }
}

impl<B: AutodiffBackend> PointSet<B> {
    /// Copy whose features are a fresh gradient-tracked leaf.
    pub fn tracked(&self) -> Self {
        Self {
            features: self.features.clone().detach().require_grad(),
            coords: self.coords.clone(),
        }
    }
}

/// Everything the network consumes.
#[derive(Debug, Clone)]
pub struct NetworkInput<B: Backend> {
    /// Per-sample point sets.
    pub points: Vec<PointSet<B>>,
    /// Optional visibility features: [batch, vis_channels, X, Y]
    pub visibility: Option<Tensor<B, 4>>,
}

impl<B: Backend> NetworkInput<B> {
    /// Number of samples.
    pub fn batch_size(&self) -> usize {
        self.points.len()
    }

    /// Same visibility, different point sets.
    pub fn with_points(&self, points: Vec<PointSet<B>>) -> Self {
        Self {
            points,
            visibility: self.visibility.clone(),
        }
    }
}

/// Voxel-level training targets.
#[derive(Debug, Clone)]
pub struct PanopticTargets<B: Backend> {
    /// Semantic labels in train space: [batch, X, Y, Z]
    pub voxel_labels: Tensor<B, 4, Int>,
    /// Center heatmap: [batch, 1, X, Y]
    pub center: Tensor<B, 4>,
    /// Offset field: [batch, 2, X, Y]
    pub offset: Tensor<B, 4>,
}

/// One collated batch of scans.
#[derive(Debug, Clone)]
pub struct PanopticBatch<B: Backend> {
    /// Network input.
    pub input: NetworkInput<B>,
    /// Voxel-level targets.
    pub targets: PanopticTargets<B>,
    /// Per-point ground-truth semantic labels, per sample.
    pub point_labels: Vec<Vec<u32>>,
    /// Per-point ground-truth instance ids, per sample.
    pub point_instances: Vec<Vec<u32>>,
    /// Source path of each sample, if known.
    pub paths: Vec<Option<PathBuf>>,
}

impl<B: Backend> PanopticBatch<B> {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.input.points.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.input.points.is_empty()
    }

    /// Total number of points across samples.
    pub fn num_points(&self) -> usize {
        self.input.points.iter().map(PointSet::len).sum()
    }
}

/// Collate host scans into a device batch.
///
/// Every scan is validated against the grid first, so coordinates handed to
/// the network are always in bounds. Voxel labels are shifted into the
/// train label space.
pub fn collate<B: Backend>(
    scans: &[Scan],
    grid: &VoxelGridConfig,
    device: &B::Device,
) -> Result<PanopticBatch<B>> {
    if scans.is_empty() {
        return Err(PolarError::InvalidData("cannot collate an empty batch".into()));
    }
    for scan in scans {
        scan.validate(grid)?;
    }

    let batch = scans.len();
    let [x, y, z] = grid.grid_size;

    let vis_channels: Vec<Option<usize>> = scans.iter().map(|s| s.vis_channels(grid)).collect();
    let visibility = match vis_channels[0] {
        Some(v) if vis_channels.iter().all(|&c| c == Some(v)) => {
            let data: Vec<f32> = scans
                .iter()
                .flat_map(|s| s.visibility.iter().flatten().copied())
                .collect();
            Some(Tensor::from_data(
                TensorData::new(data, [batch, v, x, y]),
                device,
            ))
        }
        None if vis_channels.iter().all(Option::is_none) => None,
        _ => {
            return Err(PolarError::InvalidData(
                "visibility must be present with the same channel count on every scan".into(),
            ))
        }
    };

    let points = scans
        .iter()
        .map(|s| {
            let features = Tensor::from_data(
                TensorData::new(s.features.clone(), [s.num_points(), s.fea_dim]),
                device,
            );
            PointSet::new(features, s.coords.clone())
        })
        .collect::<Result<Vec<_>>>()?;

    let labels: Vec<i64> = scans
        .iter()
        .flat_map(|s| s.train_voxel_labels().map(i64::from))
        .collect();
    let center: Vec<f32> = scans.iter().flat_map(|s| s.center.iter().copied()).collect();
    let offset: Vec<f32> = scans.iter().flat_map(|s| s.offset.iter().copied()).collect();

    let targets = PanopticTargets {
        voxel_labels: Tensor::from_data(TensorData::new(labels, [batch, x, y, z]), device),
        center: Tensor::from_data(TensorData::new(center, [batch, 1, x, y]), device),
        offset: Tensor::from_data(TensorData::new(offset, [batch, 2, x, y]), device),
    };

    Ok(PanopticBatch {
        input: NetworkInput { points, visibility },
        targets,
        point_labels: scans.iter().map(|s| s.point_labels.clone()).collect(),
        point_instances: scans.iter().map(|s| s.point_instances.clone()).collect(),
        paths: scans.iter().map(|s| s.path.clone()).collect(),
    })
}

/// Read a float tensor back to the host.
pub(crate) fn float_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PolarError::Tensor {
            message: format!("{:?}", e),
        })
}

/// Read an integer tensor back to the host.
pub(crate) fn int_values<B: Backend, const D: usize>(
    tensor: Tensor<B, D, Int>,
) -> Result<Vec<i64>> {
    tensor
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| PolarError::Tensor {
            message: format!("{:?}", e),
        })
}
