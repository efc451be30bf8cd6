//! Shared fixtures: small grids, synthetic scans and an oracle network.

#![allow(dead_code)]

use burn::prelude::*;

use neural_polar::config::{PointBevNetConfig, TrainingConfig, VoxelGridConfig};
use neural_polar::data::{InMemoryScans, NetworkInput, Scan};
use neural_polar::model::{PanopticNetwork, PanopticOutput};
use neural_polar::VoxelCoord;

pub const GRID: [usize; 3] = [8, 8, 2];
/// Evaluation classes, including the ignored class 0.
pub const N_CLASSES: usize = 4;

pub fn grid() -> VoxelGridConfig {
    VoxelGridConfig::new().with_grid_size(GRID)
}

/// Evaluation class that carries instances.
pub const THING_CLASS: u32 = 1;

/// A small configuration with one thing class.
pub fn config(checkpoint: &std::path::Path) -> TrainingConfig {
    TrainingConfig::new()
        .with_grid(grid())
        .with_n_classes(N_CLASSES)
        .with_thing_classes(vec![THING_CLASS])
        .with_class_names(vec!["car".into(), "road".into(), "building".into()])
        .with_min_points(1)
        .with_max_epoch(2)
        .with_train_batch_size(2)
        .with_val_batch_size(2)
        .with_model_save_path(checkpoint.to_string_lossy().into_owned())
}

pub fn network_config() -> PointBevNetConfig {
    PointBevNetConfig::new(N_CLASSES - 1, GRID, grid().fea_dim())
        .with_hidden_dims(vec![16])
        .with_cell_dim(8)
}

/// Evaluation class of a voxel: constant along z, cycling with x.
pub fn voxel_class(x: u32) -> u32 {
    1 + (x / 3) % 3
}

/// Synthetic labeled scan. Every point's first feature is its train class,
/// and the thing-class points form a single instance.
pub fn scan(seed: u32, num_points: usize) -> Scan {
    let g = grid();
    let [gx, gy, gz] = GRID;
    let fea_dim = g.fea_dim();

    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(12_345);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };

    let mut coords = Vec::with_capacity(num_points);
    let mut features = Vec::with_capacity(num_points * fea_dim);
    let mut point_labels = Vec::with_capacity(num_points);
    let mut point_instances = Vec::with_capacity(num_points);
    for _ in 0..num_points {
        let coord = VoxelCoord::new(
            next() % gx as u32,
            next() % gy as u32,
            next() % gz as u32,
        );
        let class = voxel_class(coord.x);
        features.push((class - 1) as f32);
        for c in 1..fea_dim {
            features.push(((next() % 1000) as f32 / 1000.0) * c as f32);
        }
        coords.push(coord);
        point_labels.push(class);
        point_instances.push(if class == THING_CLASS { seed + 1 } else { 0 });
    }

    let mut voxel_labels = vec![0u8; gx * gy * gz];
    for coord in &coords {
        let idx = (coord.x as usize * gy + coord.y as usize) * gz + coord.z as usize;
        voxel_labels[idx] = voxel_class(coord.x) as u8;
    }

    let mut scan = Scan::unlabeled(features, fea_dim, coords, &g);
    scan.point_labels = point_labels;
    scan.point_instances = point_instances;
    scan.voxel_labels = voxel_labels;
    scan
}

pub fn dataset(count: u32, num_points: usize) -> InMemoryScans {
    (0..count).map(|i| scan(i + 1, num_points)).collect::<Vec<_>>().into()
}

/// Network that reads the class out of the first feature and predicts it perfectly.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleNet;

impl<B: Backend> PanopticNetwork<B> for OracleNet {
    fn forward(&self, input: &NetworkInput<B>) -> neural_polar::Result<PanopticOutput<B>> {
        let [gx, gy, gz] = GRID;
        let classes = N_CLASSES - 1;
        let batch = input.batch_size();
        let device = input.points[0].features.device();

        let mut logits = vec![0.0f32; batch * classes * gx * gy * gz];
        for (b, points) in input.points.iter().enumerate() {
            let features = points
                .features
                .clone()
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .unwrap();
            let fea_dim = points.fea_dim();
            for (i, coord) in points.coords.iter().enumerate() {
                let class = features[i * fea_dim] as usize;
                let (x, y, z) = (coord.x as usize, coord.y as usize, coord.z as usize);
                logits[(((b * classes + class) * gx + x) * gy + y) * gz + z] = 10.0;
            }
        }

        Ok(PanopticOutput {
            semantic: Tensor::from_data(
                TensorData::new(logits, [batch, classes, gx, gy, gz]),
                &device,
            ),
            center: Tensor::zeros([batch, 1, gx, gy], &device),
            offset: Tensor::zeros([batch, 2, gx, gy], &device),
        })
    }

    fn uses_visibility(&self) -> bool {
        false
    }
}
