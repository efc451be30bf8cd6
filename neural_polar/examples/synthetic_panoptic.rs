//! Example: Two workers training a panoptic network on synthetic scans.
//!
//! This example runs the full loop on a tiny polar grid:
//! 1. Generate labeled synthetic scans
//! 2. Start two in-process workers that share evaluation metrics
//! 3. Train with SAP from the second epoch on, checkpointing on PQ improvement
//! 4. Export per-point predictions from the best checkpoint
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run -p neural_polar --example synthetic_panoptic
//! ```
//!
//! Output files are saved under the system temp directory.

use std::path::PathBuf;
use std::thread;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::optim::AdamConfig;

use neural_polar::prelude::*;
use neural_polar::training::load_model;

type MyBackend = Autodiff<NdArray>;

const GRID: [usize; 3] = [12, 16, 4];
const POINTS_PER_SCAN: usize = 400;

/// Synthetic scan whose class depends on the radial ring, with one car per scan.
fn synthetic_scan(seed: u64, grid: &VoxelGridConfig) -> Scan {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as u32
    };

    let fea_dim = grid.fea_dim();
    let [gx, gy, gz] = GRID;
    let mut coords = Vec::with_capacity(POINTS_PER_SCAN);
    let mut features = Vec::with_capacity(POINTS_PER_SCAN * fea_dim);
    let mut labels = Vec::with_capacity(POINTS_PER_SCAN);
    let mut instances = Vec::with_capacity(POINTS_PER_SCAN);

    for _ in 0..POINTS_PER_SCAN {
        let coord = VoxelCoord::new(
            next() % gx as u32,
            next() % gy as u32,
            next() % gz as u32,
        );
        // Ring 0-3: car, 4-7: road, 8-11: building.
        let class = 1 + coord.x / 4;
        let rho = coord.x as f32 + (next() % 100) as f32 / 100.0;
        let phi = coord.y as f32 / gy as f32 * std::f32::consts::TAU;
        let z = coord.z as f32;
        features.extend_from_slice(&[
            rho,
            phi,
            z,
            rho * phi.cos(),
            rho * phi.sin(),
            // Remission, strongly correlated with the material.
            class as f32,
            0.5,
            0.5,
            0.5,
        ]);
        coords.push(coord);
        labels.push(class);
        instances.push(if class == 1 { seed as u32 + 1 } else { 0 });
    }

    let mut scan = Scan::unlabeled(features, fea_dim, coords, grid);
    for coord in &scan.coords {
        let idx = (coord.x as usize * gy + coord.y as usize) * gz + coord.z as usize;
        scan.voxel_labels[idx] = (1 + coord.x / 4) as u8;
    }
    scan.point_labels = labels;
    scan.point_instances = instances;
    scan.with_path(format!("/synthetic/sequences/08/velodyne/{:06}.bin", seed))
}

fn main() {
    env_logger::init();

    let output_dir = std::env::temp_dir().join("neural_polar_synthetic");
    let checkpoint = output_dir.join("model.bin");
    // Start every run from scratch.
    let _ = std::fs::remove_dir_all(&output_dir);

    let grid = VoxelGridConfig::new().with_grid_size(GRID);
    let config = TrainingConfig::new()
        .with_grid(grid.clone())
        .with_n_classes(4)
        .with_thing_classes(vec![1])
        .with_class_names(vec!["car".into(), "road".into(), "building".into()])
        .with_min_points(5)
        .with_max_epoch(4)
        .with_learning_rate(5e-3)
        .with_sap(SapConfig::new().with_enabled(true).with_rate(0.05).with_start_epoch(1))
        .with_model_save_path(checkpoint.to_string_lossy().into_owned());

    let train = InMemoryScans::new((0..8).map(|i| synthetic_scan(i, &grid)).collect());
    let val = InMemoryScans::new((100..104).map(|i| synthetic_scan(i, &grid)).collect());

    let net_config = PointBevNetConfig::new(config.n_classes - 1, GRID, grid.fea_dim())
        .with_hidden_dims(vec![32, 64])
        .with_cell_dim(32);
    let device = NdArrayDevice::Cpu;
    let model = PointBevNet::<MyBackend>::new(&net_config, &device);

    println!("═══════════════════════════════════════════════════════════════");
    println!("        Panoptic training on synthetic scans (2 workers)");
    println!("═══════════════════════════════════════════════════════════════");

    let members = match LocalGroup::new(2) {
        Ok(members) => members,
        Err(e) => {
            eprintln!("Could not create worker group: {}", e);
            return;
        }
    };

    let summaries: Vec<Result<TrainingSummary>> = thread::scope(|s| {
        let handles: Vec<_> = members
            .into_iter()
            .map(|member| {
                let (model, config, train, val) = (model.clone(), config.clone(), &train, &val);
                s.spawn(move || {
                    let loss = PanopticCriterion::new(config.loss.clone());
                    let mut trainer = PanopticTrainer::<MyBackend, _, _, _, _, _>::new(
                        model,
                        AdamConfig::new().init(),
                        loss,
                        ArgmaxDecoder::new(),
                        member,
                        config,
                        NdArrayDevice::Cpu,
                    )?;
                    trainer.fit(train, val)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(PolarError::InvalidData("worker panicked".into())))
            })
            .collect()
    });

    let summary = match summaries.into_iter().next() {
        Some(Ok(summary)) => summary,
        Some(Err(e)) => {
            eprintln!("Training failed: {}", e);
            return;
        }
        None => return,
    };
    println!("  Epochs:          {}", summary.epochs_run);
    println!("  Optimizer steps: {}", summary.global_iter);
    println!("  Best val PQ:     {:.2}%", summary.best_pq * 100.0);
    println!("  Saved at epochs: {:?}", summary.saves);
    println!();

    let best = PointBevNet::<NdArray>::new(&net_config, &device);
    let best = match load_model::<NdArray, _>(best, &checkpoint, &device) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Could not load checkpoint: {}", e);
            return;
        }
    };

    let predictions: PathBuf = output_dir.join("predictions");
    match export_predictions::<NdArray, _, _, _>(
        &best,
        &ArgmaxDecoder::new(),
        &val,
        &DistributedShard::full(val.len()),
        &config,
        &predictions,
        &device,
    ) {
        Ok(export) => {
            println!("  Wrote {} prediction files:", export.written.len());
            for path in &export.written {
                println!("    {}", path.display());
            }
        }
        Err(e) => eprintln!("Export failed: {}", e),
    }
}
