//! Compact point-to-BEV panoptic network.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use polar_core::GridShape;

use crate::config::PointBevNetConfig;
use crate::data::{NetworkInput, PointSet};
use crate::error::{PolarError, Result};

use super::network::{PanopticNetwork, PanopticOutput};

/// PointNet-style encoder feeding per-cell panoptic heads.
///
/// Every point goes through a shared MLP, the results are mean-pooled into
/// their bird's-eye-view cell, and three linear heads read each cell:
/// semantic logits for every height slice, a center score and a 2-D offset.
#[derive(Module, Debug)]
pub struct PointBevNet<B: Backend> {
    /// MLP layers applied to each point.
    mlp_layers: Vec<Linear<B>>,
    /// Projection of point features to the cell dimension.
    proj: Linear<B>,
    /// Projection of visibility channels, present only when visibility is used.
    vis_proj: Option<Linear<B>>,
    /// Per-cell hidden layer.
    cell_layer: Linear<B>,
    /// Semantic head: classes × height logits per cell.
    semantic_head: Linear<B>,
    /// Center heatmap head.
    center_head: Linear<B>,
    /// Offset head.
    offset_head: Linear<B>,
    /// Activation function.
    activation: Relu,
    /// Grid extent.
    #[module(skip)]
    grid_size: [usize; 3],
    /// Number of semantic classes.
    #[module(skip)]
    n_classes: usize,
    /// Expected per-point feature dimension.
    #[module(skip)]
    fea_dim: usize,
}

impl<B: Backend> PointBevNet<B> {
    /// Create a new network from configuration.
    pub fn new(config: &PointBevNetConfig, device: &B::Device) -> Self {
        let mut mlp_layers = Vec::new();
        let mut in_dim = config.fea_dim;
        for &out_dim in &config.hidden_dims {
            mlp_layers.push(LinearConfig::new(in_dim, out_dim).init(device));
            in_dim = out_dim;
        }
        let proj = LinearConfig::new(in_dim, config.cell_dim).init(device);

        let vis_proj = config
            .use_visibility
            .then(|| LinearConfig::new(config.vis_channels, config.cell_dim).init(device));

        Self {
            mlp_layers,
            proj,
            vis_proj,
            cell_layer: LinearConfig::new(config.cell_dim, config.cell_dim).init(device),
            semantic_head: LinearConfig::new(config.cell_dim, config.semantic_channels())
                .init(device),
            center_head: LinearConfig::new(config.cell_dim, 1).init(device),
            offset_head: LinearConfig::new(config.cell_dim, 2).init(device),
            activation: Relu::new(),
            grid_size: config.grid_size,
            n_classes: config.n_classes,
            fea_dim: config.fea_dim,
        }
    }

    /// Grid shape the network predicts on.
    pub fn grid_shape(&self) -> GridShape {
        GridShape::new(self.grid_size)
    }

    /// Encode points and mean-pool them into BEV cells.
    ///
    /// Output: [X * Y, cell_dim]
    fn pool(&self, points: &PointSet<B>) -> Result<Tensor<B, 2>> {
        let [num_points, fea_dim] = points.features.dims();
        if fea_dim != self.fea_dim {
            return Err(PolarError::ShapeMismatch {
                expected: vec![num_points, self.fea_dim],
                got: vec![num_points, fea_dim],
            });
        }

        let shape = self.grid_shape();
        let cells = points
            .coords
            .iter()
            .map(|&c| shape.bev_index(c).map(|i| i as i64))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut x = points.features.clone();
        for layer in &self.mlp_layers {
            x = layer.forward(x);
            x = self.activation.forward(x);
        }
        x = self.proj.forward(x);

        let device = x.device();
        let cell_dim = x.dims()[1];
        let area = shape.bev_area();
        let index = Tensor::<B, 1, Int>::from_data(TensorData::new(cells, [num_points]), &device);

        let sums = Tensor::<B, 2>::zeros([area, cell_dim], &device).select_assign(
            0,
            index.clone(),
            x,
        );
        let counts = Tensor::<B, 2>::zeros([area, 1], &device).select_assign(
            0,
            index,
            Tensor::ones([num_points, 1], &device),
        );
        Ok(sums / counts.clamp_min(1.0))
    }
}

impl<B: Backend> PanopticNetwork<B> for PointBevNet<B> {
    fn forward(&self, input: &NetworkInput<B>) -> Result<PanopticOutput<B>> {
        let batch = input.batch_size();
        if batch == 0 {
            return Err(PolarError::InvalidData("empty network input".into()));
        }
        let [gx, gy, gz] = self.grid_size;

        let visibility = match &self.vis_proj {
            Some(_) => {
                let vis = input
                    .visibility
                    .as_ref()
                    .ok_or(PolarError::MissingVisibility)?;
                let [b, _, vx, vy] = vis.dims();
                if b != batch || vx != gx || vy != gy {
                    return Err(PolarError::ShapeMismatch {
                        expected: vec![batch, 0, gx, gy],
                        got: vis.dims().to_vec(),
                    });
                }
                Some(vis)
            }
            None => None,
        };

        let mut semantic = Vec::with_capacity(batch);
        let mut center = Vec::with_capacity(batch);
        let mut offset = Vec::with_capacity(batch);

        for (i, points) in input.points.iter().enumerate() {
            let mut cells = self.pool(points)?;

            if let (Some(proj), Some(vis)) = (&self.vis_proj, visibility) {
                let channels = vis.dims()[1];
                let vis_cells = vis
                    .clone()
                    .slice([i..i + 1])
                    .reshape([channels, gx * gy])
                    .swap_dims(0, 1);
                cells = cells + proj.forward(vis_cells);
            }

            let hidden = self.activation.forward(self.cell_layer.forward(cells));

            let sem = self
                .semantic_head
                .forward(hidden.clone())
                .reshape([gx, gy, self.n_classes, gz])
                .permute([2, 0, 1, 3]);
            let ctr = sigmoid(self.center_head.forward(hidden.clone()))
                .reshape([gx, gy, 1])
                .permute([2, 0, 1]);
            let off = self
                .offset_head
                .forward(hidden)
                .reshape([gx, gy, 2])
                .permute([2, 0, 1]);

            semantic.push(sem.unsqueeze::<5>());
            center.push(ctr.unsqueeze::<4>());
            offset.push(off.unsqueeze::<4>());
        }

        Ok(PanopticOutput {
            semantic: Tensor::cat(semantic, 0),
            center: Tensor::cat(center, 0),
            offset: Tensor::cat(offset, 0),
        })
    }

    fn uses_visibility(&self) -> bool {
        self.vis_proj.is_some()
    }
}
