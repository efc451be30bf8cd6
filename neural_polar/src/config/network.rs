//! Reference network configuration.

use burn::config::Config;

/// Configuration for [`PointBevNet`](crate::model::PointBevNet).
#[derive(Config, Debug)]
pub struct PointBevNetConfig {
    /// Number of semantic classes predicted (train label space).
    pub n_classes: usize,

    /// Grid extent along (x, y, z).
    pub grid_size: [usize; 3],

    /// Per-point input feature dimension.
    pub fea_dim: usize,

    /// Hidden layer dimensions of the per-point MLP.
    #[config(default = "vec![64, 128]")]
    pub hidden_dims: Vec<usize>,

    /// Feature dimension of a BEV cell after pooling.
    #[config(default = 64)]
    pub cell_dim: usize,

    /// Consume per-cell visibility features. Fixed for the lifetime of the model.
    #[config(default = false)]
    pub use_visibility: bool,

    /// Number of visibility channels per BEV cell.
    #[config(default = 32)]
    pub vis_channels: usize,
}

impl PointBevNetConfig {
    /// Number of output channels of the semantic head (`classes × height`).
    pub fn semantic_channels(&self) -> usize {
        self.n_classes * self.grid_size[2]
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.n_classes == 0 {
            return Err("n_classes must be positive".to_string());
        }
        if self.fea_dim == 0 || self.cell_dim == 0 {
            return Err("feature dimensions must be positive".to_string());
        }
        if self.grid_size.iter().any(|&d| d == 0) {
            return Err("grid_size must be positive along every axis".to_string());
        }
        if self.use_visibility && self.vis_channels == 0 {
            return Err("vis_channels must be positive when visibility is used".to_string());
        }
        Ok(())
    }
}
