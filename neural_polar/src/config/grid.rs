//! Voxel grid and post-processing configuration.

use burn::config::Config;
use polar_core::GridShape;

/// Configuration of the voxel grid the network predicts on.
#[derive(Config, Debug)]
pub struct VoxelGridConfig {
    /// Grid extent along (x, y, z). With polar input these are (radius, angle, height).
    #[config(default = "[480, 360, 32]")]
    pub grid_size: [usize; 3],

    /// Whether points are voxelized in polar coordinates.
    #[config(default = true)]
    pub polar: bool,
}

impl Default for VoxelGridConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl VoxelGridConfig {
    /// Grid shape for bounds checks and dense buffers.
    pub fn shape(&self) -> GridShape {
        GridShape::new(self.grid_size)
    }

    /// Per-point feature dimension produced by the voxelizer.
    ///
    /// Polar input carries two extra channels (the Cartesian x, y) on top of
    /// the seven shared ones.
    pub fn fea_dim(&self) -> usize {
        if self.polar {
            9
        } else {
            7
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.grid_size.iter().any(|&d| d == 0) {
            return Err("grid_size must be positive along every axis".to_string());
        }
        if self.grid_size.iter().any(|&d| d > u32::MAX as usize) {
            return Err("grid_size must fit in u32 coordinates".to_string());
        }
        Ok(())
    }
}

/// Parameters handed to the panoptic decoder.
#[derive(Config, Debug)]
pub struct PostProcessingConfig {
    /// Minimum center-heatmap score for an instance center.
    #[config(default = 0.1)]
    pub threshold: f32,

    /// Non-maximum suppression window size (odd).
    #[config(default = 5)]
    pub nms_kernel: usize,

    /// Maximum number of instance centers kept per scan.
    #[config(default = 100)]
    pub top_k: usize,
}

impl Default for PostProcessingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PostProcessingConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err("post-processing threshold must lie in [0, 1]".to_string());
        }
        if self.nms_kernel == 0 || self.nms_kernel % 2 == 0 {
            return Err("nms_kernel must be a positive odd number".to_string());
        }
        if self.top_k == 0 {
            return Err("top_k must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let grid = VoxelGridConfig::default();
        assert_eq!(grid.shape().dims(), [480, 360, 32]);
        assert_eq!(grid.fea_dim(), 9);
        assert_eq!(grid.clone().with_polar(false).fea_dim(), 7);
        assert!(grid.validate().is_ok());

        let pp = PostProcessingConfig::default();
        assert_eq!(pp.nms_kernel, 5);
        assert_eq!(pp.top_k, 100);
        assert!(pp.validate().is_ok());
    }

    #[test]
    fn test_invalid() {
        assert!(VoxelGridConfig::new()
            .with_grid_size([0, 4, 4])
            .validate()
            .is_err());
        assert!(PostProcessingConfig::new()
            .with_nms_kernel(4)
            .validate()
            .is_err());
    }
}
