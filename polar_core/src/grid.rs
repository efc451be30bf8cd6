//! Dense per-voxel grids: foreground masks and decoded panoptic labels.

use crate::error::{PolarCoreError, Result};
use crate::types::{GridShape, PanopticLabel, VoxelCoord};

/// Boolean grid marking voxels occupied by at least one point of a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundMask {
    shape: GridShape,
    occupied: Vec<bool>,
}

impl ForegroundMask {
    /// Build the mask for one sample from its voxel coordinates.
    pub fn from_coords(shape: GridShape, coords: &[VoxelCoord]) -> Result<Self> {
        let mut occupied = vec![false; shape.volume()];
        for &coord in coords {
            occupied[shape.linear_index(coord)?] = true;
        }
        Ok(Self { shape, occupied })
    }

    /// Grid shape of the mask.
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Row-major occupancy flags.
    #[inline]
    pub fn as_slice(&self) -> &[bool] {
        &self.occupied
    }

    /// Whether a voxel is occupied. Out-of-bounds voxels are never occupied.
    pub fn is_occupied(&self, coord: VoxelCoord) -> bool {
        self.shape
            .linear_index(coord)
            .map(|idx| self.occupied[idx])
            .unwrap_or(false)
    }

    /// Number of occupied voxels.
    pub fn count(&self) -> usize {
        self.occupied.iter().filter(|&&o| o).count()
    }
}

/// Dense grid of packed panoptic codes produced by a decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanopticGrid {
    shape: GridShape,
    codes: Vec<u32>,
}

impl PanopticGrid {
    /// An all-zero grid (class 0, no instance).
    pub fn zeros(shape: GridShape) -> Self {
        Self {
            shape,
            codes: vec![0; shape.volume()],
        }
    }

    /// Wrap a row-major buffer of codes.
    pub fn from_codes(shape: GridShape, codes: Vec<u32>) -> Result<Self> {
        if codes.len() != shape.volume() {
            return Err(PolarCoreError::VolumeMismatch {
                expected: shape.volume(),
                got: codes.len(),
            });
        }
        Ok(Self { shape, codes })
    }

    /// Grid shape.
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Row-major codes.
    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.codes
    }

    /// Label at a voxel.
    pub fn get(&self, coord: VoxelCoord) -> Result<PanopticLabel> {
        Ok(PanopticLabel(self.codes[self.shape.linear_index(coord)?]))
    }

    /// Overwrite the label at a voxel.
    pub fn set(&mut self, coord: VoxelCoord, label: PanopticLabel) -> Result<()> {
        let idx = self.shape.linear_index(coord)?;
        self.codes[idx] = label.code();
        Ok(())
    }

    /// Zero every voxel outside the mask.
    pub fn restrict_to(&mut self, mask: &ForegroundMask) -> Result<()> {
        if mask.shape() != self.shape {
            return Err(PolarCoreError::VolumeMismatch {
                expected: self.shape.volume(),
                got: mask.shape().volume(),
            });
        }
        for (code, &keep) in self.codes.iter_mut().zip(mask.as_slice()) {
            if !keep {
                *code = 0;
            }
        }
        Ok(())
    }

    /// Gather per-point codes using the sample's voxel coordinates.
    pub fn gather(&self, coords: &[VoxelCoord]) -> Result<Vec<u32>> {
        coords
            .iter()
            .map(|&c| self.shape.linear_index(c).map(|idx| self.codes[idx]))
            .collect()
    }
}

/// Semantic part of each panoptic code (`code & 0xFFFF`).
pub fn semantic_of(codes: &[u32]) -> Vec<u32> {
    codes
        .iter()
        .map(|&c| PanopticLabel(c).semantic())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> GridShape {
        GridShape::new([4, 4, 2])
    }

    #[test]
    fn test_mask_marks_occupied_voxels_only() {
        let coords = [
            VoxelCoord::new(0, 0, 0),
            VoxelCoord::new(0, 0, 0),
            VoxelCoord::new(3, 2, 1),
        ];
        let mask = ForegroundMask::from_coords(shape(), &coords).unwrap();
        assert_eq!(mask.count(), 2);
        assert!(mask.is_occupied(VoxelCoord::new(3, 2, 1)));
        assert!(!mask.is_occupied(VoxelCoord::new(3, 2, 0)));
        assert!(!mask.is_occupied(VoxelCoord::new(9, 9, 9)));
    }

    #[test]
    fn test_mask_rejects_out_of_bounds() {
        let err = ForegroundMask::from_coords(shape(), &[VoxelCoord::new(0, 4, 0)]);
        assert!(err.is_err());
    }

    #[test]
    fn test_gather_and_restrict() {
        let mut grid = PanopticGrid::zeros(shape());
        grid.set(VoxelCoord::new(1, 1, 1), PanopticLabel::pack(2, 5))
            .unwrap();
        grid.set(VoxelCoord::new(2, 2, 0), PanopticLabel::pack(3, 0))
            .unwrap();

        let mask = ForegroundMask::from_coords(shape(), &[VoxelCoord::new(1, 1, 1)]).unwrap();
        grid.restrict_to(&mask).unwrap();

        let codes = grid
            .gather(&[VoxelCoord::new(1, 1, 1), VoxelCoord::new(2, 2, 0)])
            .unwrap();
        assert_eq!(codes, vec![PanopticLabel::pack(2, 5).code(), 0]);
        assert_eq!(semantic_of(&codes), vec![2, 0]);
    }

    #[test]
    fn test_from_codes_checks_volume() {
        assert!(PanopticGrid::from_codes(shape(), vec![0; 31]).is_err());
        assert!(PanopticGrid::from_codes(shape(), vec![0; 32]).is_ok());
    }
}
