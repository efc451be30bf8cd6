//! Core types: voxel coordinates, grid shapes and packed panoptic labels.

use crate::error::{PolarCoreError, Result};

/// Number of low bits of a panoptic code that hold the semantic class.
pub const SEMANTIC_BITS: u32 = 16;

/// Mask selecting the semantic class from a panoptic code.
pub const SEMANTIC_MASK: u32 = 0xFFFF;

/// Train-space label used for unlabeled voxels (raw label 0 shifted down by one).
pub const IGNORE_LABEL: u8 = 255;

/// Convert a raw dataset label to the train label space.
///
/// Raw label 0 (unlabeled) wraps around to [`IGNORE_LABEL`].
#[inline]
pub const fn to_train_label(raw: u8) -> u8 {
    raw.wrapping_sub(1)
}

/// Integer voxel index of a point in the 3-D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoxelCoord {
    /// Index along the first (radial or x) axis.
    pub x: u32,
    /// Index along the second (angular or y) axis.
    pub y: u32,
    /// Index along the height axis.
    pub z: u32,
}

impl VoxelCoord {
    /// Create a new voxel coordinate.
    #[inline]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Convert to an array.
    #[inline]
    pub const fn as_array(&self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }

    /// The bird's-eye-view `(x, y)` subset consumed by the network.
    #[inline]
    pub const fn bev(&self) -> [u32; 2] {
        [self.x, self.y]
    }
}

impl From<[u32; 3]> for VoxelCoord {
    fn from(v: [u32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Extent of the dense voxel grid along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridShape {
    dims: [usize; 3],
}

impl GridShape {
    /// Create a grid shape from per-axis extents.
    #[inline]
    pub const fn new(dims: [usize; 3]) -> Self {
        Self { dims }
    }

    /// Per-axis extents.
    #[inline]
    pub const fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Number of voxels in the full grid.
    #[inline]
    pub const fn volume(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Number of cells in the bird's-eye-view plane.
    #[inline]
    pub const fn bev_area(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    /// Whether a coordinate lies inside the grid.
    #[inline]
    pub fn contains(&self, coord: VoxelCoord) -> bool {
        (coord.x as usize) < self.dims[0]
            && (coord.y as usize) < self.dims[1]
            && (coord.z as usize) < self.dims[2]
    }

    /// Row-major linear index of a voxel, checked against the bounds.
    #[inline]
    pub fn linear_index(&self, coord: VoxelCoord) -> Result<usize> {
        if !self.contains(coord) {
            return Err(PolarCoreError::VoxelOutOfBounds {
                coord: coord.as_array(),
                bounds: self.dims,
            });
        }
        Ok(((coord.x as usize) * self.dims[1] + coord.y as usize) * self.dims[2]
            + coord.z as usize)
    }

    /// Row-major linear index of a voxel's bird's-eye-view cell.
    #[inline]
    pub fn bev_index(&self, coord: VoxelCoord) -> Result<usize> {
        if !self.contains(coord) {
            return Err(PolarCoreError::VoxelOutOfBounds {
                coord: coord.as_array(),
                bounds: self.dims,
            });
        }
        let [x, y] = coord.bev();
        Ok(x as usize * self.dims[1] + y as usize)
    }

    /// Check every coordinate of a sample against the bounds.
    pub fn check_all(&self, coords: &[VoxelCoord]) -> Result<()> {
        match coords.iter().find(|c| !self.contains(**c)) {
            Some(c) => Err(PolarCoreError::VoxelOutOfBounds {
                coord: c.as_array(),
                bounds: self.dims,
            }),
            None => Ok(()),
        }
    }
}

/// A packed panoptic code: semantic class in the low 16 bits, instance id above.
///
/// Instance id 0 means "no instance" (stuff classes and unassigned voxels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct PanopticLabel(pub u32);

impl PanopticLabel {
    /// Pack a semantic class and an instance id.
    ///
    /// Semantic ids above 16 bits and instance ids above 16 bits are truncated.
    #[inline]
    pub const fn pack(semantic: u32, instance: u32) -> Self {
        Self((instance << SEMANTIC_BITS) | (semantic & SEMANTIC_MASK))
    }

    /// Semantic class id.
    #[inline]
    pub const fn semantic(self) -> u32 {
        self.0 & SEMANTIC_MASK
    }

    /// Instance id (0 = none).
    #[inline]
    pub const fn instance(self) -> u32 {
        self.0 >> SEMANTIC_BITS
    }

    /// Raw code.
    #[inline]
    pub const fn code(self) -> u32 {
        self.0
    }
}

impl From<u32> for PanopticLabel {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_label_shift() {
        assert_eq!(to_train_label(0), IGNORE_LABEL);
        assert_eq!(to_train_label(1), 0);
        assert_eq!(to_train_label(19), 18);
    }

    #[test]
    fn test_linear_index_row_major() {
        let shape = GridShape::new([4, 3, 2]);
        assert_eq!(shape.volume(), 24);
        assert_eq!(shape.linear_index(VoxelCoord::new(0, 0, 0)).unwrap(), 0);
        assert_eq!(shape.linear_index(VoxelCoord::new(0, 0, 1)).unwrap(), 1);
        assert_eq!(shape.linear_index(VoxelCoord::new(0, 1, 0)).unwrap(), 2);
        assert_eq!(shape.linear_index(VoxelCoord::new(1, 0, 0)).unwrap(), 6);
        assert_eq!(shape.linear_index(VoxelCoord::new(3, 2, 1)).unwrap(), 23);
        assert_eq!(shape.bev_index(VoxelCoord::new(3, 2, 1)).unwrap(), 11);
        assert_eq!(VoxelCoord::new(3, 2, 1).bev(), [3, 2]);
    }

    #[test]
    fn test_out_of_bounds() {
        let shape = GridShape::new([4, 3, 2]);
        let err = shape.linear_index(VoxelCoord::new(4, 0, 0)).unwrap_err();
        assert!(matches!(err, PolarCoreError::VoxelOutOfBounds { .. }));
        assert!(shape
            .check_all(&[VoxelCoord::new(1, 1, 1), VoxelCoord::new(0, 3, 0)])
            .is_err());
        assert!(shape.check_all(&[VoxelCoord::new(3, 2, 1)]).is_ok());
    }

    #[test]
    fn test_panoptic_pack() {
        let label = PanopticLabel::pack(10, 7);
        assert_eq!(label.semantic(), 10);
        assert_eq!(label.instance(), 7);
        assert_eq!(label.code() & SEMANTIC_MASK, 10);

        let stuff = PanopticLabel::pack(15, 0);
        assert_eq!(stuff.code(), 15);
    }
}
