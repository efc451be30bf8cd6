//! Splitting a dataset across workers.

use burn::prelude::*;

use crate::config::VoxelGridConfig;
use crate::error::{PolarError, Result};

use super::batch::{collate, PanopticBatch};
use super::scan::ScanDataset;

/// The slice of a dataset one worker visits, in a fixed order.
///
/// Indices are dealt round-robin. The tail is padded by wrapping around to
/// the start so every rank gets `ceil(len / world_size)` indices and all
/// workers run the same number of batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributedShard {
    len: usize,
    rank: usize,
    world_size: usize,
}

impl DistributedShard {
    /// Shard of a dataset of `len` scans for `rank` out of `world_size`.
    pub fn new(len: usize, rank: usize, world_size: usize) -> Result<Self> {
        if world_size == 0 || rank >= world_size {
            return Err(PolarError::invalid_config(format!(
                "rank {} is not valid for a world of {}",
                rank, world_size
            )));
        }
        Ok(Self {
            len,
            rank,
            world_size,
        })
    }

    /// The whole dataset for a single worker.
    pub fn full(len: usize) -> Self {
        Self {
            len,
            rank: 0,
            world_size: 1,
        }
    }

    /// Number of indices this rank visits.
    pub fn num_samples(&self) -> usize {
        self.len.div_ceil(self.world_size)
    }

    /// Dataset indices visited by this rank, in order.
    pub fn indices(&self) -> Vec<usize> {
        if self.len == 0 {
            return Vec::new();
        }
        let total = self.num_samples() * self.world_size;
        (self.rank..total)
            .step_by(self.world_size)
            .map(|i| i % self.len)
            .collect()
    }

    /// Indices grouped into batches of at most `batch_size`.
    pub fn batches(&self, batch_size: usize) -> Vec<Vec<usize>> {
        self.indices()
            .chunks(batch_size.max(1))
            .map(<[usize]>::to_vec)
            .collect()
    }
}

/// Load and collate the batches of a shard lazily.
pub fn load_batches<'a, B, S>(
    dataset: &'a S,
    shard: &DistributedShard,
    batch_size: usize,
    grid: &'a VoxelGridConfig,
    device: &'a B::Device,
) -> impl Iterator<Item = Result<PanopticBatch<B>>> + 'a
where
    B: Backend,
    S: ScanDataset + ?Sized,
{
    shard.batches(batch_size).into_iter().map(move |indices| {
        let scans = indices
            .iter()
            .map(|&i| dataset.get(i))
            .collect::<Result<Vec<_>>>()?;
        collate(&scans, grid, device)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let a = DistributedShard::new(6, 0, 2).unwrap();
        let b = DistributedShard::new(6, 1, 2).unwrap();
        assert_eq!(a.indices(), vec![0, 2, 4]);
        assert_eq!(b.indices(), vec![1, 3, 5]);
    }

    #[test]
    fn test_padding_wraps_around() {
        let shards: Vec<Vec<usize>> = (0..3)
            .map(|r| DistributedShard::new(7, r, 3).unwrap().indices())
            .collect();
        assert_eq!(shards[0], vec![0, 3, 6]);
        assert_eq!(shards[1], vec![1, 4, 0]);
        assert_eq!(shards[2], vec![2, 5, 1]);
        assert!(shards.iter().all(|s| s.len() == 3));
    }

    #[test]
    fn test_batches() {
        let shard = DistributedShard::full(5);
        assert_eq!(shard.batches(2), vec![vec![0, 1], vec![2, 3], vec![4]]);
        assert!(DistributedShard::full(0).batches(2).is_empty());
    }

    #[test]
    fn test_invalid_rank() {
        assert!(DistributedShard::new(4, 2, 2).is_err());
        assert!(DistributedShard::new(4, 0, 0).is_err());
    }
}
