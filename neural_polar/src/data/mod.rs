//! Scans, datasets, collation and sharding.

mod batch;
mod scan;
mod shard;

pub use batch::{collate, NetworkInput, PanopticBatch, PanopticTargets, PointSet};
pub use scan::{InMemoryScans, Scan, ScanDataset};
pub use shard::{load_batches, DistributedShard};

pub(crate) use batch::{float_values, int_values};
