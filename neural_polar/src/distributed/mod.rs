//! Cross-worker coordination.
//!
//! Workers exchange nothing but their confusion accumulators. After an
//! evaluation round every worker calls [`Collective::all_merge`] and then
//! [`Collective::barrier`]; once the barrier returns, the merged
//! accumulator reflects every worker's contribution.

mod local;

pub use local::{LocalGroup, LocalMember};

use polar_core::PanopticEval;

use crate::error::Result;

/// Rank identity, accumulator merge and barrier.
///
/// Every worker must call the collective operations the same number of
/// times in the same order. A failure of either operation is fatal to the
/// run.
pub trait Collective {
    /// This worker's rank in `0..world_size`.
    fn rank(&self) -> usize;

    /// Number of workers.
    fn world_size(&self) -> usize;

    /// Whether this worker reports metrics and writes checkpoints.
    fn is_coordinator(&self) -> bool {
        self.rank() == 0
    }

    /// Merge `local` with every other worker's accumulator.
    ///
    /// Every worker receives the same merged accumulator.
    fn all_merge(&self, local: PanopticEval) -> Result<PanopticEval>;

    /// Block until every worker has reached the barrier.
    fn barrier(&self) -> Result<()>;
}

/// The trivial collective of a single worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SingleProcess;

impl Collective for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn all_merge(&self, local: PanopticEval) -> Result<PanopticEval> {
        Ok(local)
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }
}
