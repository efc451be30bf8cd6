//! In-process collective for workers running on threads.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use polar_core::PanopticEval;

use crate::error::{PolarError, Result};

use super::Collective;

#[derive(Debug)]
struct GroupState {
    arrived: usize,
    generation: u64,
    broken: bool,
    slots: Vec<Option<PanopticEval>>,
}

#[derive(Debug)]
struct Shared {
    world_size: usize,
    state: Mutex<GroupState>,
    released: Condvar,
}

/// Factory for a group of thread-local workers.
#[derive(Debug, Clone, Copy)]
pub struct LocalGroup;

impl LocalGroup {
    /// Create `world_size` members, one per worker thread, ranked `0..world_size`.
    pub fn new(world_size: usize) -> Result<Vec<LocalMember>> {
        if world_size == 0 {
            return Err(PolarError::invalid_config("world_size must be positive"));
        }
        let shared = Arc::new(Shared {
            world_size,
            state: Mutex::new(GroupState {
                arrived: 0,
                generation: 0,
                broken: false,
                slots: vec![None; world_size],
            }),
            released: Condvar::new(),
        });
        Ok((0..world_size)
            .map(|rank| LocalMember {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect())
    }
}

/// One worker's handle on a [`LocalGroup`].
///
/// Dropping a member marks the group broken, so peers blocked in a barrier
/// get an error instead of waiting forever.
#[derive(Debug)]
pub struct LocalMember {
    rank: usize,
    shared: Arc<Shared>,
}

impl LocalMember {
    fn lock(&self) -> Result<MutexGuard<'_, GroupState>> {
        self.shared
            .state
            .lock()
            .map_err(|_| PolarError::collective("group state poisoned"))
    }
}

impl Collective for LocalMember {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.shared.world_size
    }

    fn all_merge(&self, local: PanopticEval) -> Result<PanopticEval> {
        self.lock()?.slots[self.rank] = Some(local);

        // Every slot is filled once all members pass this barrier.
        self.barrier()?;

        let merged = {
            let state = self.lock()?;
            let mut slots = state.slots.iter();
            let first = slots
                .next()
                .and_then(Option::as_ref)
                .ok_or_else(|| PolarError::collective("rank 0 did not deposit an accumulator"))?;
            let mut merged = first.clone();
            for (rank, slot) in slots.enumerate() {
                let other = slot.as_ref().ok_or_else(|| {
                    PolarError::collective(format!("rank {} did not deposit an accumulator", rank + 1))
                })?;
                merged.merge(other)?;
            }
            merged
        };

        // Nobody may overwrite a slot for the next round before all have read.
        self.barrier()?;
        Ok(merged)
    }

    fn barrier(&self) -> Result<()> {
        let mut state = self.lock()?;
        if state.broken {
            return Err(PolarError::collective("a group member has left"));
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.shared.world_size {
            state.arrived = 0;
            state.generation += 1;
            self.shared.released.notify_all();
            return Ok(());
        }

        while state.generation == generation {
            if state.broken {
                return Err(PolarError::collective("a group member has left"));
            }
            state = self
                .shared
                .released
                .wait(state)
                .map_err(|_| PolarError::collective("group state poisoned"))?;
        }
        Ok(())
    }
}

impl Drop for LocalMember {
    fn drop(&mut self) {
        let mut state = match self.shared.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.broken = true;
        self.shared.released.notify_all();
    }
}
