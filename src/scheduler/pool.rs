use std::collections::BTreeMap;
use std::sync::Mutex;

use uuid::Uuid;

/// Occupancy of one GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBinding {
    pub gpu_id: u32,
    /// The running job occupying this GPU, or `None` when free.
    pub bound_job: Option<Uuid>,
}

/// Fixed pool of GPU ids with free/bound tracking.
///
/// The id set is fixed at construction and never changes for the process
/// lifetime. The binding map is one critical section; every method is safe
/// to call from any task or thread, including from drop handlers.
#[derive(Debug)]
pub struct GpuPool {
    slots: Mutex<BTreeMap<u32, Option<Uuid>>>,
}

impl GpuPool {
    pub fn new(gpu_ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            slots: Mutex::new(gpu_ids.into_iter().map(|id| (id, None)).collect()),
        }
    }

    /// The pool's GPU ids in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        self.slots.lock().unwrap().keys().copied().collect()
    }

    /// Atomically bind the lowest free GPU to `job_id`. Returns `None` when
    /// every GPU is occupied. Picking the lowest id keeps selection stable
    /// and deterministic; telemetry is observability-only and never ranks
    /// free GPUs here.
    pub fn try_acquire(&self, job_id: Uuid) -> Option<u32> {
        let mut slots = self.slots.lock().unwrap();
        let gpu_id = slots
            .iter()
            .find(|(_, bound)| bound.is_none())
            .map(|(id, _)| *id)?;
        slots.insert(gpu_id, Some(job_id));
        Some(gpu_id)
    }

    /// Unconditionally clear the binding. Releasing an already-free GPU is a
    /// no-op, not an error, so double-release from failure paths is harmless.
    pub fn release(&self, gpu_id: u32) {
        if let Some(bound) = self.slots.lock().unwrap().get_mut(&gpu_id) {
            *bound = None;
        }
    }

    /// Snapshot of every binding, in id order.
    pub fn bindings(&self) -> Vec<GpuBinding> {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .map(|(id, bound)| GpuBinding {
                gpu_id: *id,
                bound_job: *bound,
            })
            .collect()
    }

    pub fn free_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap()
            .values()
            .filter(|bound| bound.is_none())
            .count()
    }
}
