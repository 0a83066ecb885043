use bytemuck::{Pod, Zeroable};

use crate::error::CoreResult;
use crate::thread_pool::WorkerPool;

/// The six named data-parallel dispatch points of one SPH substep
/// (spec.md §4.D, §6). Each is a full barrier: every work-item of one
/// dispatch completes before the next dispatch begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchPoint {
    ExternalForces,
    UpdateSpatialHash,
    CalculateDensities,
    CalculatePressureForces,
    CalculateViscosity,
    UpdatePositions,
}

/// The orchestrator/kernel boundary named in spec.md §6: a backend runs
/// `count` work-items of a named dispatch point, handing each work-item
/// its index, and returns only once every work-item (and the barrier that
/// follows it) has completed.
///
/// The CPU implementation below (`impl KernelBackend for WorkerPool`) maps
/// a dispatch onto `WorkerPool::parallel_for`; a GPU backend would issue
/// the matching compute-shader dispatch and a storage-buffer memory
/// barrier instead. No such backend is implemented here (see
/// SPEC_FULL.md's "Non-goals carried forward" section) but the trait is
/// the seam it would plug into.
pub trait KernelBackend {
    /// Runs `f(index)` once per work-item in `0..count`, fully in
    /// parallel, returning only after every work-item has completed.
    fn dispatch<F>(&self, point: DispatchPoint, count: usize, f: F) -> CoreResult<()>
    where
        F: Fn(usize) + Sync;

    fn thread_count(&self) -> usize;
}

impl KernelBackend for WorkerPool {
    fn dispatch<F>(&self, _point: DispatchPoint, count: usize, f: F) -> CoreResult<()>
    where
        F: Fn(usize) + Sync,
    {
        let threads = self.thread_count();
        self.parallel_for(count, threads, |start, end| {
            for i in start..end {
                f(i);
            }
        })
    }

    fn thread_count(&self) -> usize {
        WorkerPool::thread_count(self)
    }
}

/// Mirrors the compute shader uniform block an orchestrator would upload
/// alongside the fixed buffer binding order named in spec.md §6
/// (particles, spatial-lookup triples, start-indices, atomic counters).
/// All configuration scalars plus the kernel normalization factors, so a
/// GPU backend implementing `KernelBackend` has everything a shader needs
/// without a second upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    pub num_particles: u32,
    pub sub_dt: f32,
    pub gravity: f32,
    pub collision_damping: f32,
    pub smoothing_radius: f32,
    pub target_density: f32,
    pub pressure_multiplier: f32,
    pub near_pressure_multiplier: f32,
    pub viscosity_strength: f32,
    pub poly6_factor: f32,
    pub spiky_pow2_factor: f32,
    pub spiky_pow3_factor: f32,
    pub spiky_pow2_derivative_factor: f32,
    pub spiky_pow3_derivative_factor: f32,
    pub interaction_strength: f32,
    pub interaction_radius: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_pool_dispatch_visits_every_index_exactly_once() {
        let pool = WorkerPool::new(4).unwrap();
        let visited = std::sync::Mutex::new(vec![false; 97]);
        pool.dispatch(DispatchPoint::CalculateDensities, 97, |i| {
            visited.lock().unwrap()[i] = true;
        })
        .unwrap();
        assert!(visited.into_inner().unwrap().iter().all(|&v| v));
    }

    #[test]
    fn uniform_block_is_pod() {
        let block = UniformBlock::zeroed();
        let bytes = bytemuck::bytes_of(&block);
        assert_eq!(bytes.len(), std::mem::size_of::<UniformBlock>());
    }
}
