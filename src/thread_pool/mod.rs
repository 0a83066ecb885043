/// Cooperative worker pool.
///
/// A fixed set of OS threads consuming a single FIFO task queue, used by
/// the Verlet solver's two-pass slice dispatch and offered as the CPU
/// `KernelBackend` for the SPH pipeline. Reimplemented directly (not backed
/// by `rayon`) because the collision solver's even/odd slice barriers need
/// exactly the join-per-dispatch shape a hand-rolled pool gives for free,
/// without a work-stealing scheduler reordering slices across the barrier.
mod handle;
mod pool;

pub use handle::TaskHandle;
pub use pool::WorkerPool;

#[cfg(test)]
mod tests;
