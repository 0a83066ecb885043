/// Smoothed Particle Hydrodynamics fluid engine (2D and 3D).
///
/// Predictor-corrector integration over a sort-based spatial hash:
/// external forces, spatial-hash rebuild (bitonic sort), density,
/// pressure-force, viscosity, and integrate/boundary passes, each a
/// data-parallel dispatch over every particle. See spec.md §4.D.
mod config;
mod dispatch;
mod kernels;
mod particle;
mod solver2d;
mod solver3d;
mod spatial_hash;

pub use config::FluidConfig;
pub use dispatch::{DispatchPoint, KernelBackend, UniformBlock};
pub use particle::{SphParticle2D, SphParticle3D};
pub use solver2d::FluidSolver2D;
pub use solver3d::FluidSolver3D;
pub use spatial_hash::{bitonic_sort, next_power_of_two, SpatialLookup};

/// Fixed look-ahead constant used to compute `predicted_position` in pass
/// 1. A tuning constant independent of `sub_dt`, preserved exactly as the
/// source encodes it (spec.md §9 Open Questions #3).
pub const PREDICTION_LOOKAHEAD_SECS: f32 = 1.0 / 120.0;

#[cfg(test)]
mod tests;
