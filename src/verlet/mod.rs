/// Verlet particle collision solver (2D and 3D).
///
/// Fixed-substep position-based physics over a uniform spatial grid, with
/// two-pass parallel collision resolution dispatched across a
/// `thread_pool::WorkerPool`.
mod config;
mod particle;
mod solver2d;
mod solver3d;

pub use config::SolverConfig;
pub use particle::{Particle2D, Particle3D};
pub use solver2d::Solver2D;
pub use solver3d::Solver3D;

#[cfg(test)]
mod tests;
