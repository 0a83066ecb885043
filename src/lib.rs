//! Verlet particle collision, SPH fluid, and marching cubes cores for a
//! real-time simulation playground.
//!
//! This crate is a library with no binary target and no rendering,
//! windowing, or persistence concerns; callers supply those. See each
//! module for its own documentation.

pub mod error;
pub mod marching_cubes;
pub mod spatial_grid;
pub mod sph;
pub mod thread_pool;
pub mod verlet;

pub use error::{CoreError, CoreResult};
