/// Uniform spatial grid.
///
/// Maps particle positions to cell indices and enumerates same-cell and
/// neighbor-cell pairs. Parameterized over cell storage so that callers can
/// trade a hard capacity bound for cache-resident inner loops
/// (`BoundedCell`) against an unbounded correctness fallback
/// (`UnboundedCell`).
mod cell;
mod grid2d;
mod grid3d;

pub use cell::{BoundedCell, CellStorage, UnboundedCell, DEFAULT_CELL_CAPACITY};
pub use grid2d::Grid2D;
pub use grid3d::Grid3D;

#[cfg(test)]
mod tests;
