/// Marching cubes isosurface extractor (CPU and data-parallel variants).
///
/// Converts a sampled scalar field into a triangle mesh via per-voxel
/// triangulation against the 256-entry edge/triangle lookup tables
/// (spec.md §3, §4.E). Grounded on `original_source/Marching Cubes/
/// CubeMarching.h`'s operation surface (`calculateCubeIndex`,
/// `interpolateVertices`, `getTriangles`, `triangulateField`,
/// `processSingleCube`, `processUpToCell`), renamed to the idioms the
/// teacher's own `sdf` module uses for its extraction pipeline.
mod extractor;
mod normals;
pub mod parallel;
mod tables;

pub use extractor::{Extractor, ExtractionParams, Vertex};

#[cfg(test)]
mod tests;
