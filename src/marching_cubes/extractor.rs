use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::normals::gradient_normal_at_edge;
use super::tables::{EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};
use crate::error::{CoreError, CoreResult};

/// Corner offsets for the 8 cube corners, in the fixed vertex ordering
/// spec.md §3 draws out (bottom ring 0-1-2-3, top ring 4-5-6-7).
const CORNER_OFFSETS: [(i64, i64, i64); 8] = [
    (0, 0, 0),
    (1, 0, 0),
    (1, 1, 0),
    (0, 1, 0),
    (0, 0, 1),
    (1, 0, 1),
    (1, 1, 1),
    (0, 1, 1),
];

/// A mesh vertex produced only by the marching cubes extractor (spec.md
/// §3). Position and normal in world units, texture coordinate in
/// `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

/// Extraction-time parameters beyond the isosurface threshold itself.
///
/// `cell_size` scales grid-index space into world space (grid index
/// `(x, y, z)` samples world position `origin + (x, y, z) * cell_size`);
/// `origin` is the world position of sample `(0, 0, 0)`. Mirrors the
/// teacher's `sdf::ExtractionParams` shape (a plain-data params struct
/// threaded through every extraction call), with this crate's own fields
/// in place of the teacher's `smooth_iterations` / `normal_smooth_factor`
/// / `simplify_threshold`, which back a GPU smoothing pipeline this
/// crate's Non-goals exclude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractionParams {
    pub cell_size: f32,
    pub origin: [f32; 3],
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            origin: [0.0, 0.0, 0.0],
        }
    }
}

/// A scalar field sampler: dimensions plus a flat `x + y*X + z*X*Y`
/// lookup, matching `original_source/Marching Cubes/CubeMarching.cpp`'s
/// `scalarField[z][y][x]` indexing (here flattened, not nested vectors).
/// Implemented by an owned `ScalarField` (the CPU `Extractor`'s bound
/// field) and a borrowed `ScalarFieldView` (the data-parallel dispatch in
/// `parallel`, which samples directly from the caller's slice instead of
/// copying it per dispatch) so `triangulate_cell_in` doesn't care which
/// one it's given.
pub(super) trait FieldSampler {
    fn dims(&self) -> (usize, usize, usize);
    fn sample(&self, x: usize, y: usize, z: usize) -> f32;

    fn sample_clamped(&self, x: i64, y: i64, z: i64) -> f32 {
        let (dx, dy, dz) = self.dims();
        let cx = x.clamp(0, dx as i64 - 1) as usize;
        let cy = y.clamp(0, dy as i64 - 1) as usize;
        let cz = z.clamp(0, dz as i64 - 1) as usize;
        self.sample(cx, cy, cz)
    }
}

fn flat_index(dims: (usize, usize, usize), x: usize, y: usize, z: usize) -> usize {
    x + y * dims.0 + z * dims.0 * dims.1
}

/// A bound scalar field owning its samples, used by the CPU `Extractor`.
#[derive(Debug, Clone)]
pub(super) struct ScalarField {
    dims: (usize, usize, usize),
    samples: Vec<f32>,
}

impl FieldSampler for ScalarField {
    fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    fn sample(&self, x: usize, y: usize, z: usize) -> f32 {
        self.samples[flat_index(self.dims, x, y, z)]
    }
}

/// A borrowed scalar field view, used by the data-parallel dispatch so it
/// can sample the caller's slice directly without an owned copy.
pub(super) struct ScalarFieldView<'a> {
    dims: (usize, usize, usize),
    samples: &'a [f32],
}

impl<'a> ScalarFieldView<'a> {
    pub(super) fn new(dims: (usize, usize, usize), samples: &'a [f32]) -> Self {
        Self { dims, samples }
    }
}

impl FieldSampler for ScalarFieldView<'_> {
    fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    fn sample(&self, x: usize, y: usize, z: usize) -> f32 {
        self.samples[flat_index(self.dims, x, y, z)]
    }
}

/// The marching cubes isosurface extractor (CPU variant). See spec.md §4.E.
pub struct Extractor {
    field: Option<ScalarField>,
    params: ExtractionParams,
    vertices: Vec<Vertex>,
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            field: None,
            params: ExtractionParams::default(),
            vertices: Vec::new(),
        }
    }

    pub fn with_params(params: ExtractionParams) -> Self {
        Self {
            field: None,
            params,
            vertices: Vec::new(),
        }
    }

    pub fn params(&self) -> ExtractionParams {
        self.params
    }

    pub fn dims(&self) -> Option<(usize, usize, usize)> {
        self.field.as_ref().map(|f| f.dims())
    }

    /// Binds a 3D scalar array of size `dims.0 * dims.1 * dims.2`, flat
    /// in `x + y*X + z*X*Y` order. Fails with `FieldDimensionMismatch` if
    /// `samples.len()` doesn't match.
    pub fn set_field(&mut self, dims: (usize, usize, usize), samples: &[f32]) -> CoreResult<()> {
        let expected = dims.0 * dims.1 * dims.2;
        if samples.len() != expected {
            return Err(CoreError::FieldDimensionMismatch {
                dims,
                expected,
                actual: samples.len(),
            });
        }
        self.field = Some(ScalarField {
            dims,
            samples: samples.to_vec(),
        });
        Ok(())
    }

    /// Already-generated vertices, in triangle order, no deduplication
    /// (spec.md §4.E "Vertex stream").
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Clears any previously generated vertices without unbinding the
    /// field, mirroring `CubeMarching::clearMesh`.
    pub fn clear_mesh(&mut self) {
        self.vertices.clear();
    }

    /// Produces a vertex stream for the isosurface at `iso` across the
    /// entire bound field, replacing any previously generated vertices.
    /// Returns an empty stream if no field is bound or any dimension is
    /// `< 2` (spec.md §4.E Failure semantics).
    pub fn generate(&mut self, iso: f32) -> &[Vertex] {
        self.vertices.clear();
        let Some(field) = self.field.as_ref() else {
            return &self.vertices;
        };
        let (dx, dy, dz) = field.dims();
        if dx < 2 || dy < 2 || dz < 2 {
            return &self.vertices;
        }
        for z in 0..dz - 1 {
            for y in 0..dy - 1 {
                for x in 0..dx - 1 {
                    triangulate_into(field, &self.params, x, y, z, iso, &mut self.vertices);
                }
            }
        }
        &self.vertices
    }

    /// Appends triangles from a single cell at `(x, y, z)` to the
    /// existing vertex stream, without clearing it. Out-of-range cell
    /// indices are ignored (spec.md §4.E Failure semantics).
    pub fn triangulate_cell(&mut self, x: usize, y: usize, z: usize, iso: f32) {
        let Some(field) = self.field.as_ref() else {
            return;
        };
        let (dx, dy, dz) = field.dims();
        if x + 1 >= dx || y + 1 >= dy || z + 1 >= dz {
            return;
        }
        triangulate_into(field, &self.params, x, y, z, iso, &mut self.vertices);
    }

    /// Progressive generation: visits cells in raster order `(z, y, x)`
    /// from `(0,0,0)` up to and including `max`, reproducing the
    /// identical final mesh a bulk `generate` would, per spec.md's
    /// "Progressive equivalence" property. Replaces any previously
    /// generated vertices, matching `processUpToCell`'s own `isoLevel_`
    /// reset semantics.
    pub fn triangulate_region(&mut self, max: (usize, usize, usize), iso: f32) {
        self.vertices.clear();
        let Some(field) = self.field.as_ref() else {
            return;
        };
        let (dx, dy, dz) = field.dims();
        if dx < 2 || dy < 2 || dz < 2 {
            return;
        }
        let (max_x, max_y, max_z) = max;
        'outer: for z in 0..dz - 1 {
            if z > max_z {
                break;
            }
            for y in 0..dy - 1 {
                if z == max_z && y > max_y {
                    break 'outer;
                }
                for x in 0..dx - 1 {
                    if z == max_z && y == max_y && x > max_x {
                        break 'outer;
                    }
                    triangulate_into(field, &self.params, x, y, z, iso, &mut self.vertices);
                    if z == max_z && y == max_y && x == max_x {
                        break 'outer;
                    }
                }
            }
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

fn world_position(params: &ExtractionParams, x: i64, y: i64, z: i64) -> Vec3 {
    Vec3::new(
        params.origin[0] + x as f32 * params.cell_size,
        params.origin[1] + y as f32 * params.cell_size,
        params.origin[2] + z as f32 * params.cell_size,
    )
}

fn tex_coord(dims: (usize, usize, usize), x: i64, y: i64) -> Vec2 {
    let gx = (dims.0.max(2) - 1) as f32;
    let gy = (dims.1.max(2) - 1) as f32;
    Vec2::new(x as f32 / gx, y as f32 / gy)
}

/// Triangulates one cube cell and appends its vertices to `out`. Shared
/// by `generate`, `triangulate_cell`, `triangulate_region`, and the
/// data-parallel `parallel::dispatch`, which calls `triangulate_cell_in`
/// directly per work-item.
fn triangulate_into(
    field: &impl FieldSampler,
    params: &ExtractionParams,
    x: usize,
    y: usize,
    z: usize,
    iso: f32,
    out: &mut Vec<Vertex>,
) {
    out.extend(triangulate_cell_in(field, params, x, y, z, iso));
}

/// Corner indices for cell `(x, y, z)`, in grid-index space.
fn corner_coords(x: usize, y: usize, z: usize) -> [(i64, i64, i64); 8] {
    let mut out = [(0i64, 0i64, 0i64); 8];
    for (i, (ox, oy, oz)) in CORNER_OFFSETS.iter().enumerate() {
        out[i] = (x as i64 + ox, y as i64 + oy, z as i64 + oz);
    }
    out
}

/// Triangulates a single cube cell at grid coordinates `(x, y, z)`.
/// Pure function of the field and params: no `&mut self` state, so both
/// the CPU extractor and the data-parallel dispatch in `parallel` can
/// call it from any thread without synchronization, since every
/// work-item only reads the (shared, immutable) field.
pub(super) fn triangulate_cell_in(
    field: &impl FieldSampler,
    params: &ExtractionParams,
    x: usize,
    y: usize,
    z: usize,
    iso: f32,
) -> Vec<Vertex> {
    let dims = field.dims();
    let corners = corner_coords(x, y, z);
    let mut values = [0.0f32; 8];
    for (i, &(cx, cy, cz)) in corners.iter().enumerate() {
        values[i] = field.sample(cx as usize, cy as usize, cz as usize);
    }

    let config = cube_config_index(&values, iso);
    if config == 0 || config == 255 {
        return Vec::new();
    }

    let edge_mask = EDGE_TABLE[config];
    let mut edge_points: [Option<Vertex>; 12] = [None; 12];
    for edge in 0..12 {
        if edge_mask & (1 << edge) == 0 {
            continue;
        }
        let (ia, ib) = EDGE_CORNERS[edge];
        let a = values[ia];
        let b = values[ib];
        let denom = b - a;
        let t = if denom.abs() < 1e-6 {
            0.0
        } else {
            ((iso - a) / denom).clamp(0.0, 1.0)
        };

        let pa = world_position(params, corners[ia].0, corners[ia].1, corners[ia].2);
        let pb = world_position(params, corners[ib].0, corners[ib].1, corners[ib].2);
        let ta = tex_coord(dims, corners[ia].0, corners[ia].1);
        let tb = tex_coord(dims, corners[ib].0, corners[ib].1);

        let sample = |gx: i64, gy: i64, gz: i64| field.sample_clamped(gx, gy, gz);
        let normal = gradient_normal_at_edge(&sample, corners[ia], corners[ib], t);

        edge_points[edge] = Some(Vertex {
            position: pa + t * (pb - pa),
            normal,
            tex_coord: ta + t * (tb - ta),
        });
    }

    let row = &TRI_TABLE[config];
    let mut out = Vec::new();
    let mut i = 0;
    while i + 2 < row.len() && row[i] != -1 {
        out.push(edge_points[row[i] as usize].expect("edge flagged by edge_table"));
        out.push(edge_points[row[i + 1] as usize].expect("edge flagged by edge_table"));
        out.push(edge_points[row[i + 2] as usize].expect("edge flagged by edge_table"));
        i += 3;
    }
    out
}

/// Config index (spec.md §3): 8-bit bitmask of which corners are inside
/// the isosurface (`sample[i] < iso`).
fn cube_config_index(values: &[f32; 8], iso: f32) -> usize {
    let mut index = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v < iso {
            index |= 1 << i;
        }
    }
    index
}
