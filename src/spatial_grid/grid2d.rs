use super::cell::CellStorage;

/// The 8 neighbor offsets used by the Verlet collision pass, in the order
/// `original_source/Collision System/Nsolver.cpp::processCellRange` visits
/// them: left, right, top, bottom, then the four diagonals.
pub const NEIGHBOR_OFFSETS_2D: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

/// A flat 2D uniform spatial grid over `[x_min, x_min + width*cell_size) x
/// [y_min, y_min + height*cell_size)`.
#[derive(Clone)]
pub struct Grid2D<C: CellStorage> {
    width: usize,
    height: usize,
    cell_size: f32,
    origin: (f32, f32),
    cells: Vec<C>,
}

impl<C: CellStorage> Grid2D<C> {
    pub fn new(width: usize, height: usize, cell_size: f32, origin: (f32, f32)) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be positive");
        assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            width,
            height,
            cell_size,
            origin,
            cells: vec![C::default(); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Resets all cell counts without releasing storage.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    fn index(&self, gx: usize, gy: usize) -> usize {
        gy * self.width + gx
    }

    /// Maps a world position to clamped grid coordinates.
    pub fn cell_coords(&self, position: (f32, f32)) -> (i32, i32) {
        let rel_x = position.0 - self.origin.0;
        let rel_y = position.1 - self.origin.1;
        let gx = (rel_x / self.cell_size).floor() as i32;
        let gy = (rel_y / self.cell_size).floor() as i32;
        (
            gx.clamp(0, self.width as i32 - 1),
            gy.clamp(0, self.height as i32 - 1),
        )
    }

    /// Inserts `id` into cell `(gx, gy)`. Both coordinates must be within
    /// bounds; out-of-range coordinates are a programming error and panic,
    /// matching the invariant that `rebuild` always clamps coordinates
    /// before calling this.
    pub fn insert(&mut self, gx: i32, gy: i32, id: u32) -> bool {
        debug_assert!(gx >= 0 && (gx as usize) < self.width);
        debug_assert!(gy >= 0 && (gy as usize) < self.height);
        let idx = self.index(gx as usize, gy as usize);
        self.cells[idx].insert(id)
    }

    pub fn cell(&self, gx: usize, gy: usize) -> &[u32] {
        self.cells[self.index(gx, gy)].as_slice()
    }

    pub fn contains(&self, gx: usize, gy: usize, id: u32) -> bool {
        self.cells[self.index(gx, gy)].contains(id)
    }

    /// Cell index as used for flat iteration and slice partitioning
    /// (`cell_linear_index(x, y) = y * width + x`).
    pub fn linear_index(&self, gx: usize, gy: usize) -> usize {
        self.index(gx, gy)
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Returns the non-empty neighbor cell indices (clamped to grid
    /// bounds) around `(gx, gy)`, in `NEIGHBOR_OFFSETS_2D` order.
    pub fn neighbor_indices(&self, gx: usize, gy: usize) -> impl Iterator<Item = usize> + '_ {
        let (gx, gy) = (gx as i32, gy as i32);
        NEIGHBOR_OFFSETS_2D.iter().filter_map(move |(dx, dy)| {
            let nx = gx + dx;
            let ny = gy + dy;
            if nx >= 0 && (nx as usize) < self.width && ny >= 0 && (ny as usize) < self.height {
                Some(self.index(nx as usize, ny as usize))
            } else {
                None
            }
        })
    }

    /// Returns the cell at a flat cell index.
    pub fn cell_by_index(&self, index: usize) -> &[u32] {
        self.cells[index].as_slice()
    }
}
