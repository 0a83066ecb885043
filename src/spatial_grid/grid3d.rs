use super::cell::CellStorage;

/// The 26 neighbor offsets of a 3D cell (every combination of `{-1,0,1}`
/// except `(0,0,0)`), the 3D generalization of `NEIGHBOR_OFFSETS_2D`.
pub fn neighbor_offsets_3d() -> [(i32, i32, i32); 26] {
    let mut offsets = [(0, 0, 0); 26];
    let mut i = 0;
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 && dz == 0 {
                    continue;
                }
                offsets[i] = (dx, dy, dz);
                i += 1;
            }
        }
    }
    offsets
}

/// A flat 3D uniform spatial grid, the depth-aware sibling of `Grid2D`.
#[derive(Clone)]
pub struct Grid3D<C: CellStorage> {
    width: usize,
    height: usize,
    depth: usize,
    cell_size: f32,
    origin: (f32, f32, f32),
    cells: Vec<C>,
}

impl<C: CellStorage> Grid3D<C> {
    pub fn new(
        width: usize,
        height: usize,
        depth: usize,
        cell_size: f32,
        origin: (f32, f32, f32),
    ) -> Self {
        assert!(
            width > 0 && height > 0 && depth > 0,
            "grid dimensions must be positive"
        );
        assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            width,
            height,
            depth,
            cell_size,
            origin,
            cells: vec![C::default(); width * height * depth],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    fn index(&self, gx: usize, gy: usize, gz: usize) -> usize {
        (gz * self.height + gy) * self.width + gx
    }

    pub fn cell_coords(&self, position: (f32, f32, f32)) -> (i32, i32, i32) {
        let rel_x = position.0 - self.origin.0;
        let rel_y = position.1 - self.origin.1;
        let rel_z = position.2 - self.origin.2;
        let gx = (rel_x / self.cell_size).floor() as i32;
        let gy = (rel_y / self.cell_size).floor() as i32;
        let gz = (rel_z / self.cell_size).floor() as i32;
        (
            gx.clamp(0, self.width as i32 - 1),
            gy.clamp(0, self.height as i32 - 1),
            gz.clamp(0, self.depth as i32 - 1),
        )
    }

    pub fn insert(&mut self, gx: i32, gy: i32, gz: i32, id: u32) -> bool {
        debug_assert!(gx >= 0 && (gx as usize) < self.width);
        debug_assert!(gy >= 0 && (gy as usize) < self.height);
        debug_assert!(gz >= 0 && (gz as usize) < self.depth);
        let idx = self.index(gx as usize, gy as usize, gz as usize);
        self.cells[idx].insert(id)
    }

    pub fn cell(&self, gx: usize, gy: usize, gz: usize) -> &[u32] {
        self.cells[self.index(gx, gy, gz)].as_slice()
    }

    pub fn contains(&self, gx: usize, gy: usize, gz: usize, id: u32) -> bool {
        self.cells[self.index(gx, gy, gz)].contains(id)
    }

    pub fn linear_index(&self, gx: usize, gy: usize, gz: usize) -> usize {
        self.index(gx, gy, gz)
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height * self.depth
    }

    pub fn neighbor_indices(
        &self,
        gx: usize,
        gy: usize,
        gz: usize,
    ) -> impl Iterator<Item = usize> + '_ {
        let (gx, gy, gz) = (gx as i32, gy as i32, gz as i32);
        neighbor_offsets_3d()
            .into_iter()
            .filter_map(move |(dx, dy, dz)| {
                let nx = gx + dx;
                let ny = gy + dy;
                let nz = gz + dz;
                if nx >= 0
                    && (nx as usize) < self.width
                    && ny >= 0
                    && (ny as usize) < self.height
                    && nz >= 0
                    && (nz as usize) < self.depth
                {
                    Some(self.index(nx as usize, ny as usize, nz as usize))
                } else {
                    None
                }
            })
    }

    pub fn cell_by_index(&self, index: usize) -> &[u32] {
        self.cells[index].as_slice()
    }
}
