#[cfg(test)]
mod tests {
    use crate::spatial_grid::{BoundedCell, Grid2D, Grid3D, UnboundedCell};

    #[test]
    fn cell_coords_clamp_to_bounds() {
        let grid: Grid2D<UnboundedCell> = Grid2D::new(4, 4, 1.0, (0.0, 0.0));
        assert_eq!(grid.cell_coords((-5.0, -5.0)), (0, 0));
        assert_eq!(grid.cell_coords((100.0, 100.0)), (3, 3));
        assert_eq!(grid.cell_coords((1.5, 2.5)), (1, 2));
    }

    #[test]
    fn insert_then_clear_resets_without_shrinking() {
        let mut grid: Grid2D<UnboundedCell> = Grid2D::new(2, 2, 1.0, (0.0, 0.0));
        grid.insert(0, 0, 7);
        grid.insert(0, 0, 8);
        assert_eq!(grid.cell(0, 0), &[7, 8]);
        grid.clear();
        assert!(grid.cell(0, 0).is_empty());
        assert_eq!(grid.width(), 2);
        assert_eq!(grid.height(), 2);
    }

    #[test]
    fn bounded_cell_rejects_duplicates_and_drops_past_capacity() {
        let mut grid: Grid2D<BoundedCell<2>> = Grid2D::new(1, 1, 1.0, (0.0, 0.0));
        assert!(grid.insert(0, 0, 1));
        assert!(grid.insert(0, 0, 1)); // duplicate: no-op, still "succeeds"
        assert!(grid.insert(0, 0, 2));
        assert!(!grid.insert(0, 0, 3)); // past capacity: dropped
        assert_eq!(grid.cell(0, 0).len(), 2);
    }

    #[test]
    fn no_cell_contains_duplicate_identity() {
        let mut grid: Grid2D<UnboundedCell> = Grid2D::new(1, 1, 1.0, (0.0, 0.0));
        grid.insert(0, 0, 5);
        grid.insert(0, 0, 5);
        assert_eq!(grid.cell(0, 0), &[5]);
    }

    #[test]
    fn neighbor_indices_2d_excludes_out_of_range_and_self() {
        let grid: Grid2D<UnboundedCell> = Grid2D::new(3, 3, 1.0, (0.0, 0.0));
        let neighbors: Vec<usize> = grid.neighbor_indices(0, 0).collect();
        // Corner cell has exactly 3 valid neighbors (right, down, down-right).
        assert_eq!(neighbors.len(), 3);
        assert!(!neighbors.contains(&grid.linear_index(0, 0)));
    }

    #[test]
    fn neighbor_indices_3d_center_cell_has_26_neighbors() {
        let grid: Grid3D<UnboundedCell> = Grid3D::new(3, 3, 3, 1.0, (0.0, 0.0, 0.0));
        let neighbors: Vec<usize> = grid.neighbor_indices(1, 1, 1).collect();
        assert_eq!(neighbors.len(), 26);
    }

    #[test]
    fn grid_consistency_after_rebuild() {
        let mut grid: Grid2D<UnboundedCell> = Grid2D::new(10, 10, 1.0, (0.0, 0.0));
        let positions = [(0.5, 0.5), (5.2, 5.9), (9.9, 9.9)];
        for (i, pos) in positions.iter().enumerate() {
            let (gx, gy) = grid.cell_coords(*pos);
            grid.insert(gx, gy, i as u32);
        }
        for (i, pos) in positions.iter().enumerate() {
            let (gx, gy) = grid.cell_coords(*pos);
            assert!(grid.contains(gx as usize, gy as usize, i as u32));
        }
    }
}
