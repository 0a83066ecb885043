use std::sync::atomic::{AtomicUsize, Ordering};

use super::extractor::{triangulate_cell_in, ExtractionParams};
use super::Vertex;
use crate::error::{CoreError, CoreResult};
use crate::thread_pool::WorkerPool;

/// Upper bound on triangles a single marching-cubes cell can emit. The
/// 256-entry triangle table never produces more than 5 triangles for any
/// configuration index, so this is an exact bound, not a heuristic.
const MAX_TRIANGLES_PER_CELL: usize = 5;

/// A fixed-capacity, write-once vertex buffer that concurrently-running
/// work-items reserve disjoint slots in via an atomic counter, mirroring
/// the GPU "atomic counter reserving triangle slots" mechanism spec.md
/// §4.E's data-parallel dispatch describes. Reservation never races:
/// `fetch_add` hands each work-item a unique `[offset, offset+n)` range,
/// so two work-items can never write the same slot, the same disjoint-
/// write-by-index discipline `RawParticles` uses elsewhere in this crate
/// (see `verlet::solver2d::RawParticles`).
struct SlotBuffer {
    ptr: *mut Vertex,
    capacity: usize,
    cursor: AtomicUsize,
}

unsafe impl Send for SlotBuffer {}
unsafe impl Sync for SlotBuffer {}

impl SlotBuffer {
    /// # Safety
    /// `vertices` must stay allocated and untouched by any other writer
    /// for the lifetime of this `SlotBuffer`, and every slot in
    /// `0..capacity` must be written by exactly one work-item before the
    /// buffer is read.
    unsafe fn new(vertices: &mut [Vertex]) -> Self {
        Self {
            ptr: vertices.as_mut_ptr(),
            capacity: vertices.len(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Reserves `n` contiguous slots and writes `items` into them. Drops
    /// (and logs) any write that would exceed `capacity` — this can only
    /// happen if `MAX_TRIANGLES_PER_CELL` undercounts, which would be a
    /// bug in the triangle table, not a runtime condition to recover
    /// from silently.
    fn reserve_and_write(&self, items: &[Vertex]) {
        if items.is_empty() {
            return;
        }
        let offset = self.cursor.fetch_add(items.len(), Ordering::Relaxed);
        if offset + items.len() > self.capacity {
            log::error!(
                "marching cubes atomic counter overran its buffer: offset {offset} + {} > capacity {}",
                items.len(),
                self.capacity
            );
            return;
        }
        for (i, vertex) in items.iter().enumerate() {
            // SAFETY: `offset..offset+items.len()` was exclusively
            // reserved by this call's `fetch_add`, so no other work-item
            // writes these slots concurrently.
            unsafe {
                std::ptr::write(self.ptr.add(offset + i), *vertex);
            }
        }
    }

    fn len(&self) -> usize {
        self.cursor.load(Ordering::Relaxed).min(self.capacity)
    }
}

/// Data-parallel marching cubes dispatch (spec.md §4.E "Data-parallel
/// dispatch"): each work-item handles one cell, writing its triangles
/// into an append-only stream via an atomic slot counter. Backed by
/// `WorkerPool::parallel_for` rather than an actual GPU compute pipeline
/// (see SPEC_FULL.md's "Non-goals carried forward" discussion) — the
/// dispatch contract (one work-item per cell, atomic counter reservation,
/// a barrier before the result is read) is the same either way.
///
/// Returns an empty stream if any dimension is `< 2`, matching
/// `Extractor::generate`'s failure semantics. Fails with
/// `FieldDimensionMismatch` if `samples.len()` doesn't match `dims`.
pub fn dispatch(
    pool: &WorkerPool,
    dims: (usize, usize, usize),
    samples: &[f32],
    params: &ExtractionParams,
    iso: f32,
) -> CoreResult<Vec<Vertex>> {
    let (dx, dy, dz) = dims;
    let expected = dx * dy * dz;
    if samples.len() != expected {
        return Err(CoreError::FieldDimensionMismatch {
            dims,
            expected,
            actual: samples.len(),
        });
    }
    if dx < 2 || dy < 2 || dz < 2 {
        return Ok(Vec::new());
    }

    let field = super::extractor::ScalarFieldView::new(dims, samples);
    let cell_count = (dx - 1) * (dy - 1) * (dz - 1);
    let mut buffer = vec![
        Vertex {
            position: glam::Vec3::ZERO,
            normal: glam::Vec3::ZERO,
            tex_coord: glam::Vec2::ZERO,
        };
        cell_count * MAX_TRIANGLES_PER_CELL * 3
    ];
    // SAFETY: `buffer` is owned by this call and not touched again until
    // every dispatched work-item has joined (`parallel_for` is a full
    // barrier), and each cell index below maps to a distinct `fetch_add`
    // reservation, never the same slot twice.
    let slots = unsafe { SlotBuffer::new(&mut buffer) };

    let threads = pool.thread_count();
    pool.parallel_for(cell_count, threads, |start, end| {
        for flat in start..end {
            let x = flat % (dx - 1);
            let y = (flat / (dx - 1)) % (dy - 1);
            let z = flat / ((dx - 1) * (dy - 1));
            let triangles = triangulate_cell_in(&field, params, x, y, z, iso);
            slots.reserve_and_write(&triangles);
        }
    })?;

    let written = slots.len();
    buffer.truncate(written);
    Ok(buffer)
}
