use arrayvec::ArrayVec;

/// Default bounded-cell capacity. Matches the source's
/// `CollisionCell::CELL_CAPACITY`; chosen because `cell_size >= 2 * r_max`
/// keeps the expected per-cell population well under 16 for typical
/// particle radii.
pub const DEFAULT_CELL_CAPACITY: usize = 16;

/// A single cell's particle-index storage.
///
/// No cell of either variant ever contains duplicates of the same
/// identity; `insert` is a no-op if the id is already present.
pub trait CellStorage: Default + Clone {
    fn insert(&mut self, id: u32) -> bool;
    fn clear(&mut self);
    fn as_slice(&self) -> &[u32];
    fn contains(&self, id: u32) -> bool {
        self.as_slice().contains(&id)
    }
    fn len(&self) -> usize {
        self.as_slice().len()
    }
    fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Fixed-capacity cell storage. Insertions past `K` are silently dropped,
/// matching `CollisionCell::addParticle`'s bounds check in
/// `original_source/Collision System/grid.h`. In debug builds a dropped
/// insertion is also logged so the condition isn't silently swallowed
/// during development, per spec.md's note that `CapacityExceeded` "must be
/// surfaced to the user as a diagnostic".
#[derive(Clone, Default)]
pub struct BoundedCell<const K: usize = DEFAULT_CELL_CAPACITY> {
    entries: ArrayVec<u32, K>,
}

impl<const K: usize> CellStorage for BoundedCell<K> {
    fn insert(&mut self, id: u32) -> bool {
        if self.entries.contains(&id) {
            return true;
        }
        if self.entries.try_push(id).is_err() {
            if cfg!(debug_assertions) {
                log::warn!("spatial grid cell exceeded capacity {K}, dropping insertion of {id}");
            }
            return false;
        }
        true
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn as_slice(&self) -> &[u32] {
        &self.entries
    }
}

/// Dynamically-growing cell storage. Never drops an insertion; the
/// correctness fallback named in spec.md's Design Notes when populations
/// per cell are uncertain.
#[derive(Clone, Default)]
pub struct UnboundedCell {
    entries: Vec<u32>,
}

impl CellStorage for UnboundedCell {
    fn insert(&mut self, id: u32) -> bool {
        if self.entries.contains(&id) {
            return true;
        }
        self.entries.push(id);
        true
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn as_slice(&self) -> &[u32] {
        &self.entries
    }
}
