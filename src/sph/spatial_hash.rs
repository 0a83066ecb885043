use bytemuck::{Pod, Zeroable};

/// One entry of the sort-based spatial hash: which particle, which raw
/// hash, and which (hash-mod-N) cell key it currently sorts under.
///
/// Grounded on `original_source/SPHFluid/3D/GPUFluidSimulation.h`'s
/// `SpatialLookup` struct (`particleIndex`, `hash`, `cellKey`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SpatialLookup {
    pub particle_index: u32,
    pub hash: u32,
    pub cell_key: u32,
}

impl SpatialLookup {
    pub const EMPTY: Self = Self {
        particle_index: u32::MAX,
        hash: u32::MAX,
        cell_key: u32::MAX,
    };
}

/// Smallest power of two `>= n` (`1` for `n <= 1`), used to size the
/// bitonic sort's compare-exchange dispatch grid per spec.md §4.D.
pub fn next_power_of_two(n: usize) -> usize {
    if n <= 1 {
        1
    } else {
        n.next_power_of_two()
    }
}

/// The three large primes `original_source`'s hash combine uses, one per
/// axis; `hash_cell_3d` reduces to this with the z term dropped.
const HASH_PRIME_X: u32 = 15823;
const HASH_PRIME_Y: u32 = 9_737_333;
const HASH_PRIME_Z: u32 = 440_817_757;

/// Combines a 2D integer cell coordinate into a raw spatial hash.
pub fn hash_cell_2d(gx: i32, gy: i32) -> u32 {
    (gx as u32).wrapping_mul(HASH_PRIME_X) ^ (gy as u32).wrapping_mul(HASH_PRIME_Y)
}

/// Combines a 3D integer cell coordinate into a raw spatial hash.
pub fn hash_cell_3d(gx: i32, gy: i32, gz: i32) -> u32 {
    (gx as u32)
        .wrapping_mul(HASH_PRIME_X)
        .wrapping_add((gy as u32).wrapping_mul(HASH_PRIME_Y))
        .wrapping_add((gz as u32).wrapping_mul(HASH_PRIME_Z))
}

/// Reduces a raw hash to a cell key in `[0, table_size)`.
pub fn key_from_hash(hash: u32, table_size: usize) -> u32 {
    if table_size == 0 {
        0
    } else {
        hash % table_size as u32
    }
}

/// Sorts `lookup` by `cell_key` ascending using Batcher's bitonic network,
/// staged as a double loop over `(stage, step)` exactly as
/// `original_source/SPHFluid/GPUSort.cpp::BitonicSort` drives its compute
/// dispatches: `groupWidth = 1 << (stage - step)`,
/// `groupHeight = 2 * groupWidth - 1`.
///
/// `lookup.len()` need not be a power of two: the network is sized to
/// `next_power_of_two(lookup.len())` compare-exchange work-items, and any
/// work-item whose high index would fall at or beyond `lookup.len()` is
/// skipped — equivalent to comparing against a `+inf` sentinel, the
/// standard technique for running a power-of-two sorting network over a
/// non-power-of-two array without padding the buffer itself.
pub fn bitonic_sort(lookup: &mut [SpatialLookup]) {
    let n = lookup.len();
    if n < 2 {
        return;
    }
    let n_padded = next_power_of_two(n);
    let num_stages = n_padded.trailing_zeros();

    for stage in 0..num_stages {
        for step in 0..=stage {
            let group_width = 1u32 << (stage - step);
            let group_height = 2 * group_width - 1;

            for i in 0..(n_padded as u32 / 2) {
                let h_index = i & (group_width - 1);
                let index_left = h_index + (group_height + 1) * (i / group_width);
                let right_step = if step == 0 {
                    group_height - 2 * h_index
                } else {
                    (group_height + 1) / 2
                };
                let index_right = index_left + right_step;

                if index_right as usize >= n {
                    continue;
                }
                if lookup[index_left as usize].cell_key > lookup[index_right as usize].cell_key {
                    lookup.swap(index_left as usize, index_right as usize);
                }
            }
        }
    }
}

/// Writes `start_indices[key] = i` for the first index `i` at which
/// `cell_key` changes (or `i == 0`); every other slot is left at the
/// sentinel `n` (no such key present). `lookup` must already be sorted by
/// `cell_key` (see `bitonic_sort`).
pub fn compute_start_indices(lookup: &[SpatialLookup], n: usize) -> Vec<u32> {
    let mut start = vec![n as u32; n];
    for (i, entry) in lookup.iter().enumerate() {
        let key = entry.cell_key as usize;
        if key >= n {
            continue;
        }
        if i == 0 || lookup[i - 1].cell_key != entry.cell_key {
            start[key] = i as u32;
        }
    }
    start
}

/// Non-owning view over a sorted lookup table plus its start-index array,
/// used by the density/pressure/viscosity passes to enumerate neighbors of
/// a given cell key without re-deriving the sort.
pub struct SpatialLookupView<'a> {
    pub lookup: &'a [SpatialLookup],
    pub start_indices: &'a [u32],
}

impl<'a> SpatialLookupView<'a> {
    /// Calls `visit(particle_index)` for every entry bucketed under `key`,
    /// scanning forward from `start_indices[key]` while the cell key still
    /// matches, per spec.md §3's sort-based spatial hash description.
    pub fn for_each_in_cell(&self, key: u32, mut visit: impl FnMut(u32)) {
        let n = self.lookup.len();
        let key_usize = key as usize;
        if key_usize >= self.start_indices.len() {
            return;
        }
        let mut i = self.start_indices[key_usize] as usize;
        while i < n && self.lookup[i].cell_key == key {
            visit(self.lookup[i].particle_index);
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn next_power_of_two_rounds_up() {
        assert_eq!(next_power_of_two(0), 1);
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(5), 8);
        assert_eq!(next_power_of_two(16), 16);
        assert_eq!(next_power_of_two(17), 32);
    }

    #[test]
    fn bitonic_sort_orders_by_cell_key() {
        let mut rng = rand::thread_rng();
        let mut lookup: Vec<SpatialLookup> = (0..137)
            .map(|i| SpatialLookup {
                particle_index: i,
                hash: 0,
                cell_key: rng.gen_range(0..50),
            })
            .collect();
        bitonic_sort(&mut lookup);
        for window in lookup.windows(2) {
            assert!(window[0].cell_key <= window[1].cell_key);
        }
    }

    #[test]
    fn bitonic_sort_handles_non_power_of_two_and_small_lengths() {
        for n in [0usize, 1, 2, 3, 7, 9, 33] {
            let mut lookup: Vec<SpatialLookup> = (0..n as u32)
                .map(|i| SpatialLookup {
                    particle_index: i,
                    hash: 0,
                    cell_key: (n as u32).wrapping_sub(i),
                })
                .collect();
            bitonic_sort(&mut lookup);
            for window in lookup.windows(2) {
                assert!(window[0].cell_key <= window[1].cell_key);
            }
        }
    }

    #[test]
    fn start_indices_point_to_first_occurrence() {
        let lookup = vec![
            SpatialLookup { particle_index: 0, hash: 0, cell_key: 0 },
            SpatialLookup { particle_index: 1, hash: 0, cell_key: 0 },
            SpatialLookup { particle_index: 2, hash: 0, cell_key: 2 },
            SpatialLookup { particle_index: 3, hash: 0, cell_key: 3 },
        ];
        let start = compute_start_indices(&lookup, 4);
        assert_eq!(start[0], 0);
        assert_eq!(start[1], 4);
        assert_eq!(start[2], 2);
        assert_eq!(start[3], 3);
    }
}
