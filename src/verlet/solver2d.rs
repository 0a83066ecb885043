use std::collections::HashMap;
use std::time::{Duration, Instant};

use cgmath::{InnerSpace, Vector2};
use rand::Rng;

use crate::error::{CoreError, CoreResult};
use crate::spatial_grid::{BoundedCell, Grid2D};
use crate::thread_pool::WorkerPool;

use super::config::SolverConfig;
use super::particle::Particle2D;

/// A mutable view over a particle slice that lets disjoint index ranges be
/// handed to concurrently-running worker closures.
///
/// Safety precondition (never checked at runtime): every concurrent caller
/// must only touch indices that no other concurrently-running caller also
/// touches. The Verlet solver upholds this two ways: the accelerate/
/// integrate/wall passes split `[0, count)` into disjoint contiguous
/// ranges; the collision pass's even/odd column-slice dispatch guarantees
/// two concurrently-running slices never share a cell neighborhood (see
/// `Solver2D::solve_collisions`).
struct RawParticles<T> {
    ptr: *mut T,
    len: usize,
}

unsafe impl<T> Send for RawParticles<T> {}
unsafe impl<T> Sync for RawParticles<T> {}

impl<T> RawParticles<T> {
    fn new(slice: &mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
        }
    }

    /// # Safety
    /// `index` must be disjoint from every index touched by any other
    /// thread concurrently holding this `RawParticles`.
    unsafe fn get_mut(&self, index: usize) -> &mut T {
        debug_assert!(index < self.len);
        &mut *self.ptr.add(index)
    }
}

type Cell = BoundedCell;

/// The 2D Verlet particle collision solver.
///
/// Advances N particles across a frame of duration `dt` by executing
/// `config.iterations` substeps of size `dt / iterations`, each running the
/// accelerate / integrate / wall-reflect / rebuild-grid / collide pipeline
/// described in spec.md §4.C.
pub struct Solver2D {
    config: SolverConfig,
    particles: Vec<Particle2D>,
    id_index: HashMap<u32, usize>,
    grid: Grid2D<Cell>,
    pool: WorkerPool,
    last_physics_time: Duration,
}

impl Solver2D {
    pub fn new(config: SolverConfig) -> CoreResult<Self> {
        config.validate()?;
        let (width, height) = config.grid_dims_2d();
        if 2 * config.worker_threads > width {
            return Err(CoreError::InvalidConfig {
                reason: format!(
                    "worker_threads ({}) * 2 must be <= grid width ({width}); \
                     lower worker_threads or widen the bounds",
                    config.worker_threads
                ),
            });
        }
        let origin = (config.bounds_min[0], config.bounds_min[1]);
        let grid = Grid2D::new(width, height, config.cell_size, origin);
        let pool = WorkerPool::new(config.worker_threads)?;
        Ok(Self {
            config,
            particles: Vec::new(),
            id_index: HashMap::new(),
            grid,
            pool,
            last_physics_time: Duration::ZERO,
        })
    }

    pub fn particles(&self) -> &[Particle2D] {
        &self.particles
    }

    pub fn last_physics_time(&self) -> Duration {
        self.last_physics_time
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Adds a particle to the solver. Rejects without mutating state if the
    /// identity already exists or capacity is exceeded.
    pub fn add_particle(&mut self, particle: Particle2D) -> CoreResult<()> {
        if self.id_index.contains_key(&particle.id) {
            return Err(CoreError::DuplicateIdentity { id: particle.id as u64 });
        }
        if self.particles.len() >= self.config.max_particles {
            return Err(CoreError::CapacityExceeded {
                gx: particle.grid_coord.0,
                gy: particle.grid_coord.1,
                capacity: self.config.max_particles,
            });
        }
        let index = self.particles.len();
        self.id_index.insert(particle.id, index);
        self.particles.push(particle);
        Ok(())
    }

    /// Spawns and adds a particle at `position` with a small random jitter
    /// (±0.01 world units) so two particles spawned at the same nominal
    /// position don't trigger the `d^2 <= eps` degenerate collision case on
    /// the first substep. Mirrors `solver.cpp`'s `createBall`.
    pub fn spawn_particle(
        &mut self,
        id: u32,
        position: Vector2<f32>,
        velocity: Vector2<f32>,
        radius: f32,
        dt_hint: f32,
    ) -> CoreResult<()> {
        let mut rng = rand::thread_rng();
        let jitter = Vector2::new(
            rng.gen_range(-0.01..=0.01),
            rng.gen_range(-0.01..=0.01),
        );
        let mut particle = Particle2D::new(id, position + jitter, radius);
        particle.set_velocity(velocity, dt_hint);
        self.add_particle(particle)
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.id_index.clear();
        self.grid.clear();
    }

    /// Removes particles that have exited the world bounds by more than
    /// `margin`. Not called automatically by `step`; a host calls this on
    /// its own cadence (the source calls it every 300 frames), matching
    /// spec.md's "destroyed only by bulk clear" lifecycle invariant — this
    /// is itself a bulk operation, just a selective one.
    pub fn remove_unbounded(&mut self, margin: f32) {
        let min = self.config.bounds_min;
        let max = self.config.bounds_max;
        self.particles.retain(|p| {
            p.position.x >= min[0] - margin
                && p.position.x <= max[0] + margin
                && p.position.y >= min[1] - margin
                && p.position.y <= max[1] + margin
        });
        self.id_index.clear();
        for (index, particle) in self.particles.iter().enumerate() {
            self.id_index.insert(particle.id, index);
        }
    }

    /// Advances the solver by a full frame of duration `dt`, internally
    /// subdivided into `config.iterations` substeps. Caller is responsible
    /// for capping `dt` to avoid a spiral of death under frame stalls.
    pub fn step(&mut self, dt: f32) {
        let start = Instant::now();
        let sub_dt = dt / self.config.iterations as f32;
        for _ in 0..self.config.iterations {
            self.substep(sub_dt);
        }
        self.last_physics_time = start.elapsed();
    }

    fn substep(&mut self, dt: f32) {
        let thread_count = self.pool.thread_count();
        let gravity = Vector2::new(0.0, -self.config.gravity);
        let restitution = self.config.restitution;
        let bounds_min = Vector2::new(self.config.bounds_min[0], self.config.bounds_min[1]);
        let bounds_max = Vector2::new(self.config.bounds_max[0], self.config.bounds_max[1]);

        let count = self.particles.len();
        if count > 0 {
            let raw = RawParticles::new(&mut self.particles);

            // 1. Accelerate
            let _ = self.pool.parallel_for(count, thread_count, |start, end| {
                for i in start..end {
                    unsafe { raw.get_mut(i) }.accelerate(gravity);
                }
            });

            // 2. Integrate
            let _ = self.pool.parallel_for(count, thread_count, |start, end| {
                for i in start..end {
                    unsafe { raw.get_mut(i) }.integrate(dt);
                }
            });

            // 3. Wall reflection
            let _ = self.pool.parallel_for(count, thread_count, |start, end| {
                for i in start..end {
                    let p = unsafe { raw.get_mut(i) };
                    let vel = p.position - p.previous_position;

                    if p.position.x - p.radius < bounds_min.x {
                        p.position.x = bounds_min.x + p.radius;
                        p.previous_position.x = p.position.x + vel.x * restitution;
                    } else if p.position.x + p.radius > bounds_max.x {
                        p.position.x = bounds_max.x - p.radius;
                        p.previous_position.x = p.position.x + vel.x * restitution;
                    }

                    if p.position.y - p.radius < bounds_min.y {
                        p.position.y = bounds_min.y + p.radius;
                        p.previous_position.y = p.position.y + vel.y * restitution;
                    } else if p.position.y + p.radius > bounds_max.y {
                        p.position.y = bounds_max.y - p.radius;
                        p.previous_position.y = p.position.y + vel.y * restitution;
                    }
                }
            });
        }

        // 4. Rebuild grid (single-threaded)
        self.grid.clear();
        for (index, particle) in self.particles.iter_mut().enumerate() {
            let (gx, gy) = self.grid.cell_coords((particle.position.x, particle.position.y));
            particle.grid_coord = (gx, gy);
            self.grid.insert(gx, gy, index as u32);
        }

        // 5. Collide
        self.solve_collisions();
    }

    /// Two-pass parallel collision resolution: cell columns are partitioned
    /// into `2*T` contiguous vertical slices. Even-indexed slices run in
    /// parallel and join, then odd-indexed slices run in parallel and join.
    /// Because each slice is at least two cells wide and the passes are
    /// staggered, no two concurrently-running slices ever share a cell
    /// neighborhood.
    fn solve_collisions(&mut self) {
        let thread_count = self.pool.thread_count();
        if thread_count == 0 {
            return;
        }
        let width = self.grid.width();
        let slice_count = thread_count * 2;
        let col_width = width / slice_count;
        if col_width == 0 {
            // Grid too narrow for this many threads; fall back to a single
            // sequential pass (correctness over parallelism in this edge
            // case, which `new` already guards against by construction).
            self.process_columns(0, width);
            return;
        }

        let raw = RawParticles::new(&mut self.particles);
        let response_factor = self.config.response_factor;
        let grid = &self.grid;

        let column_range = |slice: usize| -> (usize, usize) {
            let start = slice * col_width;
            let end = if slice == slice_count - 1 {
                width
            } else {
                start + col_width
            };
            (start, end)
        };

        // Pass even: slices 0, 2, 4, ...
        let _ = self.pool.parallel_for(thread_count, thread_count, |t, _| {
            let (start, end) = column_range(2 * t);
            process_columns(grid, &raw, response_factor, start, end);
        });
        // Pass odd: slices 1, 3, 5, ...
        let _ = self.pool.parallel_for(thread_count, thread_count, |t, _| {
            let (start, end) = column_range(2 * t + 1);
            process_columns(grid, &raw, response_factor, start, end);
        });
    }

    /// Sequential fallback used only when the grid is too narrow to
    /// partition into `2*T` slices (see `solve_collisions`).
    fn process_columns(&mut self, start_x: usize, end_x: usize) {
        let raw = RawParticles::new(&mut self.particles);
        process_columns(&self.grid, &raw, self.config.response_factor, start_x, end_x);
    }
}

fn process_columns(
    grid: &Grid2D<Cell>,
    raw: &RawParticles<Particle2D>,
    response_factor: f32,
    start_x: usize,
    end_x: usize,
) {
    let height = grid.height();
    for gy in 0..height {
        for gx in start_x..end_x {
            let cell = grid.cell(gx, gy);
            if cell.is_empty() {
                continue;
            }
            // (i) intra-cell pairs, i < j
            for i in 0..cell.len() {
                for j in (i + 1)..cell.len() {
                    solve_pair(raw, response_factor, cell[i], cell[j]);
                }
            }
            // (ii) pairs against each of the 8 neighbor cells
            for neighbor_idx in grid.neighbor_indices(gx, gy) {
                let neighbor = grid.cell_by_index(neighbor_idx);
                for &a in cell {
                    for &b in neighbor {
                        solve_pair(raw, response_factor, a, b);
                    }
                }
            }
        }
    }
}

/// Resolves a single collision pair by direct positional correction.
/// `d^2 <= eps` pairs are left untouched (no normal direction is defined);
/// the next integration step separates coincident particles via numerical
/// noise introduced by spawner jitter.
fn solve_pair(raw: &RawParticles<Particle2D>, response_factor: f32, index_a: u32, index_b: u32) {
    if index_a == index_b {
        return;
    }
    const EPS: f32 = 1e-9;
    // Safety: `index_a` and `index_b` are distinct indices into the same
    // particle array; this pair's write is disjoint from every other pair
    // resolved concurrently under the even/odd slice partitioning.
    let a = unsafe { raw.get_mut(index_a as usize) };
    let b_ptr: *mut Particle2D = unsafe { raw.get_mut(index_b as usize) };
    let b = unsafe { &mut *b_ptr };

    let delta = b.position - a.position;
    let dist_sq = delta.magnitude2();
    let min_dist = a.radius + b.radius;

    if dist_sq < min_dist * min_dist && dist_sq > EPS {
        let dist = dist_sq.sqrt();
        let normal = delta / dist;
        let overlap = 0.5 * (min_dist - dist) * response_factor;
        a.position -= normal * overlap;
        b.position += normal * overlap;
    }
}
