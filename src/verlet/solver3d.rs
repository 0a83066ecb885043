use std::collections::HashMap;
use std::time::{Duration, Instant};

use cgmath::{InnerSpace, Vector3};
use rand::Rng;

use crate::error::{CoreError, CoreResult};
use crate::spatial_grid::{BoundedCell, Grid3D};
use crate::thread_pool::WorkerPool;

use super::config::SolverConfig;
use super::particle::Particle3D;

/// See `solver2d::RawParticles` for the safety contract this mirrors.
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

/// The 3D Verlet particle collision solver, the depth-aware sibling of
/// `Solver2D`. Two-pass slicing partitions the grid's X columns (full Y/Z
/// extent per slice) instead of a single axis of a flat 2D grid.
pub struct Solver3D {
    config: SolverConfig,
    particles: Vec<Particle3D>,
    id_index: HashMap<u32, usize>,
    grid: Grid3D<Cell>,
    pool: WorkerPool,
    last_physics_time: Duration,
}

impl Solver3D {
    pub fn new(config: SolverConfig) -> CoreResult<Self> {
        config.validate()?;
        let (width, height, depth) = config.grid_dims_3d();
        if 2 * config.worker_threads > width {
            return Err(CoreError::InvalidConfig {
                reason: format!(
                    "worker_threads ({}) * 2 must be <= grid width ({width}); \
                     lower worker_threads or widen the bounds",
                    config.worker_threads
                ),
            });
        }
        let origin = (
            config.bounds_min[0],
            config.bounds_min[1],
            config.bounds_min[2],
        );
        let grid = Grid3D::new(width, height, depth, config.cell_size, origin);
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

    pub fn particles(&self) -> &[Particle3D] {
        &self.particles
    }

    pub fn last_physics_time(&self) -> Duration {
        self.last_physics_time
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn add_particle(&mut self, particle: Particle3D) -> CoreResult<()> {
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

    pub fn spawn_particle(
        &mut self,
        id: u32,
        position: Vector3<f32>,
        velocity: Vector3<f32>,
        radius: f32,
        dt_hint: f32,
    ) -> CoreResult<()> {
        let mut rng = rand::thread_rng();
        let jitter = Vector3::new(
            rng.gen_range(-0.01..=0.01),
            rng.gen_range(-0.01..=0.01),
            rng.gen_range(-0.01..=0.01),
        );
        let mut particle = Particle3D::new(id, position + jitter, radius);
        particle.set_velocity(velocity, dt_hint);
        self.add_particle(particle)
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.id_index.clear();
        self.grid.clear();
    }

    pub fn remove_unbounded(&mut self, margin: f32) {
        let min = self.config.bounds_min;
        let max = self.config.bounds_max;
        self.particles.retain(|p| {
            p.position.x >= min[0] - margin
                && p.position.x <= max[0] + margin
                && p.position.y >= min[1] - margin
                && p.position.y <= max[1] + margin
                && p.position.z >= min[2] - margin
                && p.position.z <= max[2] + margin
        });
        self.id_index.clear();
        for (index, particle) in self.particles.iter().enumerate() {
            self.id_index.insert(particle.id, index);
        }
    }

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
        let gravity = Vector3::new(0.0, -self.config.gravity, 0.0);
        let restitution = self.config.restitution;
        let bounds_min = Vector3::new(
            self.config.bounds_min[0],
            self.config.bounds_min[1],
            self.config.bounds_min[2],
        );
        let bounds_max = Vector3::new(
            self.config.bounds_max[0],
            self.config.bounds_max[1],
            self.config.bounds_max[2],
        );

        let count = self.particles.len();
        if count > 0 {
            let raw = RawParticles::new(&mut self.particles);

            let _ = self.pool.parallel_for(count, thread_count, |start, end| {
                for i in start..end {
                    unsafe { raw.get_mut(i) }.accelerate(gravity);
                }
            });

            let _ = self.pool.parallel_for(count, thread_count, |start, end| {
                for i in start..end {
                    unsafe { raw.get_mut(i) }.integrate(dt);
                }
            });

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

                    if p.position.z - p.radius < bounds_min.z {
                        p.position.z = bounds_min.z + p.radius;
                        p.previous_position.z = p.position.z + vel.z * restitution;
                    } else if p.position.z + p.radius > bounds_max.z {
                        p.position.z = bounds_max.z - p.radius;
                        p.previous_position.z = p.position.z + vel.z * restitution;
                    }
                }
            });
        }

        self.grid.clear();
        for (index, particle) in self.particles.iter_mut().enumerate() {
            let (gx, gy, gz) = self
                .grid
                .cell_coords((particle.position.x, particle.position.y, particle.position.z));
            particle.grid_coord = (gx, gy, gz);
            self.grid.insert(gx, gy, gz, index as u32);
        }

        self.solve_collisions();
    }

    fn solve_collisions(&mut self) {
        let thread_count = self.pool.thread_count();
        if thread_count == 0 {
            return;
        }
        let width = self.grid.width();
        let slice_count = thread_count * 2;
        let col_width = width / slice_count;
        if col_width == 0 {
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

        let _ = self.pool.parallel_for(thread_count, thread_count, |t, _| {
            let (start, end) = column_range(2 * t);
            process_columns(grid, &raw, response_factor, start, end);
        });
        let _ = self.pool.parallel_for(thread_count, thread_count, |t, _| {
            let (start, end) = column_range(2 * t + 1);
            process_columns(grid, &raw, response_factor, start, end);
        });
    }

    fn process_columns(&mut self, start_x: usize, end_x: usize) {
        let raw = RawParticles::new(&mut self.particles);
        process_columns(&self.grid, &raw, self.config.response_factor, start_x, end_x);
    }
}

fn process_columns(
    grid: &Grid3D<Cell>,
    raw: &RawParticles<Particle3D>,
    response_factor: f32,
    start_x: usize,
    end_x: usize,
) {
    let height = grid.height();
    let depth = grid.depth();
    for gz in 0..depth {
        for gy in 0..height {
            for gx in start_x..end_x {
                let cell = grid.cell(gx, gy, gz);
                if cell.is_empty() {
                    continue;
                }
                for i in 0..cell.len() {
                    for j in (i + 1)..cell.len() {
                        solve_pair(raw, response_factor, cell[i], cell[j]);
                    }
                }
                for neighbor_idx in grid.neighbor_indices(gx, gy, gz) {
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
}

fn solve_pair(raw: &RawParticles<Particle3D>, response_factor: f32, index_a: u32, index_b: u32) {
    if index_a == index_b {
        return;
    }
    const EPS: f32 = 1e-9;
    // Safety: see `solver2d::solve_pair`.
    let a = unsafe { raw.get_mut(index_a as usize) };
    let b_ptr: *mut Particle3D = unsafe { raw.get_mut(index_b as usize) };
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

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn config() -> SolverConfig {
        SolverConfig {
            worker_threads: 2,
            ..SolverConfig::default()
        }
    }

    #[test]
    fn add_particle_rejects_duplicate_identity() {
        let mut solver = Solver3D::new(config()).unwrap();
        solver
            .add_particle(Particle3D::new(1, Vector3::new(0.0, 0.0, 0.0), 0.1))
            .unwrap();
        let err = solver
            .add_particle(Particle3D::new(1, Vector3::new(1.0, 1.0, 1.0), 0.1))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateIdentity { id: 1 }));
    }
}
