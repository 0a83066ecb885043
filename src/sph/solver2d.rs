use std::time::{Duration, Instant};

use glam::Vec2;

use crate::error::{CoreError, CoreResult};
use crate::thread_pool::WorkerPool;

use super::config::FluidConfig;
use super::dispatch::{DispatchPoint, KernelBackend};
use super::kernels::KernelFactors2D;
use super::particle::SphParticle2D;
use super::spatial_hash::{
    bitonic_sort, compute_start_indices, hash_cell_2d, key_from_hash, SpatialLookup,
    SpatialLookupView,
};
use super::PREDICTION_LOOKAHEAD_SECS;

const EPS: f32 = 1e-9;

/// The 9 cell offsets (including the cell itself) a 2D density/pressure/
/// viscosity pass must visit, per spec.md §4.D ("9 (27 in 3D) neighbor
/// cells").
const NEIGHBOR_OFFSETS_2D_SELF: [(i32, i32); 9] = [
    (0, 0),
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

/// See `verlet::solver2d::RawParticles` for the safety contract. Used here
/// to hand each SPH pass's disjoint per-particle write its own mutable
/// reference while every other particle's pre-pass state is read from an
/// immutable snapshot captured before the pass began.
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

/// The 2D SPH fluid engine.
///
/// Advances N particles across a frame of duration `dt` by executing
/// `config.iterations_per_frame` substeps, each running the six-pass
/// external-forces / spatial-hash / density / pressure / viscosity /
/// integrate pipeline described in spec.md §4.D.
pub struct FluidSolver2D {
    config: FluidConfig,
    particles: Vec<SphParticle2D>,
    factors: KernelFactors2D,
    lookup: Vec<SpatialLookup>,
    start_indices: Vec<u32>,
    pool: WorkerPool,
    last_physics_time: Duration,
}

impl FluidSolver2D {
    pub fn new(config: FluidConfig) -> CoreResult<Self> {
        config.validate()?;
        let factors = KernelFactors2D::new(config.smoothing_radius);
        let pool = WorkerPool::new(config.worker_threads)?;
        Ok(Self {
            config,
            particles: Vec::new(),
            factors,
            lookup: Vec::new(),
            start_indices: Vec::new(),
            pool,
            last_physics_time: Duration::ZERO,
        })
    }

    pub fn particles(&self) -> &[SphParticle2D] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn last_physics_time(&self) -> Duration {
        self.last_physics_time
    }

    /// Adds a particle at `position` with initial `velocity`. SPH is a
    /// continuum method with no per-particle identity in the data model
    /// (spec.md §3); callers track any external identity/color mapping by
    /// index themselves.
    pub fn add_particle(&mut self, position: Vec2, velocity: Vec2) -> CoreResult<()> {
        if self.particles.len() >= self.config.max_particles {
            return Err(CoreError::CapacityExceeded {
                gx: position.x as i32,
                gy: position.y as i32,
                capacity: self.config.max_particles,
            });
        }
        let mut particle = SphParticle2D::new(position);
        particle.velocity = velocity;
        self.particles.push(particle);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.lookup.clear();
        self.start_indices.clear();
    }

    /// Advances the solver by a full frame of duration `dt`, internally
    /// subdivided into `config.iterations_per_frame` substeps of duration
    /// `dt * config.time_scale / iterations_per_frame`.
    pub fn step(&mut self, dt: f32) {
        let start = Instant::now();
        self.factors = KernelFactors2D::new(self.config.smoothing_radius);
        let sub_dt = dt * self.config.time_scale / self.config.iterations_per_frame as f32;
        for _ in 0..self.config.iterations_per_frame {
            self.substep(sub_dt);
        }
        self.last_physics_time = start.elapsed();
    }

    fn substep(&mut self, sub_dt: f32) {
        let n = self.particles.len();
        if n == 0 {
            self.lookup.clear();
            self.start_indices.clear();
            return;
        }

        // Pass 1: external forces (gravity, mouse interaction, soft
        // boundary repulsion), then predict position at the fixed
        // look-ahead used by every later pass in this substep.
        {
            let config = &self.config;
            let raw = RawParticles::new(&mut self.particles);
            let _ = self
                .pool
                .dispatch(DispatchPoint::ExternalForces, n, |i| {
                    let p = unsafe { raw.get_mut(i) };
                    let accel = external_acceleration_2d(p.position, config);
                    p.velocity += accel * sub_dt;
                    p.predicted_position = p.position + p.velocity * PREDICTION_LOOKAHEAD_SECS;
                });
        }

        // Pass 2: rebuild the sort-based spatial hash from predicted
        // positions.
        let predicted: Vec<Vec2> = self.particles.iter().map(|p| p.predicted_position).collect();
        self.rebuild_spatial_hash(&predicted);

        // Pass 3: densities.
        let h = self.config.smoothing_radius;
        {
            let factors = self.factors;
            let view = SpatialLookupView {
                lookup: &self.lookup,
                start_indices: &self.start_indices,
            };
            let raw = RawParticles::new(&mut self.particles);
            let _ = self
                .pool
                .dispatch(DispatchPoint::CalculateDensities, n, |i| {
                    let (density, near_density) =
                        compute_density_2d(i, &predicted, &view, &factors, h);
                    let p = unsafe { raw.get_mut(i) };
                    p.density = density;
                    p.near_density = near_density;
                });
        }

        // Pass 4: pressure forces.
        let densities: Vec<f32> = self.particles.iter().map(|p| p.density).collect();
        let near_densities: Vec<f32> = self.particles.iter().map(|p| p.near_density).collect();
        {
            let factors = self.factors;
            let config = &self.config;
            let view = SpatialLookupView {
                lookup: &self.lookup,
                start_indices: &self.start_indices,
            };
            let raw = RawParticles::new(&mut self.particles);
            let _ = self
                .pool
                .dispatch(DispatchPoint::CalculatePressureForces, n, |i| {
                    let accel = compute_pressure_force_2d(
                        i,
                        &predicted,
                        &densities,
                        &near_densities,
                        &view,
                        &factors,
                        config,
                        h,
                    );
                    let p = unsafe { raw.get_mut(i) };
                    p.pressure = config.pressure_multiplier * (densities[i] - config.target_density);
                    p.near_pressure = config.near_pressure_multiplier * near_densities[i];
                    p.velocity += accel * sub_dt;
                });
        }

        // Pass 5: viscosity.
        let velocities: Vec<Vec2> = self.particles.iter().map(|p| p.velocity).collect();
        {
            let factors = self.factors;
            let mu = self.config.viscosity_strength;
            let view = SpatialLookupView {
                lookup: &self.lookup,
                start_indices: &self.start_indices,
            };
            let raw = RawParticles::new(&mut self.particles);
            let _ = self
                .pool
                .dispatch(DispatchPoint::CalculateViscosity, n, |i| {
                    let mut delta = Vec2::ZERO;
                    let gx = (predicted[i].x / h).floor() as i32;
                    let gy = (predicted[i].y / h).floor() as i32;
                    for (dx, dy) in NEIGHBOR_OFFSETS_2D_SELF {
                        let key = key_from_hash(hash_cell_2d(gx + dx, gy + dy), n);
                        view.for_each_in_cell(key, |j| {
                            let j = j as usize;
                            if j == i {
                                return;
                            }
                            let r = (predicted[j] - predicted[i]).length();
                            if r < h {
                                delta += (velocities[j] - velocities[i]) * factors.viscosity(r, h);
                            }
                        });
                    }
                    let p = unsafe { raw.get_mut(i) };
                    p.velocity += delta * mu * sub_dt;
                });
        }

        // Pass 6: integrate + boundary.
        {
            let config = &self.config;
            let cap = config.velocity_cap(sub_dt);
            let raw = RawParticles::new(&mut self.particles);
            let _ = self
                .pool
                .dispatch(DispatchPoint::UpdatePositions, n, |i| {
                    let p = unsafe { raw.get_mut(i) };
                    if p.velocity.length() > cap {
                        p.velocity = p.velocity.normalize_or_zero() * cap;
                    }
                    p.position += p.velocity * sub_dt;
                    reflect_bounds_2d(p, config);
                    reflect_obstacle_2d(p, config);
                });
        }
    }

    fn rebuild_spatial_hash(&mut self, predicted: &[Vec2]) {
        let n = predicted.len();
        let h = self.config.smoothing_radius;
        self.lookup.clear();
        self.lookup.reserve(n);
        for (i, pos) in predicted.iter().enumerate() {
            let gx = (pos.x / h).floor() as i32;
            let gy = (pos.y / h).floor() as i32;
            let hash = hash_cell_2d(gx, gy);
            self.lookup.push(SpatialLookup {
                particle_index: i as u32,
                hash,
                cell_key: key_from_hash(hash, n),
            });
        }
        bitonic_sort(&mut self.lookup);
        self.start_indices = compute_start_indices(&self.lookup, n);
    }
}

fn external_acceleration_2d(position: Vec2, config: &FluidConfig) -> Vec2 {
    let mut accel = Vec2::new(0.0, -config.gravity);

    if config.interaction_radius > 0.0 {
        let mouse = Vec2::new(config.interaction_position[0], config.interaction_position[1]);
        let offset = mouse - position;
        let dist = offset.length();
        if dist < config.interaction_radius {
            let dir = if dist > EPS {
                offset / dist
            } else {
                Vec2::Y
            };
            accel += dir * config.interaction_strength * (1.0 - dist / config.interaction_radius);
        }
    }

    if config.boundary_force_multiplier > 0.0 {
        accel += soft_boundary_force_2d(position, config);
    }

    accel
}

fn soft_boundary_force_2d(position: Vec2, config: &FluidConfig) -> Vec2 {
    let mut accel = Vec2::ZERO;
    let d = config.boundary_force_distance;
    let mult = config.boundary_force_multiplier;
    let axes = [
        (position.x - config.bounds_min[0], Vec2::X),
        (config.bounds_max[0] - position.x, -Vec2::X),
        (position.y - config.bounds_min[1], Vec2::Y),
        (config.bounds_max[1] - position.y, -Vec2::Y),
    ];
    for (dist_to_wall, inward) in axes {
        if dist_to_wall < d {
            accel += inward * mult * (1.0 - dist_to_wall.max(0.0) / d);
        }
    }
    accel
}

fn compute_density_2d(
    i: usize,
    predicted: &[Vec2],
    view: &SpatialLookupView,
    factors: &KernelFactors2D,
    h: f32,
) -> (f32, f32) {
    let n = predicted.len();
    let gx = (predicted[i].x / h).floor() as i32;
    let gy = (predicted[i].y / h).floor() as i32;
    let mut density = 0.0;
    let mut near_density = 0.0;
    for (dx, dy) in NEIGHBOR_OFFSETS_2D_SELF {
        let key = key_from_hash(hash_cell_2d(gx + dx, gy + dy), n);
        view.for_each_in_cell(key, |j| {
            let r = (predicted[j as usize] - predicted[i]).length();
            if r < h {
                density += factors.density(r, h);
                near_density += factors.near_density(r, h);
            }
        });
    }
    (density, near_density)
}

#[allow(clippy::too_many_arguments)]
fn compute_pressure_force_2d(
    i: usize,
    predicted: &[Vec2],
    densities: &[f32],
    near_densities: &[f32],
    view: &SpatialLookupView,
    factors: &KernelFactors2D,
    config: &FluidConfig,
    h: f32,
) -> Vec2 {
    let n = predicted.len();
    let pressure_i = config.pressure_multiplier * (densities[i] - config.target_density);
    let near_pressure_i = config.near_pressure_multiplier * near_densities[i];

    let gx = (predicted[i].x / h).floor() as i32;
    let gy = (predicted[i].y / h).floor() as i32;
    let mut pressure_force = Vec2::ZERO;
    for (dx, dy) in NEIGHBOR_OFFSETS_2D_SELF {
        let key = key_from_hash(hash_cell_2d(gx + dx, gy + dy), n);
        view.for_each_in_cell(key, |j| {
            let j = j as usize;
            if j == i {
                return;
            }
            let offset = predicted[j] - predicted[i];
            let dist = offset.length();
            if dist >= h {
                return;
            }
            let dir = if dist > EPS { offset / dist } else { Vec2::Y };

            let pressure_j = config.pressure_multiplier * (densities[j] - config.target_density);
            let near_pressure_j = config.near_pressure_multiplier * near_densities[j];
            let shared_pressure = (pressure_i + pressure_j) * 0.5;
            let shared_near_pressure = (near_pressure_i + near_pressure_j) * 0.5;

            let density_j = densities[j].max(EPS);
            let near_density_j = near_densities[j].max(EPS);

            pressure_force += dir * factors.density_derivative(dist, h) * shared_pressure / density_j;
            pressure_force +=
                dir * factors.near_density_derivative(dist, h) * shared_near_pressure / near_density_j;
        });
    }
    pressure_force / densities[i].max(EPS)
}

fn reflect_bounds_2d(p: &mut SphParticle2D, config: &FluidConfig) {
    let r = config.particle_radius;
    let damping = config.collision_damping;
    if p.position.x - r < config.bounds_min[0] {
        p.position.x = config.bounds_min[0] + r;
        p.velocity.x *= -damping;
    } else if p.position.x + r > config.bounds_max[0] {
        p.position.x = config.bounds_max[0] - r;
        p.velocity.x *= -damping;
    }
    if p.position.y - r < config.bounds_min[1] {
        p.position.y = config.bounds_min[1] + r;
        p.velocity.y *= -damping;
    } else if p.position.y + r > config.bounds_max[1] {
        p.position.y = config.bounds_max[1] - r;
        p.velocity.y *= -damping;
    }
}

/// Treats the configured obstacle AABB as a second reflective boundary,
/// inflated outward by `particle_radius`, per the `obstacleSize`/
/// `obstacleCenter` supplement in `original_source/SPHFluid/3D/
/// GPUFluidSimulation.h` (SPEC_FULL.md §4.D). A no-op when the obstacle has
/// zero or negative extent on any axis (the default).
fn reflect_obstacle_2d(p: &mut SphParticle2D, config: &FluidConfig) {
    let min_x = config.obstacle_min[0] - config.particle_radius;
    let max_x = config.obstacle_max[0] + config.particle_radius;
    let min_y = config.obstacle_min[1] - config.particle_radius;
    let max_y = config.obstacle_max[1] + config.particle_radius;
    if max_x <= min_x || max_y <= min_y {
        return;
    }
    if p.position.x < min_x || p.position.x > max_x || p.position.y < min_y || p.position.y > max_y
    {
        return;
    }

    let penetration_x = (p.position.x - min_x).min(max_x - p.position.x);
    let penetration_y = (p.position.y - min_y).min(max_y - p.position.y);
    let damping = config.collision_damping;

    if penetration_x <= penetration_y {
        p.position.x = if p.position.x - min_x < max_x - p.position.x {
            min_x
        } else {
            max_x
        };
        p.velocity.x *= -damping;
    } else {
        p.position.y = if p.position.y - min_y < max_y - p.position.y {
            min_y
        } else {
            max_y
        };
        p.velocity.y *= -damping;
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn config() -> FluidConfig {
        FluidConfig {
            worker_threads: 2,
            ..FluidConfig::default()
        }
    }

    #[test]
    fn add_particle_respects_capacity() {
        let mut solver = FluidSolver2D::new(FluidConfig {
            max_particles: 1,
            worker_threads: 1,
            ..FluidConfig::default()
        })
        .unwrap();
        solver.add_particle(Vec2::ZERO, Vec2::ZERO).unwrap();
        let err = solver.add_particle(Vec2::ONE, Vec2::ZERO).unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded { .. }));
    }

    #[test]
    fn clear_empties_particles_and_hash_state() {
        let mut solver = FluidSolver2D::new(config()).unwrap();
        solver.add_particle(Vec2::ZERO, Vec2::ZERO).unwrap();
        solver.step(1.0 / 60.0);
        solver.clear();
        assert_eq!(solver.particle_count(), 0);
        assert!(solver.lookup.is_empty());
    }

    #[test]
    fn step_preserves_particle_count() {
        let mut solver = FluidSolver2D::new(config()).unwrap();
        for i in 0..64 {
            let x = (i % 8) as f32 * 0.2 - 0.8;
            let y = (i / 8) as f32 * 0.2 + 1.0;
            solver.add_particle(Vec2::new(x, y), Vec2::ZERO).unwrap();
        }
        for _ in 0..10 {
            solver.step(1.0 / 60.0);
        }
        assert_eq!(solver.particle_count(), 64);
    }

    fn build_lookup(predicted: &[Vec2], h: f32) -> (Vec<SpatialLookup>, Vec<u32>) {
        let n = predicted.len();
        let mut lookup: Vec<SpatialLookup> = predicted
            .iter()
            .enumerate()
            .map(|(i, pos)| {
                let gx = (pos.x / h).floor() as i32;
                let gy = (pos.y / h).floor() as i32;
                let hash = hash_cell_2d(gx, gy);
                SpatialLookup {
                    particle_index: i as u32,
                    hash,
                    cell_key: key_from_hash(hash, n),
                }
            })
            .collect();
        bitonic_sort(&mut lookup);
        let start_indices = compute_start_indices(&lookup, n);
        (lookup, start_indices)
    }

    /// Symmetry (spec.md §8 / SPEC_FULL.md): for a pair of particles placed
    /// symmetrically (equal densities by construction), the pressure-force
    /// contribution each exerts on the other should be near-antisymmetric:
    /// `‖force_ij + force_ji‖ < 1e-4 * max(‖force_ij‖, ‖force_ji‖, 1)`. This
    /// exercises the real asymmetric-looking `density_j`/`near_density_j`
    /// division in `compute_pressure_force_2d` directly, rather than
    /// assuming it cancels out.
    #[test]
    fn pairwise_pressure_force_is_nearly_antisymmetric() {
        let h = 0.35;
        let factors = KernelFactors2D::new(h);
        let fluid_config = FluidConfig {
            smoothing_radius: h,
            target_density: 20.0,
            worker_threads: 1,
            ..FluidConfig::default()
        };

        let predicted = vec![Vec2::new(-0.08, 0.0), Vec2::new(0.08, 0.0)];
        let (lookup, start_indices) = build_lookup(&predicted, h);
        let view = SpatialLookupView {
            lookup: &lookup,
            start_indices: &start_indices,
        };

        let densities: Vec<f32> = (0..2)
            .map(|i| compute_density_2d(i, &predicted, &view, &factors, h).0)
            .collect();
        let near_densities: Vec<f32> = (0..2)
            .map(|i| compute_density_2d(i, &predicted, &view, &factors, h).1)
            .collect();
        assert!(
            (densities[0] - densities[1]).abs() < 1e-5,
            "symmetric pair must have matched densities, got {densities:?}"
        );

        let force_0 = compute_pressure_force_2d(
            0, &predicted, &densities, &near_densities, &view, &factors, &fluid_config, h,
        );
        let force_1 = compute_pressure_force_2d(
            1, &predicted, &densities, &near_densities, &view, &factors, &fluid_config, h,
        );

        let sum = force_0 + force_1;
        let bound = 1e-4 * force_0.length().max(force_1.length()).max(1.0);
        assert!(
            sum.length() < bound,
            "force_0={force_0:?} force_1={force_1:?} |sum|={} exceeds bound {bound}",
            sum.length()
        );
    }
}
