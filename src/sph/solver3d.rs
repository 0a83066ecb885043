use std::time::{Duration, Instant};

use glam::Vec3;

use crate::error::{CoreError, CoreResult};
use crate::thread_pool::WorkerPool;

use super::config::FluidConfig;
use super::dispatch::{DispatchPoint, KernelBackend};
use super::kernels::KernelFactors3D;
use super::particle::SphParticle3D;
use super::spatial_hash::{
    bitonic_sort, compute_start_indices, hash_cell_3d, key_from_hash, SpatialLookup,
    SpatialLookupView,
};
use super::PREDICTION_LOOKAHEAD_SECS;

const EPS: f32 = 1e-9;

/// The 27 cell offsets (including the cell itself) a 3D density/pressure/
/// viscosity pass must visit, per spec.md §4.D.
fn neighbor_offsets_3d_self() -> [(i32, i32, i32); 27] {
    let mut offsets = [(0, 0, 0); 27];
    let mut i = 1;
    offsets[0] = (0, 0, 0);
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

/// The 3D SPH fluid engine, the depth-aware sibling of `FluidSolver2D`.
pub struct FluidSolver3D {
    config: FluidConfig,
    particles: Vec<SphParticle3D>,
    factors: KernelFactors3D,
    lookup: Vec<SpatialLookup>,
    start_indices: Vec<u32>,
    pool: WorkerPool,
    last_physics_time: Duration,
}

impl FluidSolver3D {
    pub fn new(config: FluidConfig) -> CoreResult<Self> {
        config.validate()?;
        let factors = KernelFactors3D::new(config.smoothing_radius);
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

    pub fn particles(&self) -> &[SphParticle3D] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn last_physics_time(&self) -> Duration {
        self.last_physics_time
    }

    pub fn add_particle(&mut self, position: Vec3, velocity: Vec3) -> CoreResult<()> {
        if self.particles.len() >= self.config.max_particles {
            return Err(CoreError::CapacityExceeded {
                gx: position.x as i32,
                gy: position.y as i32,
                capacity: self.config.max_particles,
            });
        }
        let mut particle = SphParticle3D::new(position);
        particle.velocity = velocity;
        self.particles.push(particle);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.lookup.clear();
        self.start_indices.clear();
    }

    pub fn step(&mut self, dt: f32) {
        let start = Instant::now();
        self.factors = KernelFactors3D::new(self.config.smoothing_radius);
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
        let offsets = neighbor_offsets_3d_self();

        // Pass 1: external forces.
        {
            let config = &self.config;
            let raw = RawParticles::new(&mut self.particles);
            let _ = self
                .pool
                .dispatch(DispatchPoint::ExternalForces, n, |i| {
                    let p = unsafe { raw.get_mut(i) };
                    let accel = external_acceleration_3d(p.position, config);
                    p.velocity += accel * sub_dt;
                    p.predicted_position = p.position + p.velocity * PREDICTION_LOOKAHEAD_SECS;
                });
        }

        // Pass 2: rebuild spatial hash.
        let predicted: Vec<Vec3> = self.particles.iter().map(|p| p.predicted_position).collect();
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
                        compute_density_3d(i, &predicted, &view, &factors, h, &offsets);
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
                    let accel = compute_pressure_force_3d(
                        i,
                        &predicted,
                        &densities,
                        &near_densities,
                        &view,
                        &factors,
                        config,
                        h,
                        &offsets,
                    );
                    let p = unsafe { raw.get_mut(i) };
                    p.pressure = config.pressure_multiplier * (densities[i] - config.target_density);
                    p.near_pressure = config.near_pressure_multiplier * near_densities[i];
                    p.velocity += accel * sub_dt;
                });
        }

        // Pass 5: viscosity.
        let velocities: Vec<Vec3> = self.particles.iter().map(|p| p.velocity).collect();
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
                    let mut delta = Vec3::ZERO;
                    let (gx, gy, gz) = cell_coords_3d(predicted[i], h);
                    for (dx, dy, dz) in offsets {
                        let key = key_from_hash(hash_cell_3d(gx + dx, gy + dy, gz + dz), n);
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
                    reflect_bounds_3d(p, config);
                    reflect_obstacle_3d(p, config);
                });
        }
    }

    fn rebuild_spatial_hash(&mut self, predicted: &[Vec3]) {
        let n = predicted.len();
        let h = self.config.smoothing_radius;
        self.lookup.clear();
        self.lookup.reserve(n);
        for (i, pos) in predicted.iter().enumerate() {
            let (gx, gy, gz) = cell_coords_3d(*pos, h);
            let hash = hash_cell_3d(gx, gy, gz);
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

fn cell_coords_3d(position: Vec3, h: f32) -> (i32, i32, i32) {
    (
        (position.x / h).floor() as i32,
        (position.y / h).floor() as i32,
        (position.z / h).floor() as i32,
    )
}

fn external_acceleration_3d(position: Vec3, config: &FluidConfig) -> Vec3 {
    let mut accel = Vec3::new(0.0, -config.gravity, 0.0);

    if config.interaction_radius > 0.0 {
        let mouse = Vec3::from(config.interaction_position);
        let offset = mouse - position;
        let dist = offset.length();
        if dist < config.interaction_radius {
            let dir = if dist > EPS {
                offset / dist
            } else {
                Vec3::Y
            };
            accel += dir * config.interaction_strength * (1.0 - dist / config.interaction_radius);
        }
    }

    if config.boundary_force_multiplier > 0.0 {
        accel += soft_boundary_force_3d(position, config);
    }

    accel
}

fn soft_boundary_force_3d(position: Vec3, config: &FluidConfig) -> Vec3 {
    let mut accel = Vec3::ZERO;
    let d = config.boundary_force_distance;
    let mult = config.boundary_force_multiplier;
    let axes = [
        (position.x - config.bounds_min[0], Vec3::X),
        (config.bounds_max[0] - position.x, -Vec3::X),
        (position.y - config.bounds_min[1], Vec3::Y),
        (config.bounds_max[1] - position.y, -Vec3::Y),
        (position.z - config.bounds_min[2], Vec3::Z),
        (config.bounds_max[2] - position.z, -Vec3::Z),
    ];
    for (dist_to_wall, inward) in axes {
        if dist_to_wall < d {
            accel += inward * mult * (1.0 - dist_to_wall.max(0.0) / d);
        }
    }
    accel
}

fn compute_density_3d(
    i: usize,
    predicted: &[Vec3],
    view: &SpatialLookupView,
    factors: &KernelFactors3D,
    h: f32,
    offsets: &[(i32, i32, i32); 27],
) -> (f32, f32) {
    let n = predicted.len();
    let (gx, gy, gz) = cell_coords_3d(predicted[i], h);
    let mut density = 0.0;
    let mut near_density = 0.0;
    for (dx, dy, dz) in offsets {
        let key = key_from_hash(hash_cell_3d(gx + dx, gy + dy, gz + dz), n);
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
fn compute_pressure_force_3d(
    i: usize,
    predicted: &[Vec3],
    densities: &[f32],
    near_densities: &[f32],
    view: &SpatialLookupView,
    factors: &KernelFactors3D,
    config: &FluidConfig,
    h: f32,
    offsets: &[(i32, i32, i32); 27],
) -> Vec3 {
    let n = predicted.len();
    let pressure_i = config.pressure_multiplier * (densities[i] - config.target_density);
    let near_pressure_i = config.near_pressure_multiplier * near_densities[i];

    let (gx, gy, gz) = cell_coords_3d(predicted[i], h);
    let mut pressure_force = Vec3::ZERO;
    for (dx, dy, dz) in offsets {
        let key = key_from_hash(hash_cell_3d(gx + dx, gy + dy, gz + dz), n);
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
            let dir = if dist > EPS { offset / dist } else { Vec3::Y };

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

fn reflect_bounds_3d(p: &mut SphParticle3D, config: &FluidConfig) {
    let r = config.particle_radius;
    let damping = config.collision_damping;
    let min = config.bounds_min;
    let max = config.bounds_max;

    if p.position.x - r < min[0] {
        p.position.x = min[0] + r;
        p.velocity.x *= -damping;
    } else if p.position.x + r > max[0] {
        p.position.x = max[0] - r;
        p.velocity.x *= -damping;
    }
    if p.position.y - r < min[1] {
        p.position.y = min[1] + r;
        p.velocity.y *= -damping;
    } else if p.position.y + r > max[1] {
        p.position.y = max[1] - r;
        p.velocity.y *= -damping;
    }
    if p.position.z - r < min[2] {
        p.position.z = min[2] + r;
        p.velocity.z *= -damping;
    } else if p.position.z + r > max[2] {
        p.position.z = max[2] - r;
        p.velocity.z *= -damping;
    }
}

/// See `solver2d::reflect_obstacle_2d`; the 3D sibling adds a Z comparison.
fn reflect_obstacle_3d(p: &mut SphParticle3D, config: &FluidConfig) {
    let r = config.particle_radius;
    let min = [
        config.obstacle_min[0] - r,
        config.obstacle_min[1] - r,
        config.obstacle_min[2] - r,
    ];
    let max = [
        config.obstacle_max[0] + r,
        config.obstacle_max[1] + r,
        config.obstacle_max[2] + r,
    ];
    if max[0] <= min[0] || max[1] <= min[1] || max[2] <= min[2] {
        return;
    }
    if p.position.x < min[0]
        || p.position.x > max[0]
        || p.position.y < min[1]
        || p.position.y > max[1]
        || p.position.z < min[2]
        || p.position.z > max[2]
    {
        return;
    }

    let penetration = [
        (p.position.x - min[0]).min(max[0] - p.position.x),
        (p.position.y - min[1]).min(max[1] - p.position.y),
        (p.position.z - min[2]).min(max[2] - p.position.z),
    ];
    let damping = config.collision_damping;
    let axis = if penetration[0] <= penetration[1] && penetration[0] <= penetration[2] {
        0
    } else if penetration[1] <= penetration[2] {
        1
    } else {
        2
    };

    match axis {
        0 => {
            p.position.x = if p.position.x - min[0] < max[0] - p.position.x {
                min[0]
            } else {
                max[0]
            };
            p.velocity.x *= -damping;
        }
        1 => {
            p.position.y = if p.position.y - min[1] < max[1] - p.position.y {
                min[1]
            } else {
                max[1]
            };
            p.velocity.y *= -damping;
        }
        _ => {
            p.position.z = if p.position.z - min[2] < max[2] - p.position.z {
                min[2]
            } else {
                max[2]
            };
            p.velocity.z *= -damping;
        }
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
        let mut solver = FluidSolver3D::new(FluidConfig {
            max_particles: 1,
            worker_threads: 1,
            ..FluidConfig::default()
        })
        .unwrap();
        solver.add_particle(Vec3::ZERO, Vec3::ZERO).unwrap();
        let err = solver.add_particle(Vec3::ONE, Vec3::ZERO).unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded { .. }));
    }

    #[test]
    fn step_preserves_particle_count() {
        let mut solver = FluidSolver3D::new(config()).unwrap();
        for i in 0..64 {
            let x = (i % 4) as f32 * 0.2 - 0.4;
            let y = ((i / 4) % 4) as f32 * 0.2 + 1.0;
            let z = (i / 16) as f32 * 0.2 - 0.4;
            solver
                .add_particle(Vec3::new(x, y, z), Vec3::ZERO)
                .unwrap();
        }
        for _ in 0..5 {
            solver.step(1.0 / 60.0);
        }
        assert_eq!(solver.particle_count(), 64);
    }

    fn build_lookup(predicted: &[Vec3], h: f32) -> (Vec<SpatialLookup>, Vec<u32>) {
        let n = predicted.len();
        let mut lookup: Vec<SpatialLookup> = predicted
            .iter()
            .enumerate()
            .map(|(i, pos)| {
                let (gx, gy, gz) = cell_coords_3d(*pos, h);
                let hash = hash_cell_3d(gx, gy, gz);
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

    /// `reflect_obstacle_3d`'s axis selection must not panic when a
    /// penetration component is NaN (a degenerate obstacle/particle
    /// configuration that still passes `FluidConfig::validate`).
    #[test]
    fn reflect_obstacle_does_not_panic_on_nan_penetration() {
        let config = FluidConfig {
            obstacle_min: [-1.0, -1.0, -1.0],
            obstacle_max: [1.0, 1.0, 1.0],
            particle_radius: 0.1,
            ..FluidConfig::default()
        };
        // A NaN position component (e.g. from an upstream numerical blow-up)
        // still passes every bounds check below, since every comparison
        // against NaN is false; the axis-selection logic must still return
        // without panicking.
        let mut p = SphParticle3D::new(Vec3::new(f32::NAN, 0.0, 0.0));
        reflect_obstacle_3d(&mut p, &config);
    }

    /// Symmetry (spec.md §8 / SPEC_FULL.md), 3D sibling of the 2D test of
    /// the same name: a symmetric pair gives matched densities, so the
    /// `density_j`/`near_density_j` asymmetric division in
    /// `compute_pressure_force_3d` cancels out and the pairwise force stays
    /// near-antisymmetric.
    #[test]
    fn pairwise_pressure_force_is_nearly_antisymmetric() {
        let h = 0.35;
        let factors = KernelFactors3D::new(h);
        let offsets = neighbor_offsets_3d_self();
        let fluid_config = FluidConfig {
            smoothing_radius: h,
            target_density: 20.0,
            worker_threads: 1,
            ..FluidConfig::default()
        };

        let predicted = vec![Vec3::new(-0.08, 0.0, 0.0), Vec3::new(0.08, 0.0, 0.0)];
        let (lookup, start_indices) = build_lookup(&predicted, h);
        let view = SpatialLookupView {
            lookup: &lookup,
            start_indices: &start_indices,
        };

        let densities: Vec<f32> = (0..2)
            .map(|i| compute_density_3d(i, &predicted, &view, &factors, h, &offsets).0)
            .collect();
        let near_densities: Vec<f32> = (0..2)
            .map(|i| compute_density_3d(i, &predicted, &view, &factors, h, &offsets).1)
            .collect();
        assert!(
            (densities[0] - densities[1]).abs() < 1e-5,
            "symmetric pair must have matched densities, got {densities:?}"
        );

        let force_0 = compute_pressure_force_3d(
            0, &predicted, &densities, &near_densities, &view, &factors, &fluid_config, h,
            &offsets,
        );
        let force_1 = compute_pressure_force_3d(
            1, &predicted, &densities, &near_densities, &view, &factors, &fluid_config, h,
            &offsets,
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
