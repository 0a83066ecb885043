use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Configuration for an SPH fluid solver. All fields are part of the
/// public surface (spec.md §4.D's configuration table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluidConfig {
    /// Body acceleration applied to every particle (downward magnitude).
    pub gravity: f32,
    /// SPH kernel support radius `h`; spatial cells have side `h`.
    pub smoothing_radius: f32,
    /// Rest density used for pressure, `rho_0`.
    pub target_density: f32,
    /// Gas constant for main pressure, `k`.
    pub pressure_multiplier: f32,
    /// Strong short-range repulsion coefficient, `k_near`.
    pub near_pressure_multiplier: f32,
    /// Laplacian viscosity weight, `mu`.
    pub viscosity_strength: f32,
    /// Restitution against the world AABB on the integrate/boundary pass.
    pub collision_damping: f32,
    /// Lower corner of the simulation AABB.
    pub bounds_min: [f32; 3],
    /// Upper corner of the simulation AABB.
    pub bounds_max: [f32; 3],
    /// Substep count per `step(dt)` call.
    pub iterations_per_frame: u32,
    /// Scales the substep duration independent of `iterations_per_frame`.
    pub time_scale: f32,
    /// Upper bound on live particle count.
    pub max_particles: usize,
    /// Number of worker threads backing the solver's CPU `KernelBackend`.
    pub worker_threads: usize,
    /// Particle render/collision radius used only to inflate the boundary
    /// pass's reflective walls inward (spec.md §4.D pass 6); SPH itself is
    /// a continuum method with no per-particle collision radius, so this
    /// is a single solver-wide scalar rather than a per-particle field.
    pub particle_radius: f32,

    /// Optional user interaction field (spec.md §4.D "mouse
    /// attract/repel"). `strength` is signed: positive attracts, negative
    /// repels. `radius <= 0` disables the field.
    pub interaction_position: [f32; 3],
    pub interaction_radius: f32,
    pub interaction_strength: f32,

    /// Soft boundary repulsion supplement (from `original_source/SPHFluid/
    /// 3D/GPUFluidSimulation.h`'s `boundaryForceMultiplier` /
    /// `boundaryForceDistance`). Disabled by default (multiplier 0.0) so it
    /// does not perturb the dam-break scenario.
    pub boundary_force_multiplier: f32,
    pub boundary_force_distance: f32,

    /// Optional axis-aligned obstacle inside the bounds, treated as a
    /// second reflective boundary in the integrate/boundary pass. Disabled
    /// by default (zero size).
    pub obstacle_min: [f32; 3],
    pub obstacle_max: [f32; 3],
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            smoothing_radius: 0.35,
            target_density: 55.0,
            pressure_multiplier: 500.0,
            near_pressure_multiplier: 18.0,
            viscosity_strength: 0.06,
            collision_damping: 0.95,
            bounds_min: [-10.0, -7.0, -10.0],
            bounds_max: [10.0, 7.0, 10.0],
            iterations_per_frame: 4,
            time_scale: 1.0,
            max_particles: 65536,
            worker_threads: num_cpus::get().max(1),
            particle_radius: 0.05,
            interaction_position: [0.0, 0.0, 0.0],
            interaction_radius: 0.0,
            interaction_strength: 0.0,
            boundary_force_multiplier: 0.0,
            boundary_force_distance: 0.4,
            obstacle_min: [0.0, 0.0, 0.0],
            obstacle_max: [0.0, 0.0, 0.0],
        }
    }
}

impl FluidConfig {
    pub(crate) fn validate(&self) -> CoreResult<()> {
        if self.smoothing_radius <= 0.0 {
            return Err(CoreError::InvalidConfig {
                reason: "smoothing_radius must be positive".to_string(),
            });
        }
        if self.iterations_per_frame == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "iterations_per_frame must be >= 1".to_string(),
            });
        }
        for axis in 0..3 {
            if self.bounds_max[axis] <= self.bounds_min[axis] {
                return Err(CoreError::InvalidConfig {
                    reason: format!("bounds_max[{axis}] must exceed bounds_min[{axis}]"),
                });
            }
        }
        if self.worker_threads == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "worker_threads must be >= 1".to_string(),
            });
        }
        if self.max_particles == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "max_particles must be >= 1".to_string(),
            });
        }
        if !self.gravity.is_finite() || !self.time_scale.is_finite() {
            return Err(CoreError::InvalidConfig {
                reason: "gravity and time_scale must be finite".to_string(),
            });
        }
        if self.particle_radius < 0.0 {
            return Err(CoreError::InvalidConfig {
                reason: "particle_radius must be non-negative".to_string(),
            });
        }
        Ok(())
    }

    /// Per-step velocity cap, `0.8 * cell_size / sub_dt`, used to clamp
    /// numerical blow-ups per spec.md §4.D.
    pub(crate) fn velocity_cap(&self, sub_dt: f32) -> f32 {
        if sub_dt <= 0.0 {
            f32::INFINITY
        } else {
            0.8 * self.smoothing_radius / sub_dt
        }
    }
}

#[cfg(test)]
mod serde_tests {
    use super::FluidConfig;

    #[test]
    fn round_trips_through_json() {
        let config = FluidConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: FluidConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.smoothing_radius, restored.smoothing_radius);
        assert_eq!(config.target_density, restored.target_density);
        assert_eq!(config.bounds_max, restored.bounds_max);
    }
}
