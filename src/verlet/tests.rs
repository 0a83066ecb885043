#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Vector2};

    use crate::error::CoreError;
    use crate::verlet::{Particle2D, Solver2D, SolverConfig};

    fn small_solver() -> SolverConfig {
        SolverConfig {
            worker_threads: 2,
            max_particles: 4096,
            ..SolverConfig::default()
        }
    }

    /// Scenario 1 (spec.md §8): a single dropped particle settles to rest
    /// near the bottom wall within the expected tolerance.
    #[test]
    fn scenario_single_dropped_particle() {
        let mut solver = Solver2D::new(small_solver()).unwrap();
        solver
            .add_particle(Particle2D::new(0, Vector2::new(0.0, 5.0), 0.1))
            .unwrap();

        for _ in 0..60 {
            solver.step(1.0 / 60.0);
        }

        let p = solver.particles()[0];
        assert!(
            (-7.4..=-7.3).contains(&p.position.y),
            "expected y in [-7.4, -7.3], got {}",
            p.position.y
        );
        assert!(p.position.x.abs() < 1e-3, "expected |x| < 1e-3, got {}", p.position.x);

        for _ in 0..(9 * 60) {
            solver.step(1.0 / 60.0);
        }
        let p = solver.particles()[0];
        assert!(
            (p.position.y - (-7.4)).abs() < 0.05,
            "expected damped rest near -7.4, got {}",
            p.position.y
        );
    }

    /// Scenario 2 (spec.md §8): two overlapping particles at rest separate
    /// by at least the sum of their radii after one substep.
    #[test]
    fn scenario_two_particle_pair_separates() {
        let mut solver = Solver2D::new(small_solver()).unwrap();
        solver
            .add_particle(Particle2D::new(0, Vector2::new(-0.05, 0.0), 0.1))
            .unwrap();
        solver
            .add_particle(Particle2D::new(1, Vector2::new(0.05, 0.0), 0.1))
            .unwrap();

        solver.step(1.0 / 60.0 / 8.0); // one substep worth of frame time

        let particles = solver.particles();
        let dist = (particles[0].position - particles[1].position).magnitude();
        assert!(dist >= 0.19, "expected separation >= 0.19, got {dist}");
    }

    /// Scenario 3 (spec.md §8): a column of stacked particles collapses
    /// under gravity and spreads out, while staying within the world
    /// bounds.
    #[test]
    fn scenario_column_collapse_spreads_and_stays_bounded() {
        let config = small_solver();
        let mut solver = Solver2D::new(config.clone()).unwrap();

        for i in 0..100u32 {
            let y = i as f32 * 0.1;
            solver
                .add_particle(Particle2D::new(i, Vector2::new(0.0, y), 0.1))
                .unwrap();
        }

        for _ in 0..(3 * 60) {
            solver.step(1.0 / 60.0);
        }

        let mut min_x = f32::MAX;
        let mut max_x = f32::MIN;
        for p in solver.particles() {
            assert!(
                p.position.x >= config.bounds_min[0] + p.radius - 1e-4
                    && p.position.x <= config.bounds_max[0] - p.radius + 1e-4,
                "x out of bounds: {}",
                p.position.x
            );
            assert!(
                p.position.y >= config.bounds_min[1] + p.radius - 1e-4
                    && p.position.y <= config.bounds_max[1] - p.radius + 1e-4,
                "y out of bounds: {}",
                p.position.y
            );
            min_x = min_x.min(p.position.x);
            max_x = max_x.max(p.position.x);
        }
        assert!(max_x - min_x >= 2.0 * 0.1, "expected spread, got width {}", max_x - min_x);
    }

    /// No-overlap property (relaxed, spec.md §8): after a substep, no pair
    /// of particles overlaps by more than the 5% positional-relaxation
    /// slack.
    #[test]
    fn property_no_overlap_after_settling() {
        let mut solver = Solver2D::new(small_solver()).unwrap();
        for i in 0..30u32 {
            let x = (i % 10) as f32 * 0.3 - 1.5;
            let y = (i / 10) as f32 * 0.3 + 2.0;
            solver
                .add_particle(Particle2D::new(i, Vector2::new(x, y), 0.1))
                .unwrap();
        }
        for _ in 0..120 {
            solver.step(1.0 / 60.0);
        }

        let particles = solver.particles();
        for i in 0..particles.len() {
            for j in (i + 1)..particles.len() {
                let dist = (particles[i].position - particles[j].position).magnitude();
                let min_dist = (particles[i].radius + particles[j].radius) * 0.95;
                assert!(
                    dist >= min_dist - 1e-3,
                    "particles {i} and {j} overlap: dist {dist} < {min_dist}"
                );
            }
        }
    }

    /// `clear()` followed by re-adding the same particles reproduces the
    /// same starting state (spec.md §8 round-trip property).
    #[test]
    fn clear_then_repopulate_is_idempotent() {
        let mut solver = Solver2D::new(small_solver()).unwrap();
        solver
            .add_particle(Particle2D::new(0, Vector2::new(1.0, 2.0), 0.1))
            .unwrap();
        let before = solver.particles()[0];

        solver.clear();
        assert_eq!(solver.particle_count(), 0);

        solver
            .add_particle(Particle2D::new(0, Vector2::new(1.0, 2.0), 0.1))
            .unwrap();
        let after = solver.particles()[0];
        assert_eq!(before, after);
    }

    #[test]
    fn duplicate_identity_does_not_mutate_solver_state() {
        let mut solver = Solver2D::new(small_solver()).unwrap();
        solver
            .add_particle(Particle2D::new(0, Vector2::new(0.0, 0.0), 0.1))
            .unwrap();
        let err = solver
            .add_particle(Particle2D::new(0, Vector2::new(9.0, 9.0), 0.1))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateIdentity { id: 0 }));
        assert_eq!(solver.particle_count(), 1);
        assert_eq!(solver.particles()[0].position, Vector2::new(0.0, 0.0));
    }
}
