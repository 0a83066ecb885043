use cgmath::{Vector2, Vector3, Zero};

/// A single Verlet particle in 2D.
///
/// Velocity is implicit: `v = (position - previous_position) / dt`. There is
/// no independent velocity field; see spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle2D {
    pub position: Vector2<f32>,
    pub previous_position: Vector2<f32>,
    pub acceleration: Vector2<f32>,
    pub color: Vector3<f32>,
    pub radius: f32,
    pub grid_coord: (i32, i32),
    pub id: u32,
}

impl Particle2D {
    pub fn new(id: u32, position: Vector2<f32>, radius: f32) -> Self {
        Self {
            position,
            previous_position: position,
            acceleration: Vector2::zero(),
            color: Vector3::new(1.0, 1.0, 1.0),
            radius,
            grid_coord: (0, 0),
            id,
        }
    }

    /// Sets the implicit velocity by displacing `previous_position`,
    /// matching `particle.h`'s `setVelocity`.
    pub fn set_velocity(&mut self, velocity: Vector2<f32>, dt: f32) {
        self.previous_position = self.position - velocity * dt;
    }

    pub fn accelerate(&mut self, accel: Vector2<f32>) {
        self.acceleration += accel;
    }

    /// One Verlet integration substep: `position' = 2p - p_prev + a*dt^2`.
    pub fn integrate(&mut self, dt: f32) {
        let tmp = self.position;
        self.position = 2.0 * self.position - self.previous_position + self.acceleration * dt * dt;
        self.previous_position = tmp;
        self.acceleration = Vector2::zero();
    }

    pub fn velocity(&self, dt: f32) -> Vector2<f32> {
        if dt == 0.0 {
            Vector2::zero()
        } else {
            (self.position - self.previous_position) / dt
        }
    }
}

/// A single Verlet particle in 3D; the depth-aware sibling of `Particle2D`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle3D {
    pub position: Vector3<f32>,
    pub previous_position: Vector3<f32>,
    pub acceleration: Vector3<f32>,
    pub color: Vector3<f32>,
    pub radius: f32,
    pub grid_coord: (i32, i32, i32),
    pub id: u32,
}

impl Particle3D {
    pub fn new(id: u32, position: Vector3<f32>, radius: f32) -> Self {
        Self {
            position,
            previous_position: position,
            acceleration: Vector3::zero(),
            color: Vector3::new(1.0, 1.0, 1.0),
            radius,
            grid_coord: (0, 0, 0),
            id,
        }
    }

    pub fn set_velocity(&mut self, velocity: Vector3<f32>, dt: f32) {
        self.previous_position = self.position - velocity * dt;
    }

    pub fn accelerate(&mut self, accel: Vector3<f32>) {
        self.acceleration += accel;
    }

    pub fn integrate(&mut self, dt: f32) {
        let tmp = self.position;
        self.position = 2.0 * self.position - self.previous_position + self.acceleration * dt * dt;
        self.previous_position = tmp;
        self.acceleration = Vector3::zero();
    }

    pub fn velocity(&self, dt: f32) -> Vector3<f32> {
        if dt == 0.0 {
            Vector3::zero()
        } else {
            (self.position - self.previous_position) / dt
        }
    }
}
