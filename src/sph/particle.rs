use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// SPH particle (2D), GPU-buffer-shaped.
///
/// Struct layout mirrors `original_source/SPHFluid/2D/GPUFluidSimulation.h`'s
/// `GPUParticle`: padded so the struct size is a multiple of 16 bytes, the
/// way std430 layout requires. This crate never uploads the struct to a
/// GPU (see SPEC_FULL.md's Non-goals discussion), but the layout is kept
/// because it is part of the public data-parallel kernel boundary
/// contract (spec.md §6).
///
/// Identity, color, and render radius are deliberately *not* part of this
/// struct — the original `GPUParticle` carries none of them either, since
/// SPH is a continuum method with no per-particle collision radius, and
/// color is host-side metadata the solver never reads. They live in
/// parallel arrays on `FluidSolver2D`/`FluidSolver3D`, indexed by particle
/// slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SphParticle2D {
    pub position: Vec2,
    pub velocity: Vec2,
    pub predicted_position: Vec2,
    pub density: f32,
    pub near_density: f32,
    pub pressure: f32,
    pub near_pressure: f32,
    _pad: [f32; 2],
}

impl SphParticle2D {
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            predicted_position: position,
            density: 0.0,
            near_density: 0.0,
            pressure: 0.0,
            near_pressure: 0.0,
            _pad: [0.0; 2],
        }
    }
}

/// SPH particle (3D), the depth-aware sibling of `SphParticle2D`. Layout
/// matches `original_source/SPHFluid/3D/GPUFluidSimulation.h`'s
/// `GPUParticle` exactly: a `_paddingN: f32` after every `vec3` field.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SphParticle3D {
    pub position: Vec3,
    _padding1: f32,
    pub velocity: Vec3,
    _padding2: f32,
    pub predicted_position: Vec3,
    _padding3: f32,
    pub density: f32,
    pub near_density: f32,
    pub pressure: f32,
    pub near_pressure: f32,
}

impl SphParticle3D {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            _padding1: 0.0,
            velocity: Vec3::ZERO,
            _padding2: 0.0,
            predicted_position: position,
            _padding3: 0.0,
            density: 0.0,
            near_density: 0.0,
            pressure: 0.0,
            near_pressure: 0.0,
        }
    }
}
