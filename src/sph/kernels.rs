use std::f32::consts::PI;

/// Precomputed SPH kernel normalization factors for the 2D solver.
/// Recomputed whenever `smoothing_radius` changes (spec.md §4.D); values
/// match `UpdateConstants` in
/// `original_source/SPHFluid/2D/GPUFluidSimulation2D.cpp`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelFactors2D {
    pub poly6: f32,
    pub spiky_pow2: f32,
    pub spiky_pow3: f32,
    pub spiky_pow2_derivative: f32,
    pub spiky_pow3_derivative: f32,
}

impl KernelFactors2D {
    pub fn new(h: f32) -> Self {
        Self {
            poly6: 4.0 / (PI * h.powi(8)),
            spiky_pow2: 6.0 / (PI * h.powi(4)),
            spiky_pow3: 10.0 / (PI * h.powi(5)),
            spiky_pow2_derivative: 12.0 / (PI * h.powi(4)),
            spiky_pow3_derivative: 30.0 / (PI * h.powi(5)),
        }
    }

    /// Density kernel `W_2(r) = spikyPow2Factor * (h - r)^2`.
    pub fn density(&self, dst: f32, h: f32) -> f32 {
        if dst >= h {
            return 0.0;
        }
        let v = h - dst;
        self.spiky_pow2 * v * v
    }

    /// Near-density kernel `W_3(r) = spikyPow3Factor * (h - r)^3`.
    pub fn near_density(&self, dst: f32, h: f32) -> f32 {
        if dst >= h {
            return 0.0;
        }
        let v = h - dst;
        self.spiky_pow3 * v * v * v
    }

    /// Derivative of the density kernel, signed: `-spikyPow2DerivativeFactor
    /// * (h - r)`. Negative for `r < h`, matching spec.md's `∇W_2(r) =
    /// -factor * (h - r) * r̂` when `r̂` is taken as the direction *from the
    /// evaluated particle toward its neighbor* (see `solver2d::pressure_pass`).
    pub fn density_derivative(&self, dst: f32, h: f32) -> f32 {
        if dst >= h {
            return 0.0;
        }
        let v = h - dst;
        -self.spiky_pow2_derivative * v
    }

    /// Derivative of the near-density kernel, signed:
    /// `-spikyPow3DerivativeFactor * (h - r)^2`.
    pub fn near_density_derivative(&self, dst: f32, h: f32) -> f32 {
        if dst >= h {
            return 0.0;
        }
        let v = h - dst;
        -self.spiky_pow3_derivative * v * v
    }

    /// Viscosity smoothing kernel, poly6-like: `W_v(r) = poly6Factor * (h^2
    /// - r^2)^3`.
    pub fn viscosity(&self, dst: f32, h: f32) -> f32 {
        if dst >= h {
            return 0.0;
        }
        let v = h * h - dst * dst;
        self.poly6 * v * v * v
    }
}

/// Precomputed SPH kernel normalization factors for the 3D solver. The 3D
/// spiky/poly6 constants are the standard ones (`15/(2*pi*h^5)`,
/// `15/(pi*h^6)`, their derivatives, and `315/(64*pi*h^9)`) used throughout
/// 3D SPH implementations derived from the same tutorial lineage as
/// `original_source/SPHFluid/3D`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelFactors3D {
    pub poly6: f32,
    pub spiky_pow2: f32,
    pub spiky_pow3: f32,
    pub spiky_pow2_derivative: f32,
    pub spiky_pow3_derivative: f32,
}

impl KernelFactors3D {
    pub fn new(h: f32) -> Self {
        Self {
            poly6: 315.0 / (64.0 * PI * h.powi(9)),
            spiky_pow2: 15.0 / (2.0 * PI * h.powi(5)),
            spiky_pow3: 15.0 / (PI * h.powi(6)),
            spiky_pow2_derivative: 15.0 / (PI * h.powi(5)),
            spiky_pow3_derivative: 45.0 / (PI * h.powi(6)),
        }
    }

    pub fn density(&self, dst: f32, h: f32) -> f32 {
        if dst >= h {
            return 0.0;
        }
        let v = h - dst;
        self.spiky_pow2 * v * v
    }

    pub fn near_density(&self, dst: f32, h: f32) -> f32 {
        if dst >= h {
            return 0.0;
        }
        let v = h - dst;
        self.spiky_pow3 * v * v * v
    }

    pub fn density_derivative(&self, dst: f32, h: f32) -> f32 {
        if dst >= h {
            return 0.0;
        }
        let v = h - dst;
        -self.spiky_pow2_derivative * v
    }

    pub fn near_density_derivative(&self, dst: f32, h: f32) -> f32 {
        if dst >= h {
            return 0.0;
        }
        let v = h - dst;
        -self.spiky_pow3_derivative * v * v
    }

    pub fn viscosity(&self, dst: f32, h: f32) -> f32 {
        if dst >= h {
            return 0.0;
        }
        let v = h * h - dst * dst;
        self.poly6 * v * v * v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernels_are_zero_at_support_radius() {
        let k = KernelFactors2D::new(0.35);
        assert_eq!(k.density(0.35, 0.35), 0.0);
        assert_eq!(k.near_density(0.35, 0.35), 0.0);
        let k3 = KernelFactors3D::new(0.35);
        assert_eq!(k3.density(0.35, 0.35), 0.0);
    }

    #[test]
    fn density_kernel_is_positive_inside_support() {
        let k = KernelFactors2D::new(0.35);
        assert!(k.density(0.1, 0.35) > 0.0);
        assert!(k.near_density(0.1, 0.35) > 0.0);
        assert!(k.viscosity(0.1, 0.35) > 0.0);
    }

    #[test]
    fn derivative_kernels_are_negative_inside_support() {
        let k = KernelFactors2D::new(0.35);
        assert!(k.density_derivative(0.1, 0.35) < 0.0);
        assert!(k.near_density_derivative(0.1, 0.35) < 0.0);
    }
}
