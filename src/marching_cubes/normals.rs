use glam::Vec3;

/// Gradient-based normal estimation (spec.md §4.E step 4, Design Notes
/// "Normals from scalar field gradient").
///
/// Centered differences are the idiomatic way to estimate a scalar
/// field's gradient at a grid point; this module's job is only to pick
/// centered vs. forward/backward per axis based on how close the point
/// is to the field's border, and to fall back to a blend of the two
/// surrounding corners' gradients when the local gradient is
/// degenerately small (a perfectly flat region of the field).
///
/// `sample` is a clamped-coordinate scalar lookup (`ScalarField::
/// sample_clamped` at the call site): out-of-range coordinates clamp to
/// the nearest in-range sample rather than panicking, which is exactly
/// what lets the same centered-difference formula run unconditionally at
/// the border (clamping makes the "forward/backward" step implicit: the
/// clamped neighbor equals the center sample, so the difference
/// collapses to a one-sided estimate automatically).
fn gradient_at(sample: &impl Fn(i64, i64, i64) -> f32, gx: i64, gy: i64, gz: i64) -> Vec3 {
    let dx = sample(gx + 1, gy, gz) - sample(gx - 1, gy, gz);
    let dy = sample(gx, gy + 1, gz) - sample(gx, gy - 1, gz);
    let dz = sample(gx, gy, gz + 1) - sample(gx, gy, gz - 1);
    Vec3::new(dx, dy, dz) * 0.5
}

/// The normal at a vertex on edge `(corner_a, corner_b)`, at interpolation
/// parameter `t` along that edge (`t = 0` at `corner_a`, `t = 1` at
/// `corner_b`). Blends the two corners' gradients by `t` (a linear
/// approximation of sampling the gradient at the exact edge-intersection
/// point), normalizes, and negates so the normal points away from the
/// high-value (inside) side of the isosurface, per spec.md step 4.
///
/// If the blended gradient's norm is `< 1e-7` (a degenerate, locally flat
/// field), falls back to a blend of the unit-normalized corner gradients
/// instead of normalizing a near-zero vector, per the Design Notes.
pub fn gradient_normal_at_edge(
    sample: &impl Fn(i64, i64, i64) -> f32,
    corner_a: (i64, i64, i64),
    corner_b: (i64, i64, i64),
    t: f32,
) -> Vec3 {
    let ga = gradient_at(sample, corner_a.0, corner_a.1, corner_a.2);
    let gb = gradient_at(sample, corner_b.0, corner_b.1, corner_b.2);
    let blended = ga.lerp(gb, t.clamp(0.0, 1.0));

    if blended.length() >= 1e-7 {
        return -blended.normalize();
    }

    let na = if ga.length() >= 1e-7 { ga.normalize() } else { Vec3::ZERO };
    let nb = if gb.length() >= 1e-7 { gb.normalize() } else { Vec3::ZERO };
    let fallback = na.lerp(nb, t.clamp(0.0, 1.0));
    if fallback.length() >= 1e-7 {
        -fallback.normalize()
    } else {
        Vec3::Y
    }
}
