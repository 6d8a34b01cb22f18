//! Scalar type, numeric constants and small free functions shared across the
//! whole core. Kept deliberately tiny: this is the bottom of the dependency
//! graph and every other module imports from here.

/// The renderer's working scalar. Double precision keeps the accumulator
/// (`film::Accumulator`) and the MIS partial-sum recurrences (`vertex`)
/// well behaved over the very long sample counts a converged render needs.
pub type Float = f64;

pub const PI: Float = std::f64::consts::PI;
pub const INV_PI: Float = 1.0 / PI;
pub const TWO_PI: Float = 2.0 * PI;
pub const INV_TWO_PI: Float = 1.0 / TWO_PI;

/// Offset used to push a ray origin off a surface along its normal, avoiding
/// immediate self-intersection on both shadow and continuation rays.
pub const SELF_INTERSECT_EPSILON: Float = 1e-4;

/// Shadow rays stop just short of the target surface rather than exactly at
/// `t = 1`, for the same self-intersection reason.
pub const SHADOW_EPSILON: Float = 1e-5;

#[inline]
pub fn lerp(t: Float, a: Float, b: Float) -> Float {
    (1.0 - t) * a + t * b
}

#[inline]
pub fn clamp(x: Float, lo: Float, hi: Float) -> Float {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

/// True if every evaluated sample coordinate is finite. Any non-finite
/// contribution must be discarded per the renderer's error-handling policy
/// rather than corrupting the accumulator.
#[inline]
pub fn is_finite3(v: glam::DVec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[inline]
pub fn max_component(v: glam::DVec3) -> Float {
    v.x.max(v.y).max(v.z)
}

/// L1 norm, used by the Phong diffuse/specular split (`reflection::phong`).
#[inline]
pub fn l1_norm(v: glam::DVec3) -> Float {
    v.x.abs() + v.y.abs() + v.z.abs()
}
