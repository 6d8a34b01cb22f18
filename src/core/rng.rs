//! Per-thread random stream and the named distributions built on top of it.
//!
//! Mirrors `original_source/Sample.{hpp,cpp}`: a single engine wrapping a
//! fast PRNG, plus free functions that turn one or two uniform draws into a
//! direction/scalar under a named distribution. Every sampler here is a pure
//! function of the engine plus its parameters — no hidden thread-local
//! state, so a tile task can clone a generator and nothing else needs to
//! know it happened.

use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::core::pbrt::{Float, PI, TWO_PI};

/// Wraps the concrete PRNG algorithm so call sites never depend on it
/// directly, only on `uniform1`/`uniform2`. Cloning produces an
/// independent stream, which is how each render tile gets its own
/// reproducible sequence (see `film::render_frame`).
#[derive(Clone)]
pub struct RandomEngine {
    rng: Xoshiro256PlusPlus,
}

impl RandomEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    #[inline]
    pub fn uniform1(&mut self) -> Float {
        self.rng.gen::<Float>()
    }

    #[inline]
    pub fn uniform2(&mut self) -> (Float, Float) {
        (self.uniform1(), self.uniform1())
    }

    /// Bernoulli trial with success probability `p`.
    #[inline]
    pub fn bernoulli(&mut self, p: Float) -> bool {
        self.uniform1() < p
    }
}

/// Cosine-weighted direction over the hemisphere around `+y` in the local
/// frame. Returns `(direction, density)` with density in solid-angle
/// measure, `cos θ / π`.
pub fn cosine_hemisphere(engine: &mut RandomEngine) -> (DVec3, Float) {
    let (u1, u2) = engine.uniform2();
    let r = u1.sqrt();
    let phi = TWO_PI * u2;
    let x = r * phi.cos();
    let z = r * phi.sin();
    let y = (1.0 - u1).max(0.0).sqrt();
    (DVec3::new(x, y, z), y * crate::core::pbrt::INV_PI)
}

/// Uniform direction over the hemisphere around `+y`. Density is constant,
/// `1 / 2π`.
pub fn uniform_hemisphere(engine: &mut RandomEngine) -> (DVec3, Float) {
    let (u1, u2) = engine.uniform2();
    let z = u1;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = TWO_PI * u2;
    (DVec3::new(r * phi.cos(), z, r * phi.sin()), 1.0 / TWO_PI)
}

/// Uniform point on the unit disk via concentric mapping, density `1/π`.
pub fn uniform_disk(engine: &mut RandomEngine) -> (Float, Float, Float) {
    let (u1, u2) = engine.uniform2();
    let r = u1.sqrt();
    let theta = TWO_PI * u2;
    (r * theta.cos(), r * theta.sin(), crate::core::pbrt::INV_PI)
}

/// Uniform barycentric coordinates over a triangle, density `1/area` once
/// scaled by the triangle's area on the caller's side.
pub fn triangle_barycentric(engine: &mut RandomEngine) -> (Float, Float) {
    let (u1, u2) = engine.uniform2();
    let su1 = u1.sqrt();
    (1.0 - su1, u2 * su1)
}

/// A cosine-hemisphere draw restricted to the angular bound produced by
/// [`crate::core::geometry::bounds::angular_bound`]. Returns the direction
/// and the fraction of the full hemisphere's solid angle the bound covers
/// (`adjust`); dividing the unbounded density by `adjust` yields the
/// conditional density under the restriction.
pub fn cosine_hemisphere_bounded(
    engine: &mut RandomEngine,
    bound: crate::core::geometry::bounds::AngularBound,
) -> (DVec3, Float) {
    let (u1, u2) = engine.uniform2();
    let theta = lerp_bound(u1, bound.theta_inf, bound.theta_sup);
    let phi = lerp_bound(u2, bound.phi_inf, bound.phi_sup);

    let sin_theta = theta.sin();
    let dir = DVec3::new(
        sin_theta * phi.cos(),
        theta.cos(),
        sin_theta * phi.sin(),
    );

    let adjust = ((bound.phi_sup - bound.phi_inf) * (bound.theta_sup - bound.theta_inf).abs())
        / (2.0 * PI * (PI / 2.0));
    (dir, adjust.clamp(1e-9, 1.0))
}

#[inline]
fn lerp_bound(u: Float, lo: Float, hi: Float) -> Float {
    lo + u * (hi - lo)
}

/// Draws an index from a set of non-negative weights with probability
/// proportional to the weight, via inversion over the cumulative
/// distribution. `O(n)` — the scene's light count is small enough that a
/// binary search over a precomputed CDF would be premature; `LightSet`'s
/// `pick` (`light.rs`) calls this directly over the light power table
/// rather than keeping a separate precomputed-CDF sampler.
pub fn piecewise_constant_index(engine: &mut RandomEngine, weights: &[Float]) -> usize {
    let total: Float = weights.iter().sum();
    let u = engine.uniform1() * total;
    let mut running = 0.0;
    for (i, w) in weights.iter().enumerate() {
        running += w;
        if u < running {
            return i;
        }
    }
    weights.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piecewise_constant_matches_weights() {
        let weights = [1.0, 2.0, 3.0, 4.0];
        let total: Float = weights.iter().sum();
        let mut counts = [0u32; 4];
        let mut engine = RandomEngine::new(7);
        let n = 200_000;
        for _ in 0..n {
            counts[piecewise_constant_index(&mut engine, &weights)] += 1;
        }
        for (i, &w) in weights.iter().enumerate() {
            let expected = w / total;
            let observed = counts[i] as Float / n as Float;
            assert!(
                (expected - observed).abs() < 0.01,
                "bucket {i}: expected {expected}, observed {observed}"
            );
        }
    }

    #[test]
    fn cosine_hemisphere_density_matches_cos_over_pi() {
        let mut engine = RandomEngine::new(11);
        for _ in 0..1000 {
            let (dir, density) = cosine_hemisphere(&mut engine);
            assert!(dir.y >= 0.0);
            assert!((density - dir.y * crate::core::pbrt::INV_PI).abs() < 1e-12);
        }
    }
}
