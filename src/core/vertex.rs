//! Path-vertex model: light/eye vertices, the geometric edge between two
//! vertices, and the incremental MIS partial sums that let the estimators
//! compute a strategy's weight without re-deriving every other strategy's
//! density from scratch.
//!
//! Grounded in `original_source/Edge.hpp` (edge geometric terms) and the
//! recurrences in `BPT.cpp`/`VCM.cpp` (`_traceLight`/`_traceEye`). The
//! merging-weight convention and the roulette/specular interaction are the
//! two points the design explicitly leaves open; the decisions and their
//! justification live in `DESIGN.md`.

use glam::DVec3;

use crate::core::beta::Beta;
use crate::core::geometry::interaction::SurfacePoint;
use crate::core::pbrt::Float;
use crate::core::spatial_index::PositionedRecord;

/// Geometric quantities between two consecutive path vertices `a -> b`.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub inv_d2: Float,
    /// `cos θ` at `b`, against the direction `a -> b`.
    pub cos_f: Float,
    /// `cos θ` at `a`, against the direction `a -> b`.
    pub cos_b: Float,
    pub g_f: Float,
    pub g_b: Float,
}

impl Edge {
    pub fn new(pos_a: DVec3, normal_a: DVec3, pos_b: DVec3, normal_b: DVec3) -> Self {
        let d = pos_b - pos_a;
        let d2 = d.length_squared().max(1e-18);
        let inv_d2 = 1.0 / d2;
        let omega = d * inv_d2.sqrt();

        let cos_f = omega.dot(normal_b).abs();
        let cos_b = omega.dot(normal_a).abs();

        Self {
            inv_d2,
            cos_f,
            cos_b,
            g_f: cos_f * inv_d2,
            g_b: cos_b * inv_d2,
        }
    }
}

/// The MIS bookkeeping carried by value in every light/eye vertex: `a`/`c`
/// is the reciprocal area-measure density of having generated this vertex
/// under its own strategy; `big` accumulates the connection partial sum
/// (`A`/`C`); `merge` accumulates the merging extension (`B`/`D`), zero
/// when merging is not in use by the active estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct MisPartials {
    pub a: Float,
    pub big: Float,
    pub merge: Float,
}

impl MisPartials {
    /// The very first vertex of a subpath, measured directly in area
    /// measure with no geometric edge behind it yet: a point freshly
    /// sampled on a light (`BPT.cpp`'s `_traceLight`: `path[prv].a = 1.0f /
    /// Beta::beta(light.areaDensity())`) or the fixed eye-side placeholder
    /// standing in for the lens (`eye[itr].specular = 1.0f; eye[itr].c =
    /// 0; eye[itr].C = 0;` — a zero-density root, since no strategy
    /// competes with having generated the primary ray in the first place).
    ///
    /// The *second* vertex of the subpath is then just `extend`'s ordinary
    /// output applied to this root — there is no separate "seed the second
    /// vertex" formula. An earlier version of this module had one (baking
    /// `p_f`/`g_f` into a one-shot `a` with `big` hardcoded to zero), but
    /// that silently dropped the nonzero `A`/`C` contribution `extend`
    /// produces for a real vertex1 (`path[itr].A = (0 + path[prv].a·(1-0))
    /// · β(edge.bGeometry) · path[itr].a`, not zero) — `area_root` plus
    /// `extend` is the correct, uniform replacement.
    pub fn area_root(beta: Beta, area_density: Float) -> Self {
        Self {
            a: 1.0 / beta.apply(area_density),
            big: 0.0,
            merge: 0.0,
        }
    }

    /// Extends the recurrence by one bounce *within a single subpath*
    /// (light-subpath or eye-subpath tracing, not a connection between the
    /// two). `p_rev` is the reverse (solid-angle) density at the *previous*
    /// vertex of having sampled the direction back to this one;
    /// `prev_specular` is the previous vertex's specular fraction;
    /// `p_f`/`g_f` are this vertex's own forward density/geometric term, as
    /// in `seed`. `eta` is the VCM merge constant (`N_photons · π · ρ²`),
    /// zero when merging is disabled; it is itself raised to `β` in the
    /// merge recurrence (`VCM.cpp`'s intra-subpath `B`:
    /// `path[itr].B = (path[prv].B*β(bsdf.densityRev()) +
    /// β(_eta)*(1-bsdf.specular())) * β(edge.bGeometry) * a`), unlike the
    /// plain `η` used at connection/merge time in [`MisPartials::connect`]
    /// and [`MisPartials::merge_propagate`].
    ///
    /// Per `DESIGN.md`, within one subpath `β` is applied to `p_rev` and to
    /// the edge's geometric term as two independent factors — confirmed by
    /// `original_source/BPT.cpp`'s `_traceLight`/`_traceEye`, which compute
    /// `Beta::beta(bsdf.densityRev()) ... Beta::beta(edge.bGeometry)` as two
    /// separate calls. The *connection* step between two subpaths uses a
    /// different convention; see [`MisPartials::connect`].
    #[allow(clippy::too_many_arguments)]
    pub fn extend(
        prev: &MisPartials,
        beta: Beta,
        p_rev: Float,
        edge_g_reverse: Float,
        prev_specular: Float,
        eta: Float,
        p_f: Float,
        g_f: Float,
    ) -> Self {
        let a = 1.0 / (beta.apply(p_f) * beta.apply(g_f));
        let big = (prev.big * beta.apply(p_rev) + prev.a * (1.0 - prev_specular))
            * beta.apply(edge_g_reverse)
            * a;
        let merge = if eta > 0.0 {
            (prev.merge * beta.apply(p_rev) + beta.apply(eta) * (1.0 - prev_specular))
                * beta.apply(edge_g_reverse)
                * a
        } else {
            0.0
        };
        Self { a, big, merge }
    }

    /// Extends the partial sum *across* the connecting edge between the two
    /// subpaths, for the `A_p`/`B_p`/`C_p` quantities `BPT`/`VCM` compute at
    /// a shadow-ray connection. Unlike `extend`, the edge's reverse
    /// geometric term and the density of the direction on the *other*
    /// subpath's side are folded into one `β` application, because there is
    /// no freshly-sampled vertex on this side of the edge to contribute its
    /// own `a_i` factor — grounded in `original_source/BPT.cpp`'s
    /// `_connect`: `Beta::beta(edge.bGeometry * eyeBSDF.densityRev())`, one
    /// call, not `Beta::beta(edge.bGeometry) * Beta::beta(density)`.
    pub fn connect(&self, beta: Beta, p_rev: Float, prev_specular: Float, g_times_other_density: Float) -> Float {
        (self.big * beta.apply(p_rev) + self.a * (1.0 - prev_specular)) * beta.apply(g_times_other_density)
    }

    /// The merge-extension counterpart of `connect`, used by VCM's own
    /// `_connect` to fold the *other* subpath's merge partial sum (`B`/`D`)
    /// into a vertex connection, alongside `connect`'s `A`/`C`. Grounded in
    /// `original_source/VCM.cpp`'s `_connect`: `Bp = (light.B *
    /// Beta::beta(lightBSDF.densityRev()) + Beta::beta(_eta) *
    /// (1 - lightBSDF.specular())) * Beta::beta(edge.bGeometry *
    /// eyeBSDF.densityRev())` — identical in shape to `connect`'s `Ap`
    /// except the additive term is `β(η)·(1−specular)` instead of
    /// `a·(1−specular)`, since there is no fresh `a_i` on the merge side of
    /// the bookkeeping, only the shared merge constant.
    pub fn connect_merge_extension(&self, beta: Beta, p_rev: Float, other_specular: Float, g_times_other_density: Float, eta: Float) -> Float {
        (self.merge * beta.apply(p_rev) + beta.apply(eta) * (1.0 - other_specular)) * beta.apply(g_times_other_density)
    }

    /// Merge-side counterpart of `connect`, used when gathering photons:
    /// the light vertex being merged into already has its forward density
    /// cached (it is a `LightPhoton`, not being freshly sampled), so there
    /// is no additive `a·(1−σ)` term, only the propagated partial sum times
    /// the one combined `β` factor. Grounded in `original_source/VCM.cpp`'s
    /// `_merge`: `light.A * Beta::beta(light.fGeometry * light.fDensity *
    /// eyeBSDF.densityRev())`.
    pub fn merge_propagate(&self, beta: Beta, g_times_density_times_other: Float) -> Float {
        self.big * beta.apply(g_times_density_times_other)
    }

    /// `B`'s counterpart to `merge_propagate`'s `A`, used by `_merge`'s own
    /// `Bp = light.B * Beta::beta(light.fGeometry * light.fDensity *
    /// eyeBSDF.densityRev())`. Same combined-`β` shape as `merge_propagate`,
    /// applied to the propagated merge sum instead of the connection sum.
    pub fn merge_propagate_merge(&self, beta: Beta, g_times_density_times_other: Float) -> Float {
        self.merge * beta.apply(g_times_density_times_other)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LightVertex {
    pub surface: SurfacePoint,
    /// Direction back toward the previous vertex (world space, unit).
    pub omega: DVec3,
    pub throughput: DVec3,
    pub specular: Float,
    pub mis: MisPartials,
}

#[derive(Debug, Clone, Copy)]
pub struct EyeVertex {
    pub surface: SurfacePoint,
    pub omega: DVec3,
    pub throughput: DVec3,
    pub specular: Float,
    pub mis: MisPartials,
}

/// A `LightVertex` extended with the edge quantities cached at its
/// creation, needed by the merge weight's `η·G·p_rev` term without
/// re-deriving the edge from the eye vertex being merged into.
#[derive(Debug, Clone, Copy)]
pub struct LightPhoton {
    pub vertex: LightVertex,
    pub forward_density: Float,
    pub forward_cos: Float,
    pub forward_g: Float,
}

impl PositionedRecord for LightPhoton {
    fn position(&self) -> DVec3 {
        self.vertex.surface.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_geometric_terms_are_symmetric_in_distance() {
        let a = DVec3::new(0.0, 0.0, 0.0);
        let b = DVec3::new(0.0, 2.0, 0.0);
        let edge = Edge::new(a, DVec3::Y, b, -DVec3::Y);
        assert!((edge.inv_d2 - 0.25).abs() < 1e-12);
        assert!((edge.cos_f - 1.0).abs() < 1e-12);
        assert!((edge.cos_b - 1.0).abs() < 1e-12);
    }

    #[test]
    fn area_root_matches_direct_formula() {
        let beta = Beta::Two;
        let mis = MisPartials::area_root(beta, 2.0);
        assert!((mis.a - 1.0 / (2.0_f64 * 2.0)).abs() < 1e-12);
        assert_eq!(mis.big, 0.0);
    }

    #[test]
    fn extend_of_area_root_gives_nonzero_big_for_vertex_one() {
        // path[itr].A = (0 + path[prv].a*(1-0)) * beta(edge.bGeometry) * path[itr].a,
        // i.e. nonzero whenever the root's own density is finite — the bug the old
        // `seed` helper had (it always returned `big == 0` for vertex one).
        let beta = Beta::Two;
        let root = MisPartials::area_root(beta, 2.0);
        let extended = MisPartials::extend(&root, beta, 0.0, 3.0, 0.0, 0.0, 1.0, 1.0);
        assert!(extended.big > 0.0);
    }

    #[test]
    fn extend_with_zero_eta_keeps_merge_zero() {
        let beta = Beta::Two;
        let root = MisPartials::area_root(beta, 1.0);
        let extended = MisPartials::extend(&root, beta, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0);
        assert_eq!(extended.merge, 0.0);
    }

    #[test]
    fn connect_merge_extension_raises_eta_to_beta() {
        let beta = Beta::Two;
        let root = MisPartials::area_root(beta, 1.0);
        let eta = 2.0;
        let bp = root.connect_merge_extension(beta, 1.0, 0.0, 1.0, eta);
        assert!((bp - beta.apply(eta)).abs() < 1e-9);
    }

    #[test]
    fn merge_propagate_merge_is_zero_when_merge_sum_is_zero() {
        let beta = Beta::Two;
        let root = MisPartials::area_root(beta, 1.0);
        assert_eq!(root.merge_propagate_merge(beta, 4.0), 0.0);
    }

    #[test]
    fn extend_raises_eta_to_beta_not_linear() {
        let beta = Beta::Two;
        let root = MisPartials::area_root(beta, 1.0);
        let eta = 3.0;
        let extended = MisPartials::extend(&root, beta, 1.0, 1.0, 0.0, eta, 1.0, 1.0);
        let linear = eta * (1.0 - 0.0) * beta.apply(1.0) * extended.a;
        let raised = beta.apply(eta) * (1.0 - 0.0) * beta.apply(1.0) * extended.a;
        assert!((extended.merge - raised).abs() < 1e-12);
        assert!((extended.merge - linear).abs() > 1e-6);
    }
}
