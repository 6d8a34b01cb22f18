//! Light-transport estimators: path tracing, bidirectional path tracing,
//! and vertex connection and merging.
//!
//! Grounded in `original_source/{PT,BPT,VCM}.cpp`'s `Technique` family: a
//! technique owns its own roulette/min-subpath parameters and exposes one
//! operation, "estimate the radiance along one primary ray, plus whatever
//! light-subpath-to-lens splats this sample produced." `EstimatorConfig`
//! collects the parameters shared by all three so the frame driver (`film`)
//! can construct whichever estimator the CLI selected without knowing its
//! internals.

pub mod bpt;
pub mod pt;
pub mod vcm;

use glam::DVec3;

use crate::core::beta::Beta;
use crate::core::geometry::Ray;
use crate::core::rng::RandomEngine;
use crate::core::scene::Scene;

/// Parameters every estimator reads from, mirroring `Technique`'s
/// constructor arguments in `original_source/Technique.hpp` plus the
/// VCM-specific photon count and initial merge radius.
#[derive(Debug, Clone, Copy)]
pub struct EstimatorConfig {
    /// Path length below which roulette is skipped outright (`_minSubpath`).
    pub min_subpath: usize,
    /// Russian-roulette survival probability once `min_subpath` is exceeded.
    pub roulette: f64,
    /// Power-heuristic exponent used by every MIS weight (`Beta::beta`'s
    /// exponent in the original; `Beta::Two` is the usual choice).
    pub beta: Beta,
    /// Photons gathered per frame and the initial gather radius, read only
    /// by `vcm`; ignored by `pt`/`bpt`.
    pub photons_per_frame: usize,
    pub initial_radius: f64,
    /// `vcm`'s photon-merge strategy on or off. VCM and UPG are one
    /// estimator (`estimators::vcm::VcmEstimator`) in this crate, exactly as
    /// `original_source/VCM.cpp`'s `VCMBase` handles both under constructor
    /// flags rather than two classes. `false` zeroes `eta` at construction,
    /// skips `prepare_frame`'s photon pass, and skips `gather` in
    /// `trace_eye`. Both VCM and UPG run with this `true`; ignored by
    /// `pt`/`bpt`.
    pub merging_enabled: bool,
    /// `vcm`'s explicit vertex-connection strategies on or off: UPG is VCM
    /// with `connect_eye_to_light_path`'s light-subpath-vertex connections
    /// (and the matching light-subpath-to-lens splats) dropped, leaving
    /// next-event estimation, a path's own chance hit on a light, and photon
    /// merging as its only strategies. `true` for VCM, `false` for UPG;
    /// ignored by `pt`/`bpt` (`bpt` always connects; it has no merge
    /// strategy to fall back on without one).
    pub connections_enabled: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_subpath: 3,
            roulette: 0.5,
            beta: Beta::Two,
            photons_per_frame: 100_000,
            initial_radius: 0.1,
            merging_enabled: true,
            connections_enabled: true,
        }
    }
}

/// One pixel's worth of contribution from a single sample: the part that
/// belongs to the pixel the primary ray was shot through (`eye`), plus zero
/// or more contributions a light subpath splatted onto *other* pixels by
/// connecting straight to the lens (`splats`) — see `camera::Camera::
/// sample_importance` and `DESIGN.md`'s note on why this strategy exists
/// even though the grounding source never exercises it on its own.
#[derive(Debug, Clone, Default)]
pub struct PixelSample {
    pub eye: DVec3,
    pub splats: Vec<((u32, u32), DVec3)>,
}

impl PixelSample {
    pub fn eye_only(radiance: DVec3) -> Self {
        Self {
            eye: radiance,
            splats: Vec::new(),
        }
    }
}

/// A light-transport technique: given a primary ray, produces one sample's
/// contribution. Implementations own their RNG draws through `engine` so
/// the frame driver never needs to know how many random numbers a
/// technique consumes.
pub trait Estimator: Send + Sync {
    fn estimate(&self, scene: &Scene, camera: &crate::core::camera::Camera, engine: &mut RandomEngine, ray: Ray) -> PixelSample;

    fn name(&self) -> &'static str;
}
