//! BSDF variants.
//!
//! One file per variant, mirroring `original_source/{Diffuse,Phong,
//! Reflection,Transmission}BSDF.cpp` plus the camera and light emission
//! lobes from `BSDF.cpp`. Modeled as a tagged enum with inline payloads
//! (`Bsdf`) per the design notes, rather than a trait object: the payloads
//! are small, there is a fixed closed set of variants, and a `match` avoids
//! a vtable indirection on the hottest call path in the renderer.

mod camera;
mod delta;
mod diffuse;
mod light;
mod phong;

pub use camera::CameraBsdf;
pub use delta::{PerfectReflection, PerfectTransmission};
pub use diffuse::DiffuseBsdf;
pub use light::LightBsdf;
pub use phong::PhongBsdf;

use glam::DVec3;

use crate::core::geometry::bounds::AngularBound;
use crate::core::pbrt::Float;
use crate::core::rng::RandomEngine;

/// Directions and densities are all expressed in the surface's local frame
/// (`+y` is the shading normal). `forward` is the density of sampling
/// `outgoing` given `incident`; `reverse` is the density of the time-
/// reversed sample, needed by the MIS partial sums in `vertex`.
#[derive(Debug, Clone, Copy)]
pub struct BsdfQuery {
    pub throughput: DVec3,
    pub forward_density: Float,
    pub reverse_density: Float,
    /// 1.0 for a delta (perfect mirror/transmission) interaction, 0.0 for a
    /// fully continuous one; `Phong` can report a fractional value only in
    /// the degenerate sense of "this draw happened to be the specular
    /// branch", which callers read off `BsdfSample::specular` instead.
    pub specular: Float,
}

impl BsdfQuery {
    pub fn zero() -> Self {
        Self {
            throughput: DVec3::ZERO,
            forward_density: 0.0,
            reverse_density: 0.0,
            specular: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BsdfSample {
    pub direction: DVec3,
    pub query: BsdfQuery,
}

#[derive(Debug, Clone, Copy)]
pub enum Bsdf {
    Diffuse(DiffuseBsdf),
    Phong(PhongBsdf),
    Reflection(PerfectReflection),
    Transmission(PerfectTransmission),
    Camera(CameraBsdf),
    Light(LightBsdf),
}

impl Bsdf {
    pub fn query(&self, incident: DVec3, outgoing: DVec3) -> BsdfQuery {
        match self {
            Bsdf::Diffuse(b) => b.query(incident, outgoing),
            Bsdf::Phong(b) => b.query(incident, outgoing),
            Bsdf::Reflection(b) => b.query(incident, outgoing),
            Bsdf::Transmission(b) => b.query(incident, outgoing),
            Bsdf::Camera(b) => b.query(incident, outgoing),
            Bsdf::Light(b) => b.query(incident, outgoing),
        }
    }

    pub fn sample(&self, engine: &mut RandomEngine, incident: DVec3) -> Option<BsdfSample> {
        match self {
            Bsdf::Diffuse(b) => Some(b.sample(engine, incident)),
            Bsdf::Phong(b) => Some(b.sample(engine, incident)),
            Bsdf::Reflection(b) => Some(b.sample(incident)),
            Bsdf::Transmission(b) => b.sample(incident),
            Bsdf::Camera(_) => None,
            Bsdf::Light(_) => None,
        }
    }

    /// Restricted sampling toward an angular bound. `light::LightSet::emit`
    /// is the one live caller: it drives a unit-albedo `Diffuse` lobe
    /// standing in for a Lambertian emitter's own cosine profile to
    /// restrict emission toward the scene's bounding sphere. Variants
    /// without a tailored bounded sampler fall back to the unbounded one
    /// with `adjust = 1`.
    pub fn sample_bounded(
        &self,
        engine: &mut RandomEngine,
        bound: AngularBound,
        incident: DVec3,
    ) -> Option<(BsdfSample, Float)> {
        match self {
            Bsdf::Diffuse(b) => Some(b.sample_bounded(engine, bound, incident)),
            _ => self.sample(engine, incident).map(|s| (s, 1.0)),
        }
    }

    pub fn is_specular(&self) -> bool {
        matches!(self, Bsdf::Reflection(_) | Bsdf::Transmission(_))
    }

    pub fn light_id(&self) -> Option<usize> {
        match self {
            Bsdf::Light(b) => Some(b.light_id),
            _ => None,
        }
    }
}
