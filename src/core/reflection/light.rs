//! The emission lobe attached to a light's surface, used to answer "what
//! BSDF sits at the vertex the eye path just hit" when an eye subpath
//! happens to land on a light by chance rather than by explicit next-event
//! sampling. Grounded in `original_source/BSDF.cpp`'s `LightBSDF`: a
//! diffuse (cosine) emission profile; `sample` is disallowed because light
//! sampling goes through `light::LightSet`, never through this BSDF.

use glam::DVec3;

use crate::core::reflection::BsdfQuery;

#[derive(Debug, Clone, Copy)]
pub struct LightBsdf {
    pub light_id: usize,
}

impl LightBsdf {
    pub fn query(&self, _incident: DVec3, _outgoing: DVec3) -> BsdfQuery {
        // The emitted radiance itself is looked up via `LightSet::query_lsdf`;
        // as a BSDF this vertex contributes no further scattering.
        BsdfQuery::zero()
    }
}
