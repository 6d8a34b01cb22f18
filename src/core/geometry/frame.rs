//! Orthonormal tangent frame used to move between world space and a
//! surface's (or a specular lobe's) local coordinate system, where the
//! hemisphere samplers in `rng` assume `+y` is "up".

use glam::DVec3;

#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub tangent: DVec3,
    pub normal: DVec3,
    pub bitangent: DVec3,
}

impl Frame {
    /// Builds an orthonormal basis with `normal` as the local `+y` axis,
    /// using the branch-free construction that stays numerically stable
    /// as `normal` approaches either pole (Duff et al.).
    pub fn from_normal(normal: DVec3) -> Self {
        let sign = 1.0_f64.copysign(normal.z);
        let a = -1.0 / (sign + normal.z);
        let b = normal.x * normal.y * a;
        let tangent = DVec3::new(1.0 + sign * normal.x * normal.x * a, sign * b, -sign * normal.x);
        let bitangent = DVec3::new(b, sign + normal.y * normal.y * a, -normal.y);
        Self {
            tangent,
            normal,
            bitangent,
        }
    }

    #[inline]
    pub fn to_local(&self, v: DVec3) -> DVec3 {
        DVec3::new(v.dot(self.tangent), v.dot(self.normal), v.dot(self.bitangent))
    }

    #[inline]
    pub fn to_world(&self, v: DVec3) -> DVec3 {
        self.tangent * v.x + self.normal * v.y + self.bitangent * v.z
    }

    pub fn is_orthonormal(&self) -> bool {
        let unit = |v: DVec3| (v.length() - 1.0).abs() < 1e-5;
        let perp = |a: DVec3, b: DVec3| a.dot(b).abs() < 1e-5;
        unit(self.tangent)
            && unit(self.normal)
            && unit(self.bitangent)
            && perp(self.tangent, self.normal)
            && perp(self.normal, self.bitangent)
            && perp(self.tangent, self.bitangent)
    }
}

/// Orthonormal basis whose local `+y` axis is the mirror direction `r`,
/// used to centre the Phong specular lobe sampler on reflection.
pub fn reflection_to_surface(r: DVec3) -> Frame {
    Frame::from_normal(r.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_orthonormal_for_arbitrary_normals() {
        let dirs = [
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, -1.0, 0.0),
            DVec3::new(0.3, 0.7, -0.2).normalize(),
        ];
        for d in dirs {
            let f = Frame::from_normal(d);
            assert!(f.is_orthonormal(), "frame not orthonormal for {d:?}");
        }
    }

    #[test]
    fn local_world_roundtrip() {
        let f = Frame::from_normal(DVec3::new(0.2, 0.9, -0.1).normalize());
        let v = DVec3::new(0.5, 0.2, -0.7);
        let roundtrip = f.to_world(f.to_local(v));
        assert!((roundtrip - v).length() < 1e-10);
    }
}
