//! Pinhole camera: primary-ray generation and the inverse importance sample
//! a light subpath uses to connect straight to the lens.
//!
//! Grounded in `original_source/Camera.cpp`'s `shoot` for ray generation
//! (pixel + subpixel jitter mapped into `[-1,1]` NDC, scaled by
//! `tan(fovy/2)` and aspect, transformed by the camera basis) and, for the
//! lens connection, the `t == 1` case of bidirectional path tracing as
//! implemented by real BDPT ports (e.g. pbrt's `Camera::Sample_Wi`,
//! `other_examples/501056ed_heathcliff233-rs_pbrt__src-integrators-bdpt.rs.rs`):
//! a light vertex samples a point on the lens (here a single point, since
//! the lens has no area), gets back the pixel it projects to, a unit
//! direction toward the lens, and the solid-angle density of having
//! generated that direction via per-pixel sampling — `1/(A·cos³θ)`, the
//! standard pinhole importance density, `A` being the image-plane area at
//! unit distance (`reflection::camera::CameraBsdf` supplies the matching
//! `1/cos⁴θ` throughput half of the same `We` quantity).

use glam::DVec3;

use crate::core::geometry::{Frame, Ray};
use crate::core::pbrt::Float;
use crate::core::reflection::CameraBsdf;
use crate::core::sceneio::SelectedCamera;

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: DVec3,
    pub frame: Frame,
    pub tan_half_fov: Float,
    pub aspect: Float,
    pub resolution: (u32, u32),
}

/// The result of connecting a light-subpath vertex directly to the lens:
/// which pixel it lands on, the unit direction from the vertex toward the
/// lens, and the solid-angle density of that direction under per-pixel
/// importance sampling.
#[derive(Debug, Clone, Copy)]
pub struct CameraSample {
    pub pixel: (u32, u32),
    pub direction: DVec3,
    pub importance: DVec3,
    pub direction_density: Float,
}

impl Camera {
    pub fn new(selected: &SelectedCamera, resolution: (u32, u32)) -> Self {
        let forward = selected.direction.normalize();
        let right = forward.cross(selected.up).normalize();
        let up = right.cross(forward).normalize();
        let frame = Frame {
            tangent: right,
            normal: forward,
            bitangent: up,
        };
        let tan_half_fov = (selected.horizontal_fov.to_radians() * 0.5).tan();
        let aspect = resolution.1 as Float / resolution.0 as Float;
        Self {
            position: selected.position,
            frame,
            tan_half_fov,
            aspect,
            resolution,
        }
    }

    /// Area of the virtual image plane at unit distance from the lens, in
    /// the same local units `generate_ray`'s NDC mapping uses.
    fn image_plane_area(&self) -> Float {
        4.0 * self.tan_half_fov * (self.tan_half_fov * self.aspect)
    }

    /// Primary ray through pixel `(px, py)`, jittered within the pixel by
    /// `jitter` (each component in `[0, 1)`).
    pub fn generate_ray(&self, px: u32, py: u32, jitter: (Float, Float)) -> Ray {
        let (w, h) = (self.resolution.0 as Float, self.resolution.1 as Float);
        let ndc_x = ((px as Float + jitter.0) / w) * 2.0 - 1.0;
        let ndc_y = 1.0 - ((py as Float + jitter.1) / h) * 2.0;
        let local = DVec3::new(
            ndc_x * self.tan_half_fov,
            1.0,
            ndc_y * self.tan_half_fov * self.aspect,
        )
        .normalize();
        Ray::new(self.position, self.frame.to_world(local))
    }

    /// Connects `reference` directly to the lens, for the light-tracing
    /// `s >= 1, t == 1` strategy. Returns `None` when the point is behind
    /// the lens or its projection falls outside the image.
    pub fn sample_importance(&self, reference: DVec3) -> Option<CameraSample> {
        let to_lens = self.position - reference;
        let distance2 = to_lens.length_squared().max(1e-18);
        let direction = to_lens / distance2.sqrt();
        let local = self.frame.to_local(-direction);
        if local.y <= 0.0 {
            return None;
        }

        let ndc_x = local.x / (local.y * self.tan_half_fov);
        let ndc_z = local.z / (local.y * self.tan_half_fov * self.aspect);
        if !(-1.0..=1.0).contains(&ndc_x) || !(-1.0..=1.0).contains(&ndc_z) {
            return None;
        }
        let (w, h) = (self.resolution.0 as Float, self.resolution.1 as Float);
        let px = (((ndc_x + 1.0) * 0.5) * w).floor().clamp(0.0, w - 1.0) as u32;
        let py = (((1.0 - ndc_z) * 0.5) * h).floor().clamp(0.0, h - 1.0) as u32;

        let importance = CameraBsdf.query(DVec3::ZERO, local).throughput;
        let cos_theta = local.y;
        let direction_density = 1.0 / (self.image_plane_area() * cos_theta.powi(3));

        Some(CameraSample {
            pixel: (px, py),
            direction,
            importance,
            direction_density,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera() -> Camera {
        let selected = SelectedCamera {
            position: DVec3::ZERO,
            direction: DVec3::new(0.0, 0.0, -1.0),
            up: DVec3::Y,
            horizontal_fov: 90.0,
        };
        Camera::new(&selected, (64, 64))
    }

    #[test]
    fn center_pixel_ray_points_straight_ahead() {
        let camera = test_camera();
        let ray = camera.generate_ray(32, 32, (0.5, 0.5));
        assert!(ray.direction.dot(camera.frame.normal) > 0.999);
    }

    #[test]
    fn point_ahead_of_lens_projects_near_center_pixel() {
        let camera = test_camera();
        let reference = camera.position + camera.frame.normal * 5.0;
        let sample = camera.sample_importance(reference).expect("in view");
        assert!(sample.pixel.0.abs_diff(32) <= 1);
        assert!(sample.pixel.1.abs_diff(32) <= 1);
        assert!(sample.direction_density > 0.0);
    }

    #[test]
    fn point_behind_lens_is_not_projected() {
        let camera = test_camera();
        let reference = camera.position - camera.frame.normal * 5.0;
        assert!(camera.sample_importance(reference).is_none());
    }

    #[test]
    fn point_far_off_axis_falls_outside_image() {
        let camera = test_camera();
        let reference = camera.position + camera.frame.normal * 1.0 + camera.frame.tangent * 50.0;
        assert!(camera.sample_importance(reference).is_none());
    }
}
