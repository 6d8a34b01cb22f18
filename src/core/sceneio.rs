//! Scene input tuple and the loader trait that produces it.
//!
//! Mesh I/O and the on-disk scene format are explicitly out of scope for
//! the core ("the loader is an external collaborator; the core only
//! consumes the above tuple"); this module defines that tuple plus one
//! concrete loader (`JsonSceneLoader`) so the binary has something to
//! actually render. The JSON shape mirrors the field list in the external
//! interfaces section one-for-one — nothing here is policy, only data.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::accelerators::bvh::{Triangle, TriangleBvh};
use crate::accelerators::Intersector;
use crate::core::error::{Error, Result};
use crate::core::geometry::Frame;
use crate::core::light::{AreaLight, LightSet};
use crate::core::pbrt::Float;
use crate::core::scene::Scene;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshDescription {
    pub positions: Vec<[Float; 3]>,
    pub normals: Vec<[Float; 3]>,
    pub tangents: Vec<[Float; 3]>,
    pub indices: Vec<[u32; 3]>,
    pub material_id: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDescription {
    pub position: [Float; 3],
    pub direction: [Float; 3],
    pub up: [Float; 3],
    pub horizontal_fov: Float,
    pub near: Float,
    pub far: Float,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightDescription {
    pub position: [Float; 3],
    pub direction: [Float; 3],
    pub up: [Float; 3],
    pub size: [Float; 2],
    pub exitance: [Float; 3],
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Material {
    pub diffuse: DVec3,
    pub specular: DVec3,
    pub emissive: DVec3,
    pub shininess: Float,
    pub transparent: bool,
    pub mirror: bool,
    pub twosided: bool,
    /// Index of refraction, only meaningful when `transparent`.
    #[serde(default = "default_ior")]
    pub ior: Float,
}

fn default_ior() -> Float {
    1.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDescription {
    pub meshes: Vec<MeshDescription>,
    pub cameras: Vec<CameraDescription>,
    pub lights: Vec<LightDescription>,
    pub materials: Vec<Material>,
}

pub trait SceneLoader {
    fn load(&self, path: &Path) -> Result<SceneDescription>;
}

pub struct JsonSceneLoader;

impl SceneLoader for JsonSceneLoader {
    fn load(&self, path: &Path) -> Result<SceneDescription> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Input(format!("malformed scene {}: {e}", path.display())))
    }
}

/// Builds the core's `Scene` (material table, light table, intersector,
/// bounding sphere) from the external tuple. `camera_id` selects which of
/// the description's cameras to expose via `SelectedCamera`.
pub fn build_scene(description: &SceneDescription, camera_id: usize) -> Result<(Scene, SelectedCamera)> {
    if description.cameras.is_empty() {
        return Err(Error::Input("scene has no cameras".into()));
    }
    let camera_desc = description
        .cameras
        .get(camera_id)
        .ok_or_else(|| Error::Input(format!("camera id {camera_id} out of range")))?;

    let mut triangles = Vec::new();
    for mesh in &description.meshes {
        if mesh.material_id >= description.materials.len() {
            return Err(Error::Input(format!(
                "mesh references material {} but only {} materials defined",
                mesh.material_id,
                description.materials.len()
            )));
        }
        let material_tag = mesh.material_id as i32 + 1;
        for tri in &mesh.indices {
            let p = |i: u32| to_vec3(mesh.positions[i as usize]);
            let n = |i: u32| to_vec3(mesh.normals[i as usize]);
            let t = |i: u32| to_vec3(mesh.tangents.get(i as usize).copied().unwrap_or([1.0, 0.0, 0.0]));
            triangles.push(Triangle {
                p0: p(tri[0]),
                p1: p(tri[1]),
                p2: p(tri[2]),
                n0: n(tri[0]),
                n1: n(tri[1]),
                n2: n(tri[2]),
                tangent: t(tri[0]),
                material_tag,
            });
        }
    }

    let mut area_lights = Vec::with_capacity(description.lights.len());
    for (light_id, light) in description.lights.iter().enumerate() {
        let normal = to_vec3(light.direction).normalize();
        let up = to_vec3(light.up);
        // Re-orthogonalise against the authored "up" so a light's rectangle
        // is aligned with its authored tangent, not whatever Duff's
        // construction happened to pick.
        let tangent = (up - normal * up.dot(normal)).normalize();
        let bitangent = normal.cross(tangent);
        let frame = Frame {
            tangent,
            normal,
            bitangent,
        };
        let half_width = light.size[0] * 0.5;
        let half_depth = light.size[1] * 0.5;
        let position = to_vec3(light.position);

        // Light material tags occupy the negative range so a hit landing
        // on the quad recovers its light id through `Scene::query_bsdf`.
        let material_tag = -(light_id as i32) - 1;
        let p00 = position - tangent * half_width - bitangent * half_depth;
        let p10 = position + tangent * half_width - bitangent * half_depth;
        let p11 = position + tangent * half_width + bitangent * half_depth;
        let p01 = position - tangent * half_width + bitangent * half_depth;
        for (a, b, c) in [(p00, p10, p11), (p00, p11, p01)] {
            triangles.push(Triangle {
                p0: a,
                p1: b,
                p2: c,
                n0: normal,
                n1: normal,
                n2: normal,
                tangent,
                material_tag,
            });
        }

        area_lights.push(AreaLight {
            position,
            frame,
            half_width,
            half_depth,
            exitance: to_vec3(light.exitance),
        });
    }

    let lights = LightSet::new(area_lights);
    let intersector: Arc<dyn Intersector> = Arc::new(TriangleBvh::build(triangles));
    let scene = Scene::new(description.materials.clone(), lights, intersector);

    Ok((
        scene,
        SelectedCamera {
            position: to_vec3(camera_desc.position),
            direction: to_vec3(camera_desc.direction).normalize(),
            up: to_vec3(camera_desc.up),
            horizontal_fov: camera_desc.horizontal_fov,
        },
    ))
}

#[derive(Debug, Clone, Copy)]
pub struct SelectedCamera {
    pub position: DVec3,
    pub direction: DVec3,
    pub up: DVec3,
    pub horizontal_fov: Float,
}

fn to_vec3(v: [Float; 3]) -> DVec3 {
    DVec3::new(v[0], v[1], v[2])
}
