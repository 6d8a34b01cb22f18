//! Geometry primitives: rays, angular bounds, tangent frames and the surface
//! point / hit record produced by intersecting the scene.

pub mod bounds;
pub mod frame;
pub mod interaction;
pub mod ray;

pub use bounds::{angular_bound, AngularBound};
pub use frame::Frame;
pub use interaction::{Hit, SurfacePoint};
pub use ray::Ray;
