//! Core

// Re-export.
pub mod beta;
pub mod camera;
pub mod cli;
pub mod error;
pub mod estimators;
pub mod film;
pub mod geometry;
pub mod imageio;
pub mod light;
pub mod pbrt;
pub mod progressive;
pub mod reflection;
pub mod rng;
pub mod scene;
pub mod sceneio;
pub mod spatial_index;
pub mod stats;
pub mod vertex;
