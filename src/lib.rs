//! Offline, unbiased, physically based renderer.
//!
//! The crate is organised the way the core of a path tracer grows: low-level
//! math and randomness at the bottom, scattering and light models on top of
//! that, an acceleration-agnostic scene facade above those, and the transport
//! estimators (path tracing, bidirectional path tracing, vertex connection
//! and merging) driving everything through a thread-parallel frame driver.

pub mod accelerators;
pub mod core;

pub use crate::core::error::{Error, Result};
