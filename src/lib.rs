//! Snow that falls over a map.
//!
//! Particles live in world space on the GPU: a spawn kernel seeds them once per allocation, an
//! update kernel moves them every frame, and a billboard pass draws each one as a disc with a
//! constant pixel radius, however the camera is tilted or rotated. The host renderer hands over
//! a [`CameraFrame`] every frame and drives repaints.

pub mod constants;
pub mod fs;
pub mod graphics;
pub mod shaders;
pub mod simulation;

pub use fs::SnowOptions;
pub use graphics::camera::{CameraFrame, MapCamera, Projection, ProjectionKind};
pub use graphics::gpu::{CapabilityError, GpuContext, InitError};
pub use graphics::{Readiness, RepaintHandle, SnowLayer};
