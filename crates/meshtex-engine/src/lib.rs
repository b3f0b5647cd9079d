//! Meshtex engine crate.
//!
//! Renders a textured mesh through a user shader into an off-screen color
//! target and exposes the result as a sampleable texture that is rebuilt only
//! when one of its inputs changes.

pub mod backend;
pub mod device;
pub mod geometry;
pub mod logging;
pub mod mesh_texture;
pub mod paint;
pub mod render;
pub mod resource;
pub mod schedule;

pub use mesh_texture::{Changed, MeshTexture, MeshTextureConfig};
