//! Headless GPU bring-up.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - reporting adapter information for diagnostics
//!
//! The resulting [`Gpu`] is handed to [`crate::backend::WgpuDevice`], which owns
//! every object the mesh texture creates.

mod gpu;
mod init;

pub use gpu::Gpu;
pub use init::GpuInit;
