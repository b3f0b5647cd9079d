//! Builders for the mesh texture's device objects.
//!
//! Each builder is a free function over a [`crate::backend::RenderDevice`]. Builders
//! never store handles; the caller decides which slot the result lands in.
//!
//! Stage order inside a resolve pass:
//! shader → target + pipeline → binding set → geometry → draw → mips.

mod binding;
mod draw;
mod geometry;
mod mips;
mod pipeline;
mod shader;
mod target;

pub use binding::{TransformUniform, binding_entries, build_binding_set, write_transform};
pub use draw::{DrawInputs, execute_draw, record_draw};
pub use geometry::{GeometryHandles, upload_geometry};
pub use mips::{build_mip_chain, downsample, generate_mipmaps};
pub use pipeline::build_pipeline;
pub use shader::{build_shader, default_shader};
pub use target::{RenderTarget, build_target, mip_level_count};
