//! Device seam.
//!
//! The mesh texture drives a small graph of device objects through the
//! [`RenderDevice`] trait. Objects are referred to by typed, copyable handles
//! and released through a single [`RenderDevice::free`] entry point.
//!
//! Two implementations ship with the crate:
//! - [`WgpuDevice`] renders for real through wgpu
//! - [`DummyDevice`] records calls without touching a GPU

mod desc;
mod draw_list;
pub mod dummy;
mod error;
mod handle;
mod wgpu_device;

pub use desc::{
    AddressMode, AttributeFormat, BindingEntry, BindingLayout, BufferDesc, BufferUsage, CullMode,
    Extent, FilterMode, FrontFace, IndexFormat, PipelineDesc, PixelFormat, RasterState,
    SamplerDesc, ShaderBlob, ShaderCode, TextureDesc, TextureUsage, VertexAttribute,
    VERTEX_ATTRIBUTES,
};
pub use draw_list::{DrawCommand, DrawList};
pub use dummy::DummyDevice;
pub use error::{RenderError, RenderResult};
pub use handle::{
    BindingSetHandle, BufferHandle, FramebufferHandle, IndexArrayHandle, PipelineHandle,
    ResourceId, SamplerHandle, ShaderHandle, TextureHandle, VertexArrayHandle,
};
pub use wgpu_device::WgpuDevice;

/// Graphics device contract.
///
/// All calls happen on one logical thread. Creation calls either return a live
/// handle or a [`RenderError`]; they never hand out a handle to a half-built
/// object.
pub trait RenderDevice {
    /// False once the device is lost or destroyed. Frees against a dead device
    /// must be skipped by callers.
    fn is_alive(&self) -> bool;

    // Resource creation

    fn create_sampler(&mut self, desc: &SamplerDesc) -> RenderResult<SamplerHandle>;

    /// Creates a buffer initialised with `contents`.
    fn create_buffer(&mut self, desc: &BufferDesc<'_>, contents: &[u8])
    -> RenderResult<BufferHandle>;

    /// Overwrites part of an existing buffer without reallocating it.
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8])
    -> RenderResult<()>;

    /// Groups a position buffer and a uv buffer under the fixed vertex layout.
    fn create_vertex_array(
        &mut self,
        vertex_count: u32,
        buffers: [BufferHandle; 2],
    ) -> RenderResult<VertexArrayHandle>;

    fn create_index_array(
        &mut self,
        buffer: BufferHandle,
        format: IndexFormat,
        index_count: u32,
    ) -> RenderResult<IndexArrayHandle>;

    fn create_shader(&mut self, blob: &ShaderBlob) -> RenderResult<ShaderHandle>;

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> RenderResult<TextureHandle>;

    /// Binds mip level 0 of `color` as the single color attachment.
    fn create_framebuffer(&mut self, color: TextureHandle) -> RenderResult<FramebufferHandle>;

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> RenderResult<PipelineHandle>;

    /// Builds binding set 0 for `shader` from `entries` in slot order.
    fn create_binding_set(
        &mut self,
        shader: ShaderHandle,
        entries: &[BindingEntry],
    ) -> RenderResult<BindingSetHandle>;

    // Queries

    fn texture_exists(&self, texture: TextureHandle) -> bool;

    fn texture_size(&self, texture: TextureHandle) -> Option<Extent>;

    fn framebuffer_format(&self, framebuffer: FramebufferHandle) -> Option<PixelFormat>;

    // Transfer

    /// Reads one mip level back as tightly packed RGBA8 rows.
    fn read_texture(&mut self, texture: TextureHandle, mip_level: u32) -> RenderResult<Vec<u8>>;

    /// Uploads tightly packed RGBA8 rows into one mip level.
    fn write_texture(
        &mut self,
        texture: TextureHandle,
        mip_level: u32,
        size: Extent,
        data: &[u8],
    ) -> RenderResult<()>;

    // Execution

    fn submit_draw_list(&mut self, list: &DrawList) -> RenderResult<()>;

    // Cleanup

    /// Releases the object behind `id`. Unknown or already freed ids are ignored.
    fn free(&mut self, id: ResourceId);
}
