use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::backend::{
    BindingEntry, BindingSetHandle, BufferDesc, BufferHandle, BufferUsage, RenderDevice,
    RenderResult, SamplerHandle, ShaderHandle, TextureHandle,
};

// ── transform uniform ─────────────────────────────────────────────────────

/// GPU layout of the transform constant: one column-major 4×4 matrix.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TransformUniform {
    pub matrix: [[f32; 4]; 4],
}

impl From<Mat4> for TransformUniform {
    fn from(m: Mat4) -> Self {
        Self { matrix: m.to_cols_array_2d() }
    }
}

impl TransformUniform {
    /// Creates the uniform buffer holding `matrix`.
    pub fn create<D: RenderDevice + ?Sized>(
        device: &mut D,
        matrix: Mat4,
    ) -> RenderResult<BufferHandle> {
        let data = Self::from(matrix);
        device.create_buffer(
            &BufferDesc { label: "meshtex transform", usage: BufferUsage::Uniform },
            bytemuck::bytes_of(&data),
        )
    }
}

/// Overwrites the transform buffer in place.
pub fn write_transform<D: RenderDevice + ?Sized>(
    device: &mut D,
    buffer: BufferHandle,
    matrix: Mat4,
) -> RenderResult<()> {
    let data = TransformUniform::from(matrix);
    device.write_buffer(buffer, 0, bytemuck::bytes_of(&data))
}

// ── binding set ───────────────────────────────────────────────────────────

/// Entries of binding set 0 in slot order: optional transform, then the
/// sampled source texture.
pub fn binding_entries(
    transform: Option<BufferHandle>,
    sampler: SamplerHandle,
    texture: TextureHandle,
) -> Vec<BindingEntry> {
    let mut entries = Vec::with_capacity(2);
    if let Some(buffer) = transform {
        entries.push(BindingEntry::Uniform(buffer));
    }
    entries.push(BindingEntry::SampledTexture { sampler, texture });
    entries
}

pub fn build_binding_set<D: RenderDevice + ?Sized>(
    device: &mut D,
    shader: ShaderHandle,
    entries: &[BindingEntry],
) -> RenderResult<BindingSetHandle> {
    device.create_binding_set(shader, entries)
}
