use crate::backend::{Extent, SamplerDesc};
use crate::paint::Color;

/// Construction-time settings of a [`super::MeshTexture`].
///
/// `size`, `clear_color` and `generate_mipmaps` are only initial values; they
/// can be changed later through the setters. The rest is fixed for the
/// object's lifetime.
#[derive(Debug, Clone)]
pub struct MeshTextureConfig {
    pub size: Extent,
    pub clear_color: Color,
    pub generate_mipmaps: bool,

    /// Factor applied to planar (2-component) mesh positions.
    pub planar_scale: f32,

    /// Sampler used for the source texture. Created once.
    pub sampler: SamplerDesc,

    /// Bind the transform as a uniform at slot 0. When off, the binding set
    /// holds only the sampled texture and the transform is ignored.
    pub bind_transform: bool,

    /// Prefix for device object labels and log lines.
    pub label: String,
}

impl Default for MeshTextureConfig {
    fn default() -> Self {
        Self {
            size: Extent::new(256, 256),
            clear_color: Color::TRANSPARENT,
            generate_mipmaps: false,
            planar_scale: 0.01,
            sampler: SamplerDesc::default(),
            bind_transform: true,
            label: "meshtex".to_string(),
        }
    }
}
