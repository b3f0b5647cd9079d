//! Device-independent descriptors consumed by [`super::RenderDevice`].

use bitflags::bitflags;

use super::handle::{BufferHandle, SamplerHandle, ShaderHandle, TextureHandle};

// ── extent ────────────────────────────────────────────────────────────────

/// 2D integer extent in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either side is zero; such a target cannot be created.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Size of mip level `level`, never smaller than 1×1.
    #[inline]
    pub fn mip(self, level: u32) -> Self {
        Self {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
        }
    }
}

// ── formats ───────────────────────────────────────────────────────────────

/// Pixel formats the output target may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 8 bits per channel RGBA, linear.
    #[default]
    Rgba8Unorm,
}

impl PixelFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8Unorm => 4,
        }
    }
}

/// Index element width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    #[inline]
    pub fn byte_size(self) -> usize {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

// ── sampler ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Sampler configuration. The default is trilinear filtering with edge clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    pub label: String,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_mode: AddressMode,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            label: "meshtex sampler".to_string(),
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            address_mode: AddressMode::ClampToEdge,
        }
    }
}

// ── buffers ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    /// Uniform buffer that is rewritten in place.
    Uniform,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub usage: BufferUsage,
}

// ── textures ──────────────────────────────────────────────────────────────

bitflags! {
    /// Texture usage flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 1 << 0;
        const COLOR_ATTACHMENT = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
        /// Everything an output target needs: sampled elsewhere, rendered
        /// into, read back and written per mip level.
        const RENDER_TARGET = Self::SAMPLED.bits()
            | Self::COLOR_ATTACHMENT.bits()
            | Self::COPY_SRC.bits()
            | Self::COPY_DST.bits();
    }
}

#[derive(Debug, Clone)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub size: Extent,
    pub format: PixelFormat,
    pub mip_level_count: u32,
    pub usage: TextureUsage,
}

// ── shaders ───────────────────────────────────────────────────────────────

/// Shader program payload. The device treats it as an opaque blob.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderCode {
    Wgsl(String),
    /// SPIR-V words as raw bytes, native endianness.
    SpirV(Vec<u8>),
}

/// A compiled (or compilable) shader program plus its entry points.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderBlob {
    pub label: String,
    pub code: ShaderCode,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

impl ShaderBlob {
    /// WGSL program with the conventional `vs_main` / `fs_main` entry points.
    pub fn wgsl(label: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            code: ShaderCode::Wgsl(source.into()),
            vertex_entry: "vs_main".to_string(),
            fragment_entry: "fs_main".to_string(),
        }
    }

    /// SPIR-V program with explicit entry points.
    pub fn spirv(
        label: impl Into<String>,
        bytes: Vec<u8>,
        vertex_entry: impl Into<String>,
        fragment_entry: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            code: ShaderCode::SpirV(bytes),
            vertex_entry: vertex_entry.into(),
            fragment_entry: fragment_entry.into(),
        }
    }
}

// ── vertex layout ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    Float32x2,
    Float32x3,
}

impl AttributeFormat {
    #[inline]
    pub fn byte_size(self) -> u64 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
        }
    }
}

/// One vertex attribute, sourced from its own tightly packed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: AttributeFormat,
}

/// The fixed vertex format: location 0 = position, location 1 = uv.
pub const VERTEX_ATTRIBUTES: [VertexAttribute; 2] = [
    VertexAttribute { location: 0, format: AttributeFormat::Float32x3 },
    VertexAttribute { location: 1, format: AttributeFormat::Float32x2 },
];

// ── pipeline ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    Ccw,
    Cw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Rasterization state. Depth testing and multisampling are always off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterState {
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
}

impl RasterState {
    /// Planar sources come out mirrored relative to 3D ones, so they cull the
    /// opposite face.
    pub fn for_mesh(planar: bool) -> Self {
        Self {
            front_face: FrontFace::Ccw,
            cull_mode: if planar { CullMode::Front } else { CullMode::Back },
        }
    }
}

/// Shape of binding set 0.
///
/// With a transform: binding 0 = transform uniform, 1 = texture, 2 = sampler.
/// Without: binding 0 = texture, 1 = sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingLayout {
    pub transform: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineDesc<'a> {
    pub label: &'a str,
    pub shader: ShaderHandle,
    pub target_format: PixelFormat,
    pub raster: RasterState,
    pub layout: BindingLayout,
}

/// One entry of a binding set, in slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingEntry {
    Uniform(BufferHandle),
    SampledTexture {
        sampler: SamplerHandle,
        texture: TextureHandle,
    },
}

impl BindingEntry {
    /// Layout implied by an entry list.
    pub fn layout_of(entries: &[BindingEntry]) -> BindingLayout {
        BindingLayout {
            transform: entries.iter().any(|e| matches!(e, BindingEntry::Uniform(_))),
        }
    }
}
