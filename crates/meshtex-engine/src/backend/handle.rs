//! Opaque device handles.
//!
//! Handles are plain ids handed out by a [`super::RenderDevice`]. They carry no
//! ownership themselves; ownership is expressed by the slot that stores them.

use std::fmt;

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            /// Raw id, unique per device for the device's lifetime.
            #[inline]
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl From<$name> for ResourceId {
            #[inline]
            fn from(handle: $name) -> Self {
                ResourceId::$kind(handle.0)
            }
        }
    };
}

device_handle!(
    /// Handle to a GPU buffer (vertex, index or uniform).
    BufferHandle => Buffer
);
device_handle!(
    /// Handle to a 2D texture, including all of its mip levels.
    TextureHandle => Texture
);
device_handle!(
    /// Handle to a framebuffer (one color attachment bound to mip level 0).
    FramebufferHandle => Framebuffer
);
device_handle!(
    /// Handle to a sampler.
    SamplerHandle => Sampler
);
device_handle!(
    /// Handle to a compiled shader module.
    ShaderHandle => Shader
);
device_handle!(
    /// Handle to a graphics pipeline.
    PipelineHandle => Pipeline
);
device_handle!(
    /// Handle to a binding (uniform/descriptor) set.
    BindingSetHandle => BindingSet
);
device_handle!(
    /// Handle to a vertex array: the two vertex buffers under the fixed layout.
    VertexArrayHandle => VertexArray
);
device_handle!(
    /// Handle to an index array: an index buffer plus its width and count.
    IndexArrayHandle => IndexArray
);

/// Tagged id of any device object, accepted by [`super::RenderDevice::free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Buffer(u64),
    Texture(u64),
    Framebuffer(u64),
    Sampler(u64),
    Shader(u64),
    Pipeline(u64),
    BindingSet(u64),
    VertexArray(u64),
    IndexArray(u64),
}

impl ResourceId {
    /// Raw id without the kind tag.
    pub fn raw(self) -> u64 {
        match self {
            Self::Buffer(id)
            | Self::Texture(id)
            | Self::Framebuffer(id)
            | Self::Sampler(id)
            | Self::Shader(id)
            | Self::Pipeline(id)
            | Self::BindingSet(id)
            | Self::VertexArray(id)
            | Self::IndexArray(id) => id,
        }
    }

    /// Short kind name used in log lines.
    pub fn kind(self) -> &'static str {
        match self {
            Self::Buffer(_) => "buffer",
            Self::Texture(_) => "texture",
            Self::Framebuffer(_) => "framebuffer",
            Self::Sampler(_) => "sampler",
            Self::Shader(_) => "shader",
            Self::Pipeline(_) => "pipeline",
            Self::BindingSet(_) => "binding set",
            Self::VertexArray(_) => "vertex array",
            Self::IndexArray(_) => "index array",
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind(), self.raw())
    }
}
