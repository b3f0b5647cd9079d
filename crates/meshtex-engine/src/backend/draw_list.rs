use super::handle::{
    BindingSetHandle, FramebufferHandle, IndexArrayHandle, PipelineHandle, VertexArrayHandle,
};

/// A recorded command inside a draw pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    BindPipeline(PipelineHandle),
    BindVertexArray(VertexArrayHandle),
    BindSet { index: u32, set: BindingSetHandle },
    BindIndexArray(IndexArrayHandle),
    /// Indexed draws use the bound index array's count; otherwise the vertex
    /// array's vertex count.
    Draw { indexed: bool, instances: u32 },
}

/// One draw pass against a framebuffer, cleared to `clear_color` on begin.
///
/// Devices replay the commands in order inside a single render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawList {
    pub framebuffer: FramebufferHandle,
    /// Straight-alpha linear RGBA.
    pub clear_color: [f32; 4],
    pub commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn begin(framebuffer: FramebufferHandle, clear_color: [f32; 4]) -> Self {
        Self {
            framebuffer,
            clear_color,
            commands: Vec::with_capacity(6),
        }
    }

    #[inline]
    pub fn push(&mut self, cmd: DrawCommand) -> &mut Self {
        self.commands.push(cmd);
        self
    }
}
