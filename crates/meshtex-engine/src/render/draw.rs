use crate::backend::{
    BindingSetHandle, DrawCommand, DrawList, FramebufferHandle, IndexArrayHandle,
    PipelineHandle, RenderDevice, RenderResult, VertexArrayHandle,
};
use crate::paint::Color;

/// Handles a draw needs, as currently held by their slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawInputs {
    pub framebuffer: Option<FramebufferHandle>,
    pub pipeline: Option<PipelineHandle>,
    pub vertex_array: Option<VertexArrayHandle>,
    pub binding_set: Option<BindingSetHandle>,
    /// Optional: without it the draw is non-indexed.
    pub index_array: Option<IndexArrayHandle>,
    pub clear_color: Color,
}

/// Records the fixed draw sequence, or `None` if a required handle is missing.
pub fn record_draw(inputs: &DrawInputs) -> Option<DrawList> {
    let framebuffer = inputs.framebuffer?;
    let pipeline = inputs.pipeline?;
    let vertex_array = inputs.vertex_array?;
    let binding_set = inputs.binding_set?;

    let mut list = DrawList::begin(framebuffer, inputs.clear_color.clamped().to_array());
    list.push(DrawCommand::BindPipeline(pipeline))
        .push(DrawCommand::BindVertexArray(vertex_array))
        .push(DrawCommand::BindSet { index: 0, set: binding_set });
    if let Some(index_array) = inputs.index_array {
        list.push(DrawCommand::BindIndexArray(index_array));
    }
    list.push(DrawCommand::Draw {
        indexed: inputs.index_array.is_some(),
        instances: 1,
    });
    Some(list)
}

/// Submits the draw. Returns `Ok(false)` when it was skipped for missing inputs.
pub fn execute_draw<D: RenderDevice + ?Sized>(
    device: &mut D,
    inputs: &DrawInputs,
) -> RenderResult<bool> {
    let Some(list) = record_draw(inputs) else {
        log::trace!("draw skipped: {inputs:?}");
        return Ok(false);
    };
    device.submit_draw_list(&list)?;
    Ok(true)
}
