use crate::backend::{
    BindingLayout, PipelineDesc, PipelineHandle, PixelFormat, RasterState, RenderDevice,
    RenderResult, ShaderHandle,
};

/// Links `shader` with the fixed vertex format and raster state for `format`.
///
/// Planar meshes get the mirrored cull mode; blending, depth and multisampling
/// are always off.
pub fn build_pipeline<D: RenderDevice + ?Sized>(
    device: &mut D,
    shader: ShaderHandle,
    format: PixelFormat,
    planar: bool,
    layout: BindingLayout,
    label: &str,
) -> RenderResult<PipelineHandle> {
    let raster = RasterState::for_mesh(planar);
    let pipeline = device.create_pipeline(&PipelineDesc {
        label,
        shader,
        target_format: format,
        raster,
        layout,
    })?;
    log::trace!("pipeline {label}: {raster:?}, transform bound: {}", layout.transform);
    Ok(pipeline)
}
