use crate::backend::{RenderDevice, RenderResult, ShaderBlob, ShaderHandle};

const TEXTURED_WGSL: &str = include_str!("shaders/textured.wgsl");
const TEXTURED_FLAT_WGSL: &str = include_str!("shaders/textured_flat.wgsl");

/// Built-in program: samples the source texture over the mesh.
///
/// `with_transform` selects the variant whose binding set starts with the
/// transform uniform.
pub fn default_shader(with_transform: bool) -> ShaderBlob {
    if with_transform {
        ShaderBlob::wgsl("meshtex textured", TEXTURED_WGSL)
    } else {
        ShaderBlob::wgsl("meshtex textured (flat)", TEXTURED_FLAT_WGSL)
    }
}

pub fn build_shader<D: RenderDevice + ?Sized>(
    device: &mut D,
    blob: &ShaderBlob,
) -> RenderResult<ShaderHandle> {
    let handle = device.create_shader(blob)?;
    log::trace!("compiled shader {:?}", blob.label);
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ShaderCode;

    #[test]
    fn default_shader_variants_use_standard_entry_points() {
        for with_transform in [true, false] {
            let blob = default_shader(with_transform);
            assert_eq!(blob.vertex_entry, "vs_main");
            assert_eq!(blob.fragment_entry, "fs_main");
            let ShaderCode::Wgsl(src) = &blob.code else {
                panic!("default shader is WGSL");
            };
            assert_eq!(src.contains("var<uniform> transform"), with_transform);
        }
    }
}
