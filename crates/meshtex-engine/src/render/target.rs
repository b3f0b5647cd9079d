use crate::backend::{
    Extent, FramebufferHandle, PixelFormat, RenderDevice, RenderResult, TextureDesc,
    TextureHandle, TextureUsage,
};

/// Output texture plus the framebuffer bound to its level 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub texture: TextureHandle,
    pub framebuffer: FramebufferHandle,
    pub size: Extent,
    pub format: PixelFormat,
    pub mip_levels: u32,
}

/// Full mip chain length for `size`: `1 + floor(log2(max(w, h)))`.
///
/// Returns 0 for an empty extent.
#[inline]
pub fn mip_level_count(size: Extent) -> u32 {
    let largest = size.width.max(size.height);
    if largest == 0 {
        0
    } else {
        u32::BITS - largest.leading_zeros()
    }
}

/// Creates the output texture and its framebuffer.
///
/// On framebuffer failure the fresh texture is freed again, so the caller
/// either gets both objects or neither.
pub fn build_target<D: RenderDevice + ?Sized>(
    device: &mut D,
    size: Extent,
    with_mipmaps: bool,
    label: &str,
) -> RenderResult<RenderTarget> {
    let format = PixelFormat::Rgba8Unorm;
    let mip_levels = if with_mipmaps { mip_level_count(size) } else { 1 };

    let texture = device.create_texture(&TextureDesc {
        label,
        size,
        format,
        mip_level_count: mip_levels,
        usage: TextureUsage::RENDER_TARGET,
    })?;

    let framebuffer = match device.create_framebuffer(texture) {
        Ok(fb) => fb,
        Err(e) => {
            device.free(texture.into());
            return Err(e);
        }
    };

    log::trace!(
        "render target {label}: {}x{} with {mip_levels} mip level(s)",
        size.width,
        size.height
    );

    Ok(RenderTarget {
        texture,
        framebuffer,
        size,
        format,
        mip_levels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;

    #[test]
    fn mip_count_matches_log2_of_largest_side() {
        assert_eq!(mip_level_count(Extent::new(1, 1)), 1);
        assert_eq!(mip_level_count(Extent::new(256, 256)), 9);
        assert_eq!(mip_level_count(Extent::new(256, 16)), 9);
        assert_eq!(mip_level_count(Extent::new(300, 5)), 9);
        assert_eq!(mip_level_count(Extent::new(0, 0)), 0);
    }

    #[test]
    fn target_reserves_mip_levels_only_when_enabled() {
        let mut dev = DummyDevice::new();
        let plain = build_target(&mut dev, Extent::new(64, 32), false, "t").unwrap();
        assert_eq!(plain.mip_levels, 1);
        assert_eq!(dev.mip_level_count(plain.texture), Some(1));

        let mipped = build_target(&mut dev, Extent::new(64, 32), true, "t").unwrap();
        assert_eq!(mipped.mip_levels, 7);
        assert_eq!(dev.mip_level_count(mipped.texture), Some(7));
        assert_eq!(dev.framebuffer_format(mipped.framebuffer), Some(PixelFormat::Rgba8Unorm));
    }

    #[test]
    fn empty_size_is_rejected() {
        let mut dev = DummyDevice::new();
        assert!(build_target(&mut dev, Extent::new(0, 16), false, "t").is_err());
        assert_eq!(dev.live_count(), 0);
    }
}
