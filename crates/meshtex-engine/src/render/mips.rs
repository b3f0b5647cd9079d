//! CPU mip chain generation for the output target.
//!
//! The base level is read back after the draw, downsampled with a 2×2 box
//! filter level by level, and each level is written back into the texture.

use crate::backend::{Extent, RenderDevice, RenderError, TextureHandle};

const BPP: usize = 4;

/// Halves an RGBA8 image with a 2×2 box filter.
///
/// Odd edges reuse the last row/column, so every output texel averages four
/// samples. Output size never drops below 1×1.
pub fn downsample(src: &[u8], size: Extent) -> (Vec<u8>, Extent) {
    let out = size.mip(1);
    let (sw, sh) = (size.width as usize, size.height as usize);
    let mut dst = vec![0u8; out.width as usize * out.height as usize * BPP];

    for y in 0..out.height as usize {
        let y0 = (2 * y).min(sh - 1);
        let y1 = (2 * y + 1).min(sh - 1);
        for x in 0..out.width as usize {
            let x0 = (2 * x).min(sw - 1);
            let x1 = (2 * x + 1).min(sw - 1);
            let o = (y * out.width as usize + x) * BPP;
            for c in 0..BPP {
                let at = |xx: usize, yy: usize| src[(yy * sw + xx) * BPP + c] as u32;
                let sum = at(x0, y0) + at(x1, y0) + at(x0, y1) + at(x1, y1);
                dst[o + c] = ((sum + 2) / 4) as u8;
            }
        }
    }

    (dst, out)
}

/// Levels `1..levels` derived from `base`.
pub fn build_mip_chain(base: &[u8], size: Extent, levels: u32) -> Vec<(Extent, Vec<u8>)> {
    let mut chain = Vec::with_capacity(levels.saturating_sub(1) as usize);
    let mut current = (size, base.to_vec());
    for _ in 1..levels {
        let (data, extent) = downsample(&current.1, current.0);
        chain.push((extent, data.clone()));
        current = (extent, data);
    }
    chain
}

/// Regenerates levels `1..levels` of `texture` from its level 0.
///
/// Returns the number of levels written. Stops at the first failed write and
/// leaves the levels written so far in place.
pub fn generate_mipmaps<D: RenderDevice + ?Sized>(
    device: &mut D,
    texture: TextureHandle,
    size: Extent,
    levels: u32,
) -> Result<u32, RenderError> {
    if levels <= 1 {
        return Ok(0);
    }
    let base = device.read_texture(texture, 0)?;
    let expected = size.width as usize * size.height as usize * BPP;
    if base.len() != expected {
        return Err(RenderError::Readback(format!(
            "level 0 is {} bytes, expected {expected}",
            base.len()
        )));
    }

    let mut written = 0;
    for (level, (extent, data)) in (1..).zip(build_mip_chain(&base, size, levels)) {
        device.write_texture(texture, level, extent, &data)?;
        written += 1;
    }
    Ok(written)
}
