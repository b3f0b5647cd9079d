//! Headless demo: renders a checkerboard through a spinning quad into a mesh
//! texture, feeds that texture into a second mesh texture, and writes PNGs.
//!
//! Usage: `meshtex-studio [out_dir] [frames]`. Set `MESHTEX_SOFTWARE` to force
//! the software adapter and `WGPU_BACKEND` to restrict backends.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use glam::Mat4;

use meshtex_engine::backend::{
    Extent, PixelFormat, RenderDevice, TextureDesc, TextureHandle, TextureUsage, WgpuDevice,
};
use meshtex_engine::device::{Gpu, GpuInit};
use meshtex_engine::geometry::MeshSource;
use meshtex_engine::logging::{LoggingConfig, init_logging};
use meshtex_engine::paint::Color;
use meshtex_engine::schedule::TickLoop;
use meshtex_engine::{MeshTexture, MeshTextureConfig};

const CHECKER_SIZE: u32 = 64;
const CHECKER_CELL: u32 = 8;
const OUTPUT_SIZE: u32 = 256;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let mut args = std::env::args().skip(1);
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "meshtex-out".to_string()));
    let frames: u32 = match args.next() {
        Some(n) => n.parse().with_context(|| format!("invalid frame count `{n}`"))?,
        None => 8,
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let init = if std::env::var_os("MESHTEX_SOFTWARE").is_some() {
        GpuInit::software()
    } else {
        GpuInit::default()
    };
    let gpu = pollster::block_on(Gpu::new_headless(init.with_env_backends()))?;
    let info = gpu.adapter_info();
    println!("adapter: {} ({:?})", info.name, info.backend);

    let device = Rc::new(RefCell::new(WgpuDevice::from_gpu(gpu)));
    let ticks = TickLoop::new();

    let checker = checker_texture(&mut device.borrow_mut())?;

    let spinner: MeshTexture = MeshTexture::new(
        &device,
        &ticks,
        MeshTextureConfig {
            size: Extent::new(OUTPUT_SIZE, OUTPUT_SIZE),
            clear_color: Color::rgba(0.08, 0.09, 0.12, 1.0),
            label: "spinner".to_string(),
            ..Default::default()
        },
    );
    spinner.set_mesh(Some(Rc::new(MeshSource::quad())));
    spinner.set_source_texture(Some(checker.into()));

    // Second stage samples the first one's output through a half-size quad.
    let framed: MeshTexture = MeshTexture::new(
        &device,
        &ticks,
        MeshTextureConfig {
            size: Extent::new(OUTPUT_SIZE, OUTPUT_SIZE),
            clear_color: Color::WHITE,
            generate_mipmaps: true,
            label: "framed".to_string(),
            ..Default::default()
        },
    );
    framed.set_mesh(Some(Rc::new(MeshSource::quad())));
    framed.set_transform(Mat4::from_scale(glam::Vec3::splat(0.8)));
    framed.set_source_texture(Some(spinner.texture_ref()));
    let relay = framed.clone();
    spinner.subscribe(move |_| relay.request_redraw());

    for frame in 0..frames {
        let angle = frame as f32 / frames.max(1) as f32 * std::f32::consts::TAU;
        spinner.set_transform(Mat4::from_rotation_z(angle) * Mat4::from_scale(glam::Vec3::splat(0.7)));

        let ran = ticks.run_until_idle(8);
        log::debug!("frame {frame}: {ran} tick(s)");

        if !framed.is_ready() {
            bail!("frame {frame}: output not ready ({:?})", framed.status());
        }
        let Some(texture) = framed.texture() else {
            bail!("frame {frame}: no output texture");
        };
        let path = out_dir.join(format!("frame_{frame:03}.png"));
        save_png(&mut device.borrow_mut(), texture, framed.size(), &path)?;
        println!("wrote {}", path.display());
    }

    if let Some(texture) = framed.texture() {
        save_mip_chain(&mut device.borrow_mut(), texture, framed.size(), &out_dir)?;
    }

    let status = framed.status();
    println!(
        "done: {frames} frame(s), {} pass(es) on the output texture",
        status.passes
    );

    spinner.teardown();
    framed.teardown();
    device.borrow_mut().free(checker.into());
    Ok(())
}

fn checker_texture(device: &mut WgpuDevice) -> Result<TextureHandle> {
    let size = Extent::new(CHECKER_SIZE, CHECKER_SIZE);
    let texture = device.create_texture(&TextureDesc {
        label: "checker",
        size,
        format: PixelFormat::Rgba8Unorm,
        mip_level_count: 1,
        usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
    })?;

    let mut data = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    for y in 0..CHECKER_SIZE {
        for x in 0..CHECKER_SIZE {
            let light = ((x / CHECKER_CELL) + (y / CHECKER_CELL)) % 2 == 0;
            let px = if light {
                [236, 200, 120, 255]
            } else {
                [40, 70, 140, 255]
            };
            data.extend_from_slice(&px);
        }
    }
    device.write_texture(texture, 0, size, &data)?;
    Ok(texture)
}

fn save_png(device: &mut WgpuDevice, texture: TextureHandle, size: Extent, path: &Path) -> Result<()> {
    let pixels = device.read_texture(texture, 0)?;
    let image = image::RgbaImage::from_raw(size.width, size.height, pixels)
        .context("readback size does not match the texture extent")?;
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Writes every level below the base of the output's mip chain.
fn save_mip_chain(device: &mut WgpuDevice, texture: TextureHandle, size: Extent, dir: &Path) -> Result<()> {
    let levels = meshtex_engine::render::mip_level_count(size);
    for level in 1..levels {
        let extent = size.mip(level);
        let pixels = device.read_texture(texture, level)?;
        let image = image::RgbaImage::from_raw(extent.width, extent.height, pixels)
            .with_context(|| format!("mip {level}: readback size mismatch"))?;
        let path = dir.join(format!("mip_{level}.png"));
        image
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}
