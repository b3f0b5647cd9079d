//! wgpu implementation of [`RenderDevice`].
//!
//! Objects live in per-kind maps keyed by the raw handle id. Creation calls,
//! copies and submissions are wrapped in a validation error scope so a
//! rejected shader, pipeline or draw turns into a [`RenderError`]. Anything
//! that still escapes a scope is logged by the uncaptured-error handler
//! instead of aborting the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use wgpu::util::DeviceExt;

use super::{
    AddressMode, AttributeFormat, BindingEntry, BindingLayout, BindingSetHandle, BufferDesc,
    BufferHandle, BufferUsage, CullMode, DrawCommand, DrawList, Extent, FilterMode,
    FramebufferHandle, FrontFace, IndexArrayHandle, IndexFormat, PipelineDesc, PipelineHandle,
    PixelFormat, RenderDevice, RenderError, RenderResult, ResourceId, SamplerDesc, SamplerHandle,
    ShaderBlob, ShaderCode, ShaderHandle, TextureDesc, TextureHandle, TextureUsage,
    VERTEX_ATTRIBUTES, VertexArrayHandle,
};
use crate::device::Gpu;

struct ShaderRecord {
    module: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_entry: String,
}

struct TextureRecord {
    texture: wgpu::Texture,
    size: Extent,
    format: PixelFormat,
    usage: TextureUsage,
}

struct FramebufferRecord {
    view: wgpu::TextureView,
    color: TextureHandle,
}

struct VertexArrayRecord {
    buffers: [BufferHandle; 2],
    vertex_count: u32,
}

struct IndexArrayRecord {
    buffer: BufferHandle,
    format: IndexFormat,
    index_count: u32,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    alive: Arc<AtomicBool>,

    next_id: u64,

    samplers: HashMap<u64, wgpu::Sampler>,
    buffers: HashMap<u64, wgpu::Buffer>,
    vertex_arrays: HashMap<u64, VertexArrayRecord>,
    index_arrays: HashMap<u64, IndexArrayRecord>,
    shaders: HashMap<u64, ShaderRecord>,
    textures: HashMap<u64, TextureRecord>,
    framebuffers: HashMap<u64, FramebufferRecord>,
    pipelines: HashMap<u64, wgpu::RenderPipeline>,
    binding_sets: HashMap<u64, wgpu::BindGroup>,

    /// Bind group layouts are shared by every pipeline and set of the same shape.
    layouts: HashMap<BindingLayout, wgpu::BindGroupLayout>,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let alive = Arc::new(AtomicBool::new(true));
        let flag = alive.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("wgpu device lost ({reason:?}): {message}");
            flag.store(false, Ordering::Release);
        });
        // wgpu's default handler panics.
        device.on_uncaptured_error(Arc::new(|error| {
            log::warn!("uncaptured wgpu error: {error}");
        }));

        Self {
            device,
            queue,
            alive,
            next_id: 0,
            samplers: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            index_arrays: HashMap::new(),
            shaders: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            pipelines: HashMap::new(),
            binding_sets: HashMap::new(),
            layouts: HashMap::new(),
        }
    }

    pub fn from_gpu(gpu: Gpu) -> Self {
        let (device, queue) = gpu.into_parts();
        Self::new(device, queue)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Borrows the wgpu texture behind `handle`, e.g. to bind it elsewhere.
    pub fn raw_texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        self.textures.get(&handle.0).map(|t| &t.texture)
    }

    /// Number of live objects across all kinds.
    pub fn live_count(&self) -> usize {
        self.samplers.len()
            + self.buffers.len()
            + self.vertex_arrays.len()
            + self.index_arrays.len()
            + self.shaders.len()
            + self.textures.len()
            + self.framebuffers.len()
            + self.pipelines.len()
            + self.binding_sets.len()
    }

    // ── private helpers ───────────────────────────────────────────────────

    fn next_id(&mut self) -> RenderResult<u64> {
        if !self.is_alive() {
            return Err(RenderError::DeviceLost);
        }
        self.next_id += 1;
        Ok(self.next_id)
    }

    /// Runs `f` inside a validation error scope and reports the captured error.
    fn validated<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        match pollster::block_on(scope.pop()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }

    fn layout(&mut self, shape: BindingLayout) -> &wgpu::BindGroupLayout {
        let device = &self.device;
        self.layouts.entry(shape).or_insert_with(|| {
            let texture = wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            };
            let sampler = wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering);

            let mut kinds = Vec::with_capacity(3);
            if shape.transform {
                kinds.push((
                    wgpu::ShaderStages::VERTEX,
                    wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                ));
            }
            kinds.push((wgpu::ShaderStages::FRAGMENT, texture));
            kinds.push((wgpu::ShaderStages::FRAGMENT, sampler));

            let entries: Vec<_> = kinds
                .into_iter()
                .enumerate()
                .map(|(i, (visibility, ty))| wgpu::BindGroupLayoutEntry {
                    binding: i as u32,
                    visibility,
                    ty,
                    count: None,
                })
                .collect();

            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(if shape.transform {
                    "meshtex bgl (transform)"
                } else {
                    "meshtex bgl"
                }),
                entries: &entries,
            })
        })
    }

    fn require(&self, id: ResourceId) -> RenderResult<()> {
        let raw = id.raw();
        let present = match id {
            ResourceId::Buffer(_) => self.buffers.contains_key(&raw),
            ResourceId::Texture(_) => self.textures.contains_key(&raw),
            ResourceId::Framebuffer(_) => self.framebuffers.contains_key(&raw),
            ResourceId::Sampler(_) => self.samplers.contains_key(&raw),
            ResourceId::Shader(_) => self.shaders.contains_key(&raw),
            ResourceId::Pipeline(_) => self.pipelines.contains_key(&raw),
            ResourceId::BindingSet(_) => self.binding_sets.contains_key(&raw),
            ResourceId::VertexArray(_) => self.vertex_arrays.contains_key(&raw),
            ResourceId::IndexArray(_) => self.index_arrays.contains_key(&raw),
        };
        if present { Ok(()) } else { Err(RenderError::InvalidHandle(id)) }
    }
}

impl RenderDevice for WgpuDevice {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> RenderResult<SamplerHandle> {
        let id = self.next_id()?;
        let address = convert_address_mode(desc.address_mode);
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(desc.label.as_str()),
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: convert_filter_mode(desc.mag_filter),
            min_filter: convert_filter_mode(desc.min_filter),
            mipmap_filter: convert_mipmap_filter_mode(desc.mipmap_filter),
            ..Default::default()
        });
        self.samplers.insert(id, sampler);
        Ok(SamplerHandle(id))
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDesc<'_>,
        contents: &[u8],
    ) -> RenderResult<BufferHandle> {
        let id = self.next_id()?;
        let usage = match desc.usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        };
        let buffer = self
            .validated(|device| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(desc.label),
                    contents,
                    usage,
                })
            })
            .map_err(RenderError::BufferRejected)?;
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> RenderResult<()> {
        let buf = self
            .buffers
            .get(&buffer.0)
            .ok_or(RenderError::InvalidHandle(buffer.into()))?;
        if offset + data.len() as u64 > buf.size() {
            return Err(RenderError::BufferRejected(format!(
                "write of {} bytes at {offset} overruns {} byte buffer",
                data.len(),
                buf.size()
            )));
        }
        self.queue.write_buffer(buf, offset, data);
        Ok(())
    }

    fn create_vertex_array(
        &mut self,
        vertex_count: u32,
        buffers: [BufferHandle; 2],
    ) -> RenderResult<VertexArrayHandle> {
        for b in buffers {
            self.require(b.into())?;
        }
        let id = self.next_id()?;
        self.vertex_arrays.insert(id, VertexArrayRecord { buffers, vertex_count });
        Ok(VertexArrayHandle(id))
    }

    fn create_index_array(
        &mut self,
        buffer: BufferHandle,
        format: IndexFormat,
        index_count: u32,
    ) -> RenderResult<IndexArrayHandle> {
        self.require(buffer.into())?;
        let id = self.next_id()?;
        self.index_arrays.insert(id, IndexArrayRecord { buffer, format, index_count });
        Ok(IndexArrayHandle(id))
    }

    fn create_shader(&mut self, blob: &ShaderBlob) -> RenderResult<ShaderHandle> {
        let id = self.next_id()?;
        let source = match &blob.code {
            ShaderCode::Wgsl(src) => wgpu::ShaderSource::Wgsl(src.as_str().into()),
            ShaderCode::SpirV(bytes) => {
                if bytes.is_empty() || bytes.len() % 4 != 0 {
                    return Err(RenderError::ShaderRejected(format!(
                        "{}: SPIR-V length {} is not a whole number of words",
                        blob.label,
                        bytes.len()
                    )));
                }
                wgpu::util::make_spirv(bytes)
            }
        };
        let module = self
            .validated(|device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(blob.label.as_str()),
                    source,
                })
            })
            .map_err(|e| RenderError::ShaderRejected(format!("{}: {e}", blob.label)))?;

        self.shaders.insert(
            id,
            ShaderRecord {
                module,
                vertex_entry: blob.vertex_entry.clone(),
                fragment_entry: blob.fragment_entry.clone(),
            },
        );
        Ok(ShaderHandle(id))
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> RenderResult<TextureHandle> {
        if desc.size.is_empty() {
            return Err(RenderError::TextureRejected(format!("{}: empty extent", desc.label)));
        }
        let id = self.next_id()?;
        let texture = self
            .validated(|device| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(desc.label),
                    size: wgpu::Extent3d {
                        width: desc.size.width,
                        height: desc.size.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: desc.mip_level_count,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: convert_pixel_format(desc.format),
                    usage: convert_texture_usage(desc.usage),
                    view_formats: &[],
                })
            })
            .map_err(|e| RenderError::TextureRejected(format!("{}: {e}", desc.label)))?;

        self.textures.insert(
            id,
            TextureRecord {
                texture,
                size: desc.size,
                format: desc.format,
                usage: desc.usage,
            },
        );
        Ok(TextureHandle(id))
    }

    fn create_framebuffer(&mut self, color: TextureHandle) -> RenderResult<FramebufferHandle> {
        let tex = self
            .textures
            .get(&color.0)
            .ok_or(RenderError::InvalidHandle(color.into()))?;
        let view = tex.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("meshtex framebuffer view"),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });
        let id = self.next_id()?;
        self.framebuffers.insert(id, FramebufferRecord { view, color });
        Ok(FramebufferHandle(id))
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> RenderResult<PipelineHandle> {
        self.require(desc.shader.into())?;
        let id = self.next_id()?;
        let bgl = self.layout(desc.layout).clone();

        let Some(shader) = self.shaders.get(&desc.shader.0) else {
            return Err(RenderError::InvalidHandle(desc.shader.into()));
        };

        let attrs: Vec<[wgpu::VertexAttribute; 1]> = VERTEX_ATTRIBUTES
            .iter()
            .map(|a| {
                [wgpu::VertexAttribute {
                    format: convert_attribute_format(a.format),
                    offset: 0,
                    shader_location: a.location,
                }]
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout<'_>> = VERTEX_ATTRIBUTES
            .iter()
            .zip(&attrs)
            .map(|(a, attr)| wgpu::VertexBufferLayout {
                array_stride: a.format.byte_size(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attr,
            })
            .collect();

        let pipeline = self
            .validated(|device| {
                let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(desc.label),
                    bind_group_layouts: &[&bgl],
                    immediate_size: 0,
                });

                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(desc.label),
                    layout: Some(&layout),
                    vertex: wgpu::VertexState {
                        module: &shader.module,
                        entry_point: Some(shader.vertex_entry.as_str()),
                        buffers: &vertex_buffers,
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader.module,
                        entry_point: Some(shader.fragment_entry.as_str()),
                        compilation_options: Default::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: convert_pixel_format(desc.target_format),
                            blend: Some(wgpu::BlendState::REPLACE),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: match desc.raster.front_face {
                            FrontFace::Ccw => wgpu::FrontFace::Ccw,
                            FrontFace::Cw => wgpu::FrontFace::Cw,
                        },
                        cull_mode: match desc.raster.cull_mode {
                            CullMode::None => None,
                            CullMode::Front => Some(wgpu::Face::Front),
                            CullMode::Back => Some(wgpu::Face::Back),
                        },
                        unclipped_depth: false,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview_mask: None,
                    cache: None,
                })
            })
            .map_err(|e| RenderError::PipelineRejected(format!("{}: {e}", desc.label)))?;

        self.pipelines.insert(id, pipeline);
        Ok(PipelineHandle(id))
    }

    fn create_binding_set(
        &mut self,
        shader: ShaderHandle,
        entries: &[BindingEntry],
    ) -> RenderResult<BindingSetHandle> {
        self.require(shader.into())?;
        for entry in entries {
            match *entry {
                BindingEntry::Uniform(b) => self.require(b.into())?,
                BindingEntry::SampledTexture { sampler, texture } => {
                    self.require(sampler.into())?;
                    self.require(texture.into())?;
                }
            }
        }
        let id = self.next_id()?;
        let bgl = self.layout(BindingEntry::layout_of(entries)).clone();

        // Views must outlive the descriptor.
        let views: Vec<Option<wgpu::TextureView>> = entries
            .iter()
            .map(|e| match e {
                BindingEntry::SampledTexture { texture, .. } => self
                    .textures
                    .get(&texture.0)
                    .map(|t| t.texture.create_view(&wgpu::TextureViewDescriptor::default())),
                BindingEntry::Uniform(_) => None,
            })
            .collect();

        let mut bind_entries = Vec::with_capacity(entries.len() + 1);
        let mut slot = 0u32;
        for (entry, view) in entries.iter().zip(&views) {
            match (*entry, view) {
                (BindingEntry::Uniform(b), _) => {
                    let buffer = self
                        .buffers
                        .get(&b.0)
                        .ok_or(RenderError::InvalidHandle(b.into()))?;
                    bind_entries.push(wgpu::BindGroupEntry {
                        binding: slot,
                        resource: buffer.as_entire_binding(),
                    });
                    slot += 1;
                }
                (BindingEntry::SampledTexture { sampler, texture }, Some(view)) => {
                    let sampler = self
                        .samplers
                        .get(&sampler.0)
                        .ok_or(RenderError::InvalidHandle(sampler.into()))?;
                    bind_entries.push(wgpu::BindGroupEntry {
                        binding: slot,
                        resource: wgpu::BindingResource::TextureView(view),
                    });
                    bind_entries.push(wgpu::BindGroupEntry {
                        binding: slot + 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    });
                    slot += 2;
                }
                (BindingEntry::SampledTexture { texture, .. }, None) => {
                    return Err(RenderError::InvalidHandle(texture.into()));
                }
            }
        }

        let group = self
            .validated(|device| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("meshtex binding set"),
                    layout: &bgl,
                    entries: &bind_entries,
                })
            })
            .map_err(RenderError::BindingRejected)?;

        self.binding_sets.insert(id, group);
        Ok(BindingSetHandle(id))
    }

    fn texture_exists(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture.0)
    }

    fn texture_size(&self, texture: TextureHandle) -> Option<Extent> {
        self.textures.get(&texture.0).map(|t| t.size)
    }

    fn framebuffer_format(&self, framebuffer: FramebufferHandle) -> Option<PixelFormat> {
        let fb = self.framebuffers.get(&framebuffer.0)?;
        self.textures.get(&fb.color.0).map(|t| t.format)
    }

    fn read_texture(&mut self, texture: TextureHandle, mip_level: u32) -> RenderResult<Vec<u8>> {
        if !self.is_alive() {
            return Err(RenderError::DeviceLost);
        }
        let tex = self
            .textures
            .get(&texture.0)
            .ok_or(RenderError::InvalidHandle(texture.into()))?;
        if mip_level >= tex.texture.mip_level_count() {
            return Err(RenderError::Readback(format!("no mip level {mip_level}")));
        }
        if !tex.usage.contains(TextureUsage::COPY_SRC) {
            return Err(RenderError::Readback("texture was not created with COPY_SRC".to_string()));
        }

        let extent = tex.size.mip(mip_level);
        let bpp = tex.format.bytes_per_pixel();
        let unpadded = extent.width * bpp;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("meshtex readback"),
            size: padded as u64 * extent.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        self.validated(|device| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("meshtex readback encoder"),
            });
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture: &tex.texture,
                    mip_level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &staging,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(padded),
                        rows_per_image: Some(extent.height),
                    },
                },
                wgpu::Extent3d {
                    width: extent.width,
                    height: extent.height,
                    depth_or_array_layers: 1,
                },
            );
            self.queue.submit(std::iter::once(encoder.finish()));
        })
        .map_err(RenderError::Readback)?;

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| RenderError::Readback(e.to_string()))?;
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(RenderError::Readback(e.to_string())),
            Err(e) => return Err(RenderError::Readback(e.to_string())),
        }

        let mut out = Vec::with_capacity((unpadded * extent.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded as usize) {
                out.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        staging.unmap();
        Ok(out)
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        mip_level: u32,
        size: Extent,
        data: &[u8],
    ) -> RenderResult<()> {
        if !self.is_alive() {
            return Err(RenderError::DeviceLost);
        }
        let tex = self
            .textures
            .get(&texture.0)
            .ok_or(RenderError::InvalidHandle(texture.into()))?;
        if mip_level >= tex.texture.mip_level_count() {
            return Err(RenderError::TextureWrite {
                level: mip_level,
                reason: "level out of range".to_string(),
            });
        }
        if !tex.usage.contains(TextureUsage::COPY_DST) {
            return Err(RenderError::TextureWrite {
                level: mip_level,
                reason: "texture was not created with COPY_DST".to_string(),
            });
        }
        let expected = tex.size.mip(mip_level);
        let bpp = tex.format.bytes_per_pixel();
        if size != expected || data.len() != (size.width * size.height * bpp) as usize {
            return Err(RenderError::TextureWrite {
                level: mip_level,
                reason: format!("expected {expected:?}, got {size:?} ({} bytes)", data.len()),
            });
        }

        self.validated(|_| {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &tex.texture,
                    mip_level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(size.width * bpp),
                    rows_per_image: Some(size.height),
                },
                wgpu::Extent3d {
                    width: size.width,
                    height: size.height,
                    depth_or_array_layers: 1,
                },
            );
        })
        .map_err(|reason| RenderError::TextureWrite { level: mip_level, reason })
    }

    fn submit_draw_list(&mut self, list: &DrawList) -> RenderResult<()> {
        if !self.is_alive() {
            return Err(RenderError::DeviceLost);
        }
        let fb = self
            .framebuffers
            .get(&list.framebuffer.0)
            .ok_or(RenderError::InvalidHandle(list.framebuffer.into()))?;
        for cmd in &list.commands {
            match *cmd {
                DrawCommand::BindPipeline(h) => self.require(h.into())?,
                DrawCommand::BindVertexArray(h) => self.require(h.into())?,
                DrawCommand::BindSet { set, .. } => self.require(set.into())?,
                DrawCommand::BindIndexArray(h) => self.require(h.into())?,
                DrawCommand::Draw { .. } => {}
            }
        }

        let [r, g, b, a] = list.clear_color.map(f64::from);

        // Encoding, finish and submit all sit in the scope: a pass that samples
        // its own target only fails at finish.
        self.validated(|device| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("meshtex draw encoder"),
            });
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("meshtex draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &fb.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let mut vertex_count = 0u32;
            let mut index_count = 0u32;
            for cmd in &list.commands {
                match *cmd {
                    DrawCommand::BindPipeline(h) => {
                        if let Some(p) = self.pipelines.get(&h.0) {
                            rpass.set_pipeline(p);
                        }
                    }
                    DrawCommand::BindVertexArray(h) => {
                        if let Some(va) = self.vertex_arrays.get(&h.0) {
                            for (slot, b) in va.buffers.iter().enumerate() {
                                if let Some(buf) = self.buffers.get(&b.0) {
                                    rpass.set_vertex_buffer(slot as u32, buf.slice(..));
                                }
                            }
                            vertex_count = va.vertex_count;
                        }
                    }
                    DrawCommand::BindSet { index, set } => {
                        if let Some(group) = self.binding_sets.get(&set.0) {
                            rpass.set_bind_group(index, group, &[]);
                        }
                    }
                    DrawCommand::BindIndexArray(h) => {
                        if let Some(ia) = self.index_arrays.get(&h.0)
                            && let Some(buf) = self.buffers.get(&ia.buffer.0)
                        {
                            // Buffers are padded to 4 bytes; bind only the live indices.
                            let len = ia.index_count as u64 * ia.format.byte_size() as u64;
                            rpass.set_index_buffer(
                                buf.slice(..len),
                                convert_index_format(ia.format),
                            );
                            index_count = ia.index_count;
                        }
                    }
                    DrawCommand::Draw { indexed, instances } => {
                        if indexed {
                            rpass.draw_indexed(0..index_count, 0, 0..instances);
                        } else {
                            rpass.draw(0..vertex_count, 0..instances);
                        }
                    }
                }
            }
            drop(rpass);
            self.queue.submit(std::iter::once(encoder.finish()));
        })
        .map_err(RenderError::DrawRejected)
    }

    fn free(&mut self, id: ResourceId) {
        let raw = id.raw();
        let removed = match id {
            ResourceId::Buffer(_) => self.buffers.remove(&raw).map(|b| b.destroy()).is_some(),
            ResourceId::Texture(_) => self.textures.remove(&raw).map(|t| t.texture.destroy()).is_some(),
            ResourceId::Framebuffer(_) => self.framebuffers.remove(&raw).is_some(),
            ResourceId::Sampler(_) => self.samplers.remove(&raw).is_some(),
            ResourceId::Shader(_) => self.shaders.remove(&raw).is_some(),
            ResourceId::Pipeline(_) => self.pipelines.remove(&raw).is_some(),
            ResourceId::BindingSet(_) => self.binding_sets.remove(&raw).is_some(),
            ResourceId::VertexArray(_) => self.vertex_arrays.remove(&raw).is_some(),
            ResourceId::IndexArray(_) => self.index_arrays.remove(&raw).is_some(),
        };
        if removed {
            log::trace!("wgpu device: freed {id}");
        }
    }
}

// ── conversions ───────────────────────────────────────────────────────────

fn convert_pixel_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
    let mut out = wgpu::TextureUsages::empty();
    if usage.contains(TextureUsage::SAMPLED) {
        out |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.contains(TextureUsage::COLOR_ATTACHMENT) {
        out |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(TextureUsage::COPY_SRC) {
        out |= wgpu::TextureUsages::COPY_SRC;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        out |= wgpu::TextureUsages::COPY_DST;
    }
    out
}

fn convert_index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
        IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
    }
}

fn convert_attribute_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
    }
}

fn convert_filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn convert_mipmap_filter_mode(mode: FilterMode) -> wgpu::MipmapFilterMode {
    match mode {
        FilterMode::Nearest => wgpu::MipmapFilterMode::Nearest,
        FilterMode::Linear => wgpu::MipmapFilterMode::Linear,
    }
}

fn convert_address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}
