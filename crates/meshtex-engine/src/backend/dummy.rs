//! GPU-less device for tests and development.
//!
//! `DummyDevice` allocates ids, validates handle liveness the way a real
//! device would, and records every call in an event log. Draws do not
//! rasterize: they only clear level 0 of the target to the clear color.

use std::collections::{HashMap, HashSet};

use super::{
    BindingEntry, BindingSetHandle, BufferDesc, BufferHandle, DrawCommand, DrawList, Extent,
    FramebufferHandle, IndexArrayHandle, IndexFormat, PipelineDesc, PipelineHandle, PixelFormat,
    RasterState, RenderDevice, RenderError, RenderResult, ResourceId, SamplerDesc,
    SamplerHandle, ShaderBlob, ShaderCode, ShaderHandle, TextureDesc, TextureHandle,
    TextureUsage, VertexArrayHandle, BindingLayout,
};

/// Observable device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Created(ResourceId),
    Freed(ResourceId),
    BufferWrite { buffer: BufferHandle, len: usize },
    TextureWrite { texture: TextureHandle, level: u32 },
    Readback { texture: TextureHandle, level: u32 },
    Draw(DrawList),
}

/// Creation kinds that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reject {
    Shader,
    Pipeline,
    Texture,
    Buffer,
    BindingSet,
    TextureWrite,
}

#[derive(Debug, Clone)]
struct DummyTexture {
    size: Extent,
    format: PixelFormat,
    usage: TextureUsage,
    levels: Vec<Vec<u8>>,
}

/// Pipeline as recorded by the dummy device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineRecord {
    pub shader: ShaderHandle,
    pub raster: RasterState,
    pub layout: BindingLayout,
}

#[derive(Debug, Default)]
pub struct DummyDevice {
    lost: bool,
    next_id: u64,
    live: HashSet<ResourceId>,

    buffers: HashMap<u64, Vec<u8>>,
    textures: HashMap<u64, DummyTexture>,
    framebuffers: HashMap<u64, TextureHandle>,
    vertex_arrays: HashMap<u64, ([BufferHandle; 2], u32)>,
    index_arrays: HashMap<u64, (BufferHandle, IndexFormat, u32)>,
    pipelines: HashMap<u64, PipelineRecord>,
    binding_sets: HashMap<u64, Vec<BindingEntry>>,

    /// Per kind: creations to let through first, then creations to refuse.
    rejections: HashMap<Reject, (u32, u32)>,
    events: Vec<DeviceEvent>,
}

impl DummyDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates device loss. Every later creation fails with `DeviceLost`.
    pub fn mark_lost(&mut self) {
        self.lost = true;
    }

    /// Makes the next `count` creations of `kind` fail.
    pub fn reject_next(&mut self, kind: Reject, count: u32) {
        self.reject_after(kind, 0, count);
    }

    /// Lets `skip` creations of `kind` succeed, then fails the next `count`.
    pub fn reject_after(&mut self, kind: Reject, skip: u32, count: u32) {
        self.rejections.insert(kind, (skip, count));
    }

    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<DeviceEvent> {
        std::mem::take(&mut self.events)
    }

    #[inline]
    pub fn is_live(&self, id: impl Into<ResourceId>) -> bool {
        self.live.contains(&id.into())
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of `Created` events whose id has the same kind as `like`.
    pub fn created_count(&self, like: ResourceId) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::Created(id) if id.kind() == like.kind()))
            .count()
    }

    pub fn freed_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::Freed(_)))
            .count()
    }

    pub fn draw_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::Draw(_)))
            .count()
    }

    pub fn last_draw(&self) -> Option<&DrawList> {
        self.events.iter().rev().find_map(|e| match e {
            DeviceEvent::Draw(list) => Some(list),
            _ => None,
        })
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(Vec::as_slice)
    }

    pub fn index_array(&self, array: IndexArrayHandle) -> Option<(BufferHandle, IndexFormat, u32)> {
        self.index_arrays.get(&array.0).copied()
    }

    pub fn vertex_array(&self, array: VertexArrayHandle) -> Option<([BufferHandle; 2], u32)> {
        self.vertex_arrays.get(&array.0).copied()
    }

    pub fn pipeline(&self, pipeline: PipelineHandle) -> Option<PipelineRecord> {
        self.pipelines.get(&pipeline.0).copied()
    }

    pub fn binding_entries(&self, set: BindingSetHandle) -> Option<&[BindingEntry]> {
        self.binding_sets.get(&set.0).map(Vec::as_slice)
    }

    pub fn mip_level_count(&self, texture: TextureHandle) -> Option<u32> {
        self.textures.get(&texture.0).map(|t| t.levels.len() as u32)
    }

    pub fn texture_level(&self, texture: TextureHandle, level: u32) -> Option<&[u8]> {
        self.textures
            .get(&texture.0)
            .and_then(|t| t.levels.get(level as usize))
            .map(Vec::as_slice)
    }

    // ── private helpers ───────────────────────────────────────────────────

    fn alloc(&mut self, make: impl FnOnce(u64) -> ResourceId) -> RenderResult<u64> {
        if self.lost {
            return Err(RenderError::DeviceLost);
        }
        self.next_id += 1;
        let id = make(self.next_id);
        self.live.insert(id);
        self.events.push(DeviceEvent::Created(id));
        log::trace!("dummy device: created {id}");
        Ok(self.next_id)
    }

    fn take_rejection(&mut self, kind: Reject) -> bool {
        match self.rejections.get_mut(&kind) {
            Some((skip, _)) if *skip > 0 => {
                *skip -= 1;
                false
            }
            Some((_, count)) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    fn has_usage(&self, texture: TextureHandle, usage: TextureUsage) -> bool {
        self.textures.get(&texture.0).is_some_and(|t| t.usage.contains(usage))
    }

    fn require(&self, id: impl Into<ResourceId>) -> RenderResult<()> {
        let id = id.into();
        if self.live.contains(&id) {
            Ok(())
        } else {
            Err(RenderError::InvalidHandle(id))
        }
    }
}

impl RenderDevice for DummyDevice {
    fn is_alive(&self) -> bool {
        !self.lost
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> RenderResult<SamplerHandle> {
        log::trace!("dummy device: sampler {:?}", desc.label);
        self.alloc(ResourceId::Sampler).map(SamplerHandle)
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDesc<'_>,
        contents: &[u8],
    ) -> RenderResult<BufferHandle> {
        if self.take_rejection(Reject::Buffer) {
            return Err(RenderError::BufferRejected(desc.label.to_string()));
        }
        let id = self.alloc(ResourceId::Buffer)?;
        self.buffers.insert(id, contents.to_vec());
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> RenderResult<()> {
        self.require(buffer)?;
        let Some(bytes) = self.buffers.get_mut(&buffer.0) else {
            return Err(RenderError::InvalidHandle(buffer.into()));
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > bytes.len() {
            return Err(RenderError::BufferRejected(format!(
                "write of {} bytes at {offset} overruns {} byte buffer",
                data.len(),
                bytes.len()
            )));
        }
        bytes[start..end].copy_from_slice(data);
        self.events.push(DeviceEvent::BufferWrite { buffer, len: data.len() });
        Ok(())
    }

    fn create_vertex_array(
        &mut self,
        vertex_count: u32,
        buffers: [BufferHandle; 2],
    ) -> RenderResult<VertexArrayHandle> {
        self.require(buffers[0])?;
        self.require(buffers[1])?;
        let id = self.alloc(ResourceId::VertexArray)?;
        self.vertex_arrays.insert(id, (buffers, vertex_count));
        Ok(VertexArrayHandle(id))
    }

    fn create_index_array(
        &mut self,
        buffer: BufferHandle,
        format: IndexFormat,
        index_count: u32,
    ) -> RenderResult<IndexArrayHandle> {
        self.require(buffer)?;
        let id = self.alloc(ResourceId::IndexArray)?;
        self.index_arrays.insert(id, (buffer, format, index_count));
        Ok(IndexArrayHandle(id))
    }

    fn create_shader(&mut self, blob: &ShaderBlob) -> RenderResult<ShaderHandle> {
        let empty = match &blob.code {
            ShaderCode::Wgsl(src) => src.trim().is_empty(),
            ShaderCode::SpirV(bytes) => bytes.is_empty() || bytes.len() % 4 != 0,
        };
        if empty || self.take_rejection(Reject::Shader) {
            return Err(RenderError::ShaderRejected(blob.label.clone()));
        }
        self.alloc(ResourceId::Shader).map(ShaderHandle)
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> RenderResult<TextureHandle> {
        if desc.size.is_empty() || desc.mip_level_count == 0 || self.take_rejection(Reject::Texture)
        {
            return Err(RenderError::TextureRejected(desc.label.to_string()));
        }
        let id = self.alloc(ResourceId::Texture)?;
        let bpp = desc.format.bytes_per_pixel() as usize;
        let levels = (0..desc.mip_level_count)
            .map(|level| {
                let e = desc.size.mip(level);
                vec![0u8; e.width as usize * e.height as usize * bpp]
            })
            .collect();
        self.textures.insert(
            id,
            DummyTexture {
                size: desc.size,
                format: desc.format,
                usage: desc.usage,
                levels,
            },
        );
        Ok(TextureHandle(id))
    }

    fn create_framebuffer(&mut self, color: TextureHandle) -> RenderResult<FramebufferHandle> {
        self.require(color)?;
        let id = self.alloc(ResourceId::Framebuffer)?;
        self.framebuffers.insert(id, color);
        Ok(FramebufferHandle(id))
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> RenderResult<PipelineHandle> {
        self.require(desc.shader)?;
        if self.take_rejection(Reject::Pipeline) {
            return Err(RenderError::PipelineRejected(desc.label.to_string()));
        }
        let id = self.alloc(ResourceId::Pipeline)?;
        self.pipelines.insert(
            id,
            PipelineRecord {
                shader: desc.shader,
                raster: desc.raster,
                layout: desc.layout,
            },
        );
        Ok(PipelineHandle(id))
    }

    fn create_binding_set(
        &mut self,
        shader: ShaderHandle,
        entries: &[BindingEntry],
    ) -> RenderResult<BindingSetHandle> {
        self.require(shader)?;
        for entry in entries {
            match *entry {
                BindingEntry::Uniform(buffer) => self.require(buffer)?,
                BindingEntry::SampledTexture { sampler, texture } => {
                    self.require(sampler)?;
                    self.require(texture)?;
                }
            }
        }
        if self.take_rejection(Reject::BindingSet) {
            return Err(RenderError::BindingRejected("forced rejection".to_string()));
        }
        let id = self.alloc(ResourceId::BindingSet)?;
        self.binding_sets.insert(id, entries.to_vec());
        Ok(BindingSetHandle(id))
    }

    fn texture_exists(&self, texture: TextureHandle) -> bool {
        self.live.contains(&texture.into())
    }

    fn texture_size(&self, texture: TextureHandle) -> Option<Extent> {
        self.textures.get(&texture.0).map(|t| t.size)
    }

    fn framebuffer_format(&self, framebuffer: FramebufferHandle) -> Option<PixelFormat> {
        let texture = self.framebuffers.get(&framebuffer.0)?;
        self.textures.get(&texture.0).map(|t| t.format)
    }

    fn read_texture(&mut self, texture: TextureHandle, mip_level: u32) -> RenderResult<Vec<u8>> {
        self.require(texture)?;
        if !self.has_usage(texture, TextureUsage::COPY_SRC) {
            return Err(RenderError::Readback("texture was not created with COPY_SRC".to_string()));
        }
        let data = self
            .texture_level(texture, mip_level)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| RenderError::Readback(format!("no mip level {mip_level}")))?;
        self.events.push(DeviceEvent::Readback { texture, level: mip_level });
        Ok(data)
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        mip_level: u32,
        size: Extent,
        data: &[u8],
    ) -> RenderResult<()> {
        self.require(texture)?;
        if self.take_rejection(Reject::TextureWrite) {
            return Err(RenderError::TextureWrite {
                level: mip_level,
                reason: "forced rejection".to_string(),
            });
        }
        let Some(tex) = self.textures.get_mut(&texture.0) else {
            return Err(RenderError::InvalidHandle(texture.into()));
        };
        if !tex.usage.contains(TextureUsage::COPY_DST) {
            return Err(RenderError::TextureWrite {
                level: mip_level,
                reason: "texture was not created with COPY_DST".to_string(),
            });
        }
        let expected = tex.size.mip(mip_level);
        let Some(level) = tex.levels.get_mut(mip_level as usize) else {
            return Err(RenderError::TextureWrite {
                level: mip_level,
                reason: "level out of range".to_string(),
            });
        };
        if size != expected || data.len() != level.len() {
            return Err(RenderError::TextureWrite {
                level: mip_level,
                reason: format!("expected {expected:?}, got {size:?} ({} bytes)", data.len()),
            });
        }
        level.copy_from_slice(data);
        self.events.push(DeviceEvent::TextureWrite { texture, level: mip_level });
        Ok(())
    }

    fn submit_draw_list(&mut self, list: &DrawList) -> RenderResult<()> {
        if self.lost {
            return Err(RenderError::DeviceLost);
        }
        self.require(list.framebuffer)?;
        for cmd in &list.commands {
            match *cmd {
                DrawCommand::BindPipeline(h) => self.require(h)?,
                DrawCommand::BindVertexArray(h) => self.require(h)?,
                DrawCommand::BindSet { set, .. } => self.require(set)?,
                DrawCommand::BindIndexArray(h) => self.require(h)?,
                DrawCommand::Draw { .. } => {}
            }
        }

        let texture = self.framebuffers.get(&list.framebuffer.0).copied();
        if let Some(tex) = texture.and_then(|t| self.textures.get_mut(&t.0)) {
            let px = list.clear_color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            if let Some(level0) = tex.levels.first_mut() {
                for chunk in level0.chunks_exact_mut(4) {
                    chunk.copy_from_slice(&px);
                }
            }
        }

        self.events.push(DeviceEvent::Draw(list.clone()));
        Ok(())
    }

    fn free(&mut self, id: ResourceId) {
        if !self.live.remove(&id) {
            return;
        }
        let raw = id.raw();
        match id {
            ResourceId::Buffer(_) => {
                self.buffers.remove(&raw);
            }
            ResourceId::Texture(_) => {
                self.textures.remove(&raw);
            }
            ResourceId::Framebuffer(_) => {
                self.framebuffers.remove(&raw);
            }
            ResourceId::VertexArray(_) => {
                self.vertex_arrays.remove(&raw);
            }
            ResourceId::IndexArray(_) => {
                self.index_arrays.remove(&raw);
            }
            ResourceId::Pipeline(_) => {
                self.pipelines.remove(&raw);
            }
            ResourceId::BindingSet(_) => {
                self.binding_sets.remove(&raw);
            }
            ResourceId::Sampler(_) | ResourceId::Shader(_) => {}
        }
        log::trace!("dummy device: freed {id}");
        self.events.push(DeviceEvent::Freed(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BufferUsage, TextureUsage};

    fn tex_desc(w: u32, h: u32, mips: u32) -> TextureDesc<'static> {
        TextureDesc {
            label: "t",
            size: Extent::new(w, h),
            format: PixelFormat::Rgba8Unorm,
            mip_level_count: mips,
            usage: TextureUsage::RENDER_TARGET,
        }
    }

    #[test]
    fn free_is_idempotent() {
        let mut dev = DummyDevice::new();
        let t = dev.create_texture(&tex_desc(4, 4, 1)).unwrap();
        dev.free(t.into());
        dev.free(t.into());
        assert_eq!(dev.freed_count(), 1);
        assert!(!dev.texture_exists(t));
    }

    #[test]
    fn dependent_objects_require_live_handles() {
        let mut dev = DummyDevice::new();
        let t = dev.create_texture(&tex_desc(4, 4, 1)).unwrap();
        dev.free(t.into());
        assert_eq!(
            dev.create_framebuffer(t),
            Err(RenderError::InvalidHandle(ResourceId::Texture(t.raw())))
        );
    }

    #[test]
    fn lost_device_refuses_creation() {
        let mut dev = DummyDevice::new();
        dev.mark_lost();
        assert!(!dev.is_alive());
        let desc = BufferDesc { label: "b", usage: BufferUsage::Vertex };
        assert_eq!(dev.create_buffer(&desc, &[0; 4]), Err(RenderError::DeviceLost));
    }

    #[test]
    fn write_texture_checks_level_size() {
        let mut dev = DummyDevice::new();
        let t = dev.create_texture(&tex_desc(4, 2, 3)).unwrap();
        assert!(dev.write_texture(t, 1, Extent::new(2, 1), &[7; 8]).is_ok());
        assert_eq!(dev.texture_level(t, 1), Some(&[7u8; 8][..]));
        assert!(dev.write_texture(t, 1, Extent::new(4, 2), &[0; 32]).is_err());
        assert!(dev.write_texture(t, 5, Extent::new(1, 1), &[0; 4]).is_err());
    }

    #[test]
    fn copies_respect_texture_usage() {
        let mut dev = DummyDevice::new();
        let t = dev
            .create_texture(&TextureDesc { usage: TextureUsage::SAMPLED, ..tex_desc(2, 2, 1) })
            .unwrap();
        assert!(matches!(
            dev.write_texture(t, 0, Extent::new(2, 2), &[0; 16]),
            Err(RenderError::TextureWrite { level: 0, .. })
        ));
        assert!(matches!(dev.read_texture(t, 0), Err(RenderError::Readback(_))));
        assert!(!dev.events().iter().any(|e| matches!(e, DeviceEvent::Readback { .. })));
    }

    #[test]
    fn forced_rejection_is_consumed() {
        let mut dev = DummyDevice::new();
        dev.reject_next(Reject::Texture, 1);
        assert!(dev.create_texture(&tex_desc(4, 4, 1)).is_err());
        assert!(dev.create_texture(&tex_desc(4, 4, 1)).is_ok());
    }

    #[test]
    fn delayed_rejection_skips_first_creations() {
        let mut dev = DummyDevice::new();
        dev.reject_after(Reject::Texture, 1, 1);
        assert!(dev.create_texture(&tex_desc(4, 4, 1)).is_ok());
        assert!(dev.create_texture(&tex_desc(4, 4, 1)).is_err());
        assert!(dev.create_texture(&tex_desc(4, 4, 1)).is_ok());
    }

    #[test]
    fn empty_shader_is_rejected() {
        let mut dev = DummyDevice::new();
        assert!(matches!(
            dev.create_shader(&ShaderBlob::wgsl("empty", "  ")),
            Err(RenderError::ShaderRejected(_))
        ));
    }
}
