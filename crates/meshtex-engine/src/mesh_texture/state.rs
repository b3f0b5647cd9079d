//! Inputs, owned slots and the resolve pass.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::Mat4;

use super::config::MeshTextureConfig;
use super::observer::{Changed, Listeners};
use crate::backend::{
    BindingLayout, BindingSetHandle, BufferHandle, Extent, FramebufferHandle, IndexArrayHandle,
    PipelineHandle, RenderDevice, SamplerHandle, ShaderBlob, ShaderHandle, TextureHandle,
    VertexArrayHandle,
};
use crate::geometry::{MeshSource, encode};
use crate::paint::Color;
use crate::render::{
    DrawInputs, RenderTarget, TransformUniform, binding_entries, build_binding_set,
    build_pipeline, build_shader, build_target, execute_draw, generate_mipmaps, upload_geometry,
    write_transform,
};
use crate::resource::{ResourceState, Slot, TextureProxy, TextureRef};
use crate::schedule::{DirtyFlags, DirtyState};

/// Externally written inputs.
pub(super) struct Inputs {
    pub size: Extent,
    pub mesh: Option<Rc<MeshSource>>,
    pub source: Option<TextureRef>,
    pub shader: Option<ShaderBlob>,
    pub transform: Mat4,
    pub clear_color: Color,
    pub generate_mipmaps: bool,
}

/// One slot per device object role.
pub(super) struct Slots {
    pub sampler: Slot<SamplerHandle>,
    pub shader: Slot<ShaderHandle>,
    pub texture: Slot<TextureHandle>,
    pub framebuffer: Slot<FramebufferHandle>,
    pub pipeline: Slot<PipelineHandle>,
    pub transform_buffer: Slot<BufferHandle>,
    pub binding_set: Slot<BindingSetHandle>,
    pub positions: Slot<BufferHandle>,
    pub uvs: Slot<BufferHandle>,
    pub vertex_array: Slot<VertexArrayHandle>,
    pub index_buffer: Slot<BufferHandle>,
    pub index_array: Slot<IndexArrayHandle>,
}

impl Slots {
    fn new() -> Self {
        Self {
            sampler: Slot::new("sampler"),
            shader: Slot::new("shader"),
            texture: Slot::new("output texture"),
            framebuffer: Slot::new("framebuffer"),
            pipeline: Slot::new("pipeline"),
            transform_buffer: Slot::new("transform buffer"),
            binding_set: Slot::new("binding set"),
            positions: Slot::new("position buffer"),
            uvs: Slot::new("uv buffer"),
            vertex_array: Slot::new("vertex array"),
            index_buffer: Slot::new("index buffer"),
            index_array: Slot::new("index array"),
        }
    }

    fn clear_geometry<D: RenderDevice + ?Sized>(&mut self, dev: &mut D) {
        self.index_array.clear(dev);
        self.index_buffer.clear(dev);
        self.vertex_array.clear(dev);
        self.uvs.clear(dev);
        self.positions.clear(dev);
    }

    /// Frees everything, dependents before what they reference.
    fn clear_all<D: RenderDevice + ?Sized>(&mut self, dev: &mut D) {
        self.binding_set.clear(dev);
        self.pipeline.clear(dev);
        self.framebuffer.clear(dev);
        self.texture.clear(dev);
        self.clear_geometry(dev);
        self.transform_buffer.clear(dev);
        self.shader.clear(dev);
        self.sampler.clear(dev);
    }

    /// Drops every handle without freeing; for a device that no longer exists.
    fn forget_all(&mut self) {
        self.binding_set.forget();
        self.pipeline.forget();
        self.framebuffer.forget();
        self.texture.forget();
        self.index_array.forget();
        self.index_buffer.forget();
        self.vertex_array.forget();
        self.uvs.forget();
        self.positions.forget();
        self.transform_buffer.forget();
        self.shader.forget();
        self.sampler.forget();
    }
}

pub(super) struct State<D: RenderDevice> {
    pub device: Weak<RefCell<D>>,
    pub config: MeshTextureConfig,
    pub inputs: Inputs,
    pub slots: Slots,
    pub dirty: DirtyState,
    pub proxy: TextureProxy,
    pub listeners: Listeners,

    target: Option<RenderTarget>,
    /// Source texture the last binding attempt was made for, successful or
    /// not. A rejected set is retried only once this changes.
    bound_source: Option<TextureHandle>,
    /// Planarity of the mesh behind the current geometry buffers.
    geometry_planar: Option<bool>,
    /// Planarity the current pipeline's cull mode was chosen for.
    pub pipeline_planar: Option<bool>,

    pub passes: u64,
    pub revision: u64,
    pub torn_down: bool,
}

impl<D: RenderDevice> State<D> {
    pub fn new(device: &Rc<RefCell<D>>, config: MeshTextureConfig, shader: ShaderBlob) -> Self {
        let inputs = Inputs {
            size: config.size,
            mesh: None,
            source: None,
            shader: Some(shader),
            transform: Mat4::IDENTITY,
            clear_color: config.clear_color,
            generate_mipmaps: config.generate_mipmaps,
        };

        let mut state = Self {
            device: Rc::downgrade(device),
            config,
            inputs,
            slots: Slots::new(),
            dirty: DirtyState::new(),
            proxy: TextureProxy::new(),
            listeners: Listeners::default(),
            target: None,
            bound_source: None,
            geometry_planar: None,
            pipeline_planar: None,
            passes: 0,
            revision: 0,
            torn_down: false,
        };

        // The sampler never depends on an input, so it is built up front.
        if let Ok(mut dev) = device.try_borrow_mut() {
            state.ensure_sampler(&mut *dev);
        }
        state
    }

    // ── queries ───────────────────────────────────────────────────────────

    pub fn is_ready(&self) -> bool {
        self.slots.framebuffer.is_set()
            && self.slots.pipeline.is_set()
            && self.slots.vertex_array.is_set()
            && self.slots.binding_set.is_set()
    }

    pub fn pipeline_state(&self) -> ResourceState {
        let slots = &self.slots;
        if slots.texture.is_set() && slots.framebuffer.is_set() && slots.pipeline.is_set() {
            ResourceState::Ready
        } else {
            ResourceState::Unbuilt
        }
    }

    pub fn changed(&self) -> Changed {
        Changed {
            ready: self.is_ready(),
            texture: self.slots.texture.get(),
            size: self.target.map(|t| t.size).unwrap_or_default(),
            revision: self.revision,
        }
    }

    /// Planarity the pipeline should be built for.
    fn effective_planar(&self) -> bool {
        self.inputs
            .mesh
            .as_ref()
            .filter(|m| m.vertex_count() > 0)
            .map(|m| m.is_planar())
            .or(self.geometry_planar)
            .unwrap_or(false)
    }

    /// The source input if it names a live texture other than our own output.
    fn current_source(&self, dev: &D) -> Option<TextureHandle> {
        let own = self.slots.texture.get();
        self.inputs
            .source
            .as_ref()
            .and_then(TextureRef::resolve)
            .filter(|h| dev.texture_exists(*h) && Some(*h) != own)
    }

    // ── resolve pass ──────────────────────────────────────────────────────

    /// Rebuilds the stages in `flags`, then draws.
    ///
    /// Returns false if the pass could not run because the device was busy;
    /// the flags are then re-marked for the next window.
    pub fn run_pass(&mut self, mut flags: DirtyFlags) -> bool {
        let label = self.config.label.clone();

        let Some(device) = self.device.upgrade() else {
            log::debug!("{label}: device dropped, releasing handles without freeing");
            self.drop_device_objects();
            self.finish_pass_counters();
            return true;
        };
        let Ok(mut guard) = device.try_borrow_mut() else {
            log::warn!("{label}: device busy, deferring resolve");
            self.dirty.mark(flags);
            return false;
        };
        let dev = &mut *guard;

        if !dev.is_alive() {
            log::warn!("{label}: device lost, releasing handles without freeing");
            self.drop_device_objects();
            self.finish_pass_counters();
            return true;
        }

        log::debug!("{label}: resolve pass {} with {flags:?}", self.passes + 1);

        if flags.contains(DirtyFlags::SHADER) {
            self.rebuild_shader(dev);
        }
        if flags.contains(DirtyFlags::PIPELINE) {
            self.rebuild_target_and_pipeline(dev);
        } else if flags.contains(DirtyFlags::RASTER) {
            self.rebuild_pipeline(dev);
        }
        // An existing buffer is written even if no binding set can be built
        // this pass; a new one starts out with the current transform.
        if flags.contains(DirtyFlags::TRANSFORM) {
            self.upload_transform(dev);
        }
        if self.current_source(dev) != self.bound_source {
            flags |= DirtyFlags::BINDING;
        }
        if flags.contains(DirtyFlags::BINDING) {
            self.rebuild_binding(dev);
        }
        if flags.contains(DirtyFlags::GEOMETRY) {
            self.rebuild_geometry(dev);
        }

        self.draw(dev);
        self.finish_pass_counters();
        true
    }

    fn finish_pass_counters(&mut self) {
        self.passes += 1;
        self.revision += 1;
    }

    fn drop_device_objects(&mut self) {
        self.slots.forget_all();
        self.proxy.unpublish();
        self.target = None;
        self.bound_source = None;
        self.geometry_planar = None;
        self.pipeline_planar = None;
    }

    fn rebuild_shader(&mut self, dev: &mut D) {
        // Dependents first; both are rebuilt later in this pass.
        self.slots.binding_set.clear(dev);
        self.bound_source = None;
        self.slots.pipeline.clear(dev);
        self.pipeline_planar = None;
        self.slots.shader.clear(dev);

        let Some(blob) = self.inputs.shader.as_ref() else {
            log::trace!("{}: no shader", self.config.label);
            return;
        };
        match build_shader(dev, blob) {
            Ok(shader) => self.slots.shader.replace(dev, shader),
            Err(e) => log::warn!("{}: shader rejected: {e}", self.config.label),
        }
    }

    fn rebuild_target_and_pipeline(&mut self, dev: &mut D) {
        self.slots.pipeline.clear(dev);
        self.pipeline_planar = None;
        self.slots.framebuffer.clear(dev);
        // The old texture is gone before a replacement is published.
        self.slots.texture.clear(dev);
        self.proxy.unpublish();
        self.target = None;

        let label = &self.config.label;
        let size = self.inputs.size;
        if size.is_empty() {
            log::trace!("{label}: empty size, no render target");
            return;
        }

        let target = match build_target(dev, size, self.inputs.generate_mipmaps, label) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("{label}: render target rejected: {e}");
                return;
            }
        };
        self.slots.texture.replace(dev, target.texture);
        self.slots.framebuffer.replace(dev, target.framebuffer);
        self.proxy.publish(target.texture, target.size);
        self.target = Some(target);

        self.rebuild_pipeline(dev);
    }

    /// Rebuilds the pipeline against the current target, e.g. for a new cull
    /// mode. Output texture and framebuffer handles stay the same.
    fn rebuild_pipeline(&mut self, dev: &mut D) {
        self.slots.pipeline.clear(dev);
        self.pipeline_planar = None;

        let label = &self.config.label;
        let Some(target) = self.target else {
            log::trace!("{label}: no render target, no pipeline");
            return;
        };
        let Some(shader) = self.slots.shader.get() else {
            log::trace!("{label}: no shader, no pipeline");
            return;
        };
        let layout = BindingLayout { transform: self.config.bind_transform };
        let planar = self.effective_planar();
        match build_pipeline(dev, shader, target.format, planar, layout, label) {
            Ok(p) => {
                self.slots.pipeline.replace(dev, p);
                self.pipeline_planar = Some(planar);
            }
            Err(e) => log::warn!("{label}: pipeline rejected: {e}"),
        }
    }

    fn rebuild_binding(&mut self, dev: &mut D) {
        self.slots.binding_set.clear(dev);
        self.bound_source = self.current_source(dev);

        let label = self.config.label.clone();
        let Some(shader) = self.slots.shader.get() else {
            log::trace!("{label}: no shader, no binding set");
            return;
        };
        let Some(texture) = self.bound_source else {
            log::trace!("{label}: no source texture");
            return;
        };
        let Some(sampler) = self.ensure_sampler(dev) else {
            return;
        };
        let transform = if self.config.bind_transform {
            match self.ensure_transform_buffer(dev) {
                Some(b) => Some(b),
                None => return,
            }
        } else {
            None
        };

        let entries = binding_entries(transform, sampler, texture);
        match build_binding_set(dev, shader, &entries) {
            Ok(set) => self.slots.binding_set.replace(dev, set),
            Err(e) => log::warn!("{label}: binding set rejected: {e}"),
        }
    }

    fn ensure_sampler(&mut self, dev: &mut D) -> Option<SamplerHandle> {
        if let Some(s) = self.slots.sampler.get() {
            return Some(s);
        }
        match dev.create_sampler(&self.config.sampler) {
            Ok(s) => {
                self.slots.sampler.replace(dev, s);
                Some(s)
            }
            Err(e) => {
                log::warn!("{}: sampler rejected: {e}", self.config.label);
                None
            }
        }
    }

    /// Returns the transform buffer, creating it with the current transform
    /// on first use.
    fn ensure_transform_buffer(&mut self, dev: &mut D) -> Option<BufferHandle> {
        if let Some(buffer) = self.slots.transform_buffer.get() {
            return Some(buffer);
        }
        match TransformUniform::create(dev, self.inputs.transform) {
            Ok(b) => {
                self.slots.transform_buffer.replace(dev, b);
                Some(b)
            }
            Err(e) => {
                log::warn!("{}: transform buffer rejected: {e}", self.config.label);
                None
            }
        }
    }

    fn upload_transform(&mut self, dev: &mut D) {
        if !self.config.bind_transform {
            return;
        }
        let Some(buffer) = self.slots.transform_buffer.get() else {
            // Created together with the next binding set.
            return;
        };
        if let Err(e) = write_transform(dev, buffer, self.inputs.transform) {
            log::warn!("{}: transform update failed: {e}", self.config.label);
        }
    }

    fn rebuild_geometry(&mut self, dev: &mut D) {
        let label = &self.config.label;
        let Some(mesh) = self.inputs.mesh.clone() else {
            log::trace!("{label}: no mesh");
            self.slots.clear_geometry(dev);
            self.geometry_planar = None;
            return;
        };
        let Some(encoded) = encode(&mesh, self.config.planar_scale) else {
            log::trace!("{label}: mesh has no vertices, keeping previous geometry");
            return;
        };

        self.slots.clear_geometry(dev);
        self.geometry_planar = None;
        match upload_geometry(dev, &encoded) {
            Ok(h) => {
                self.slots.positions.replace(dev, h.positions);
                self.slots.uvs.replace(dev, h.uvs);
                self.slots.vertex_array.replace(dev, h.vertex_array);
                self.slots.index_buffer.set(dev, h.index_buffer);
                self.slots.index_array.set(dev, h.index_array);
                self.geometry_planar = Some(encoded.planar);
            }
            Err(e) => log::warn!("{label}: geometry rejected: {e}"),
        }
    }

    fn draw(&mut self, dev: &mut D) {
        let label = &self.config.label;
        let inputs = DrawInputs {
            framebuffer: self.slots.framebuffer.get(),
            pipeline: self.slots.pipeline.get(),
            vertex_array: self.slots.vertex_array.get(),
            binding_set: self.slots.binding_set.get(),
            index_array: self.slots.index_array.get(),
            clear_color: self.inputs.clear_color,
        };

        match execute_draw(dev, &inputs) {
            Ok(true) => {}
            Ok(false) => {
                log::trace!("{label}: not ready, nothing drawn");
                return;
            }
            Err(e) => {
                log::warn!("{label}: draw rejected: {e}");
                return;
            }
        }

        let Some(target) = self.target else {
            return;
        };
        if !self.inputs.generate_mipmaps || target.mip_levels <= 1 {
            return;
        }
        match generate_mipmaps(dev, target.texture, target.size, target.mip_levels) {
            Ok(n) => log::trace!("{label}: wrote {n} mip level(s)"),
            Err(e) => log::warn!("{label}: mipmap generation stopped: {e}"),
        }
    }

    // ── teardown ──────────────────────────────────────────────────────────

    /// Frees every owned object. Safe to call repeatedly and after the device
    /// is gone.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.dirty.close();
        self.listeners.clear();

        let freed = match self.device.upgrade() {
            Some(device) => match device.try_borrow_mut() {
                Ok(mut dev) if dev.is_alive() => {
                    self.slots.clear_all(&mut *dev);
                    true
                }
                _ => false,
            },
            None => false,
        };
        if !freed {
            log::debug!("{}: device unavailable at teardown, nothing freed", self.config.label);
        }
        self.drop_device_objects();
    }
}

impl<D: RenderDevice> Drop for State<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
