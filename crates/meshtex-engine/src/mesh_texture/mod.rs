//! The mesh texture: a textured mesh rendered off-screen through a shader,
//! exposed as a sampleable texture.
//!
//! Writes through the setters only record what went stale. The first write in
//! a tick schedules one resolve on the [`TickLoop`]; later writes in the same
//! tick join it. The resolve rebuilds the stale stages in a fixed order
//! (shader, target + pipeline, binding set, geometry), draws, and notifies
//! subscribers.
//!
//! Writes made while a resolve is notifying are resolved on the next tick.

mod config;
mod observer;
mod property;
mod state;

#[cfg(test)]
mod tests;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::Mat4;

pub use config::MeshTextureConfig;
pub use observer::{Changed, ListenerId};
pub use property::{Property, PropertyError, PropertyValue};

use observer::notify;
use state::State;

use crate::backend::{
    BindingSetHandle, BufferHandle, Extent, FramebufferHandle, IndexArrayHandle, PipelineHandle,
    RenderDevice, SamplerHandle, ShaderBlob, ShaderHandle, TextureHandle, VertexArrayHandle,
    WgpuDevice,
};
use crate::geometry::MeshSource;
use crate::paint::Color;
use crate::render::default_shader;
use crate::resource::{ResourceState, TextureProxy, TextureRef};
use crate::schedule::{DirtyFlags, TickLoop};

/// Per-stage build state plus pass bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub shader: ResourceState,
    /// Render target, framebuffer and pipeline together.
    pub pipeline: ResourceState,
    pub binding: ResourceState,
    pub geometry: ResourceState,
    pub ready: bool,
    pub passes: u64,
    pub pending: bool,
}

/// Snapshot of every owned handle, for identity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handles {
    pub sampler: Option<SamplerHandle>,
    pub shader: Option<ShaderHandle>,
    pub texture: Option<TextureHandle>,
    pub framebuffer: Option<FramebufferHandle>,
    pub pipeline: Option<PipelineHandle>,
    pub transform_buffer: Option<BufferHandle>,
    pub binding_set: Option<BindingSetHandle>,
    pub positions: Option<BufferHandle>,
    pub uvs: Option<BufferHandle>,
    pub vertex_array: Option<VertexArrayHandle>,
    pub index_buffer: Option<BufferHandle>,
    pub index_array: Option<IndexArrayHandle>,
}

/// Shared handle to one mesh texture.
///
/// Clones refer to the same object. Dropping the last clone tears it down.
pub struct MeshTexture<D: RenderDevice + 'static = WgpuDevice> {
    inner: Rc<RefCell<State<D>>>,
    ticks: TickLoop,
}

impl<D: RenderDevice + 'static> Clone for MeshTexture<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            ticks: self.ticks.clone(),
        }
    }
}

impl<D: RenderDevice + 'static> MeshTexture<D> {
    /// Constructs the object with the built-in shader and schedules the first
    /// resolve on `ticks`.
    ///
    /// Only a weak reference to `device` is kept; once the device is dropped
    /// the object stops freeing handles.
    pub fn new(device: &Rc<RefCell<D>>, ticks: &TickLoop, config: MeshTextureConfig) -> Self {
        let shader = default_shader(config.bind_transform);
        let this = Self {
            inner: Rc::new(RefCell::new(State::new(device, config, shader))),
            ticks: ticks.clone(),
        };
        this.mark(DirtyFlags::SHADER);
        this
    }

    // ── setters ───────────────────────────────────────────────────────────

    pub fn set_size(&self, size: Extent) {
        if self.update(|s| std::mem::replace(&mut s.inputs.size, size) != size) {
            self.mark(DirtyFlags::PIPELINE);
        }
    }

    /// Replaces the mesh. `None` clears the geometry; a mesh without vertices
    /// leaves the previous geometry in place.
    pub fn set_mesh(&self, mesh: Option<Rc<MeshSource>>) {
        let flags = self.update(|s| {
            let same = match (&s.inputs.mesh, &mesh) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if same {
                return DirtyFlags::empty();
            }
            let mut flags = DirtyFlags::GEOMETRY;
            // A planarity change flips the cull mode; the target stays.
            if let Some(m) = mesh.as_ref().filter(|m| m.vertex_count() > 0)
                && s.pipeline_planar.is_some_and(|p| p != m.is_planar())
            {
                flags |= DirtyFlags::RASTER;
            }
            s.inputs.mesh = mesh;
            flags
        });
        self.mark(flags);
    }

    pub fn set_source_texture(&self, source: Option<TextureRef>) {
        if self.update(|s| std::mem::replace(&mut s.inputs.source, source.clone()) != source) {
            self.mark(DirtyFlags::BINDING);
        }
    }

    /// Replaces the shader. `None` leaves the object without shader, pipeline
    /// and binding set.
    pub fn set_shader(&self, shader: Option<ShaderBlob>) {
        if self.update(|s| std::mem::replace(&mut s.inputs.shader, shader.clone()) != shader) {
            self.mark(DirtyFlags::SHADER);
        }
    }

    /// Updates the transform uniform in place on the next resolve.
    pub fn set_transform(&self, transform: Mat4) {
        if self.update(|s| std::mem::replace(&mut s.inputs.transform, transform) != transform) {
            self.mark(DirtyFlags::TRANSFORM | DirtyFlags::REDRAW);
        }
    }

    /// Changes the clear color. Only a redraw follows.
    pub fn set_clear_color(&self, color: Color) {
        if self.update(|s| std::mem::replace(&mut s.inputs.clear_color, color) != color) {
            self.mark(DirtyFlags::REDRAW);
        }
    }

    pub fn set_generate_mipmaps(&self, enabled: bool) {
        if self.update(|s| std::mem::replace(&mut s.inputs.generate_mipmaps, enabled) != enabled) {
            self.mark(DirtyFlags::PIPELINE);
        }
    }

    /// Asks for a redraw without changing any input, e.g. after the pixels
    /// of a fixed source texture changed.
    pub fn request_redraw(&self) {
        self.mark(DirtyFlags::REDRAW);
    }

    // ── property bag ──────────────────────────────────────────────────────

    /// Sets a property by name.
    pub fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        let property: Property = name.parse()?;
        match (property, value) {
            (Property::Size, PropertyValue::Size(v)) => self.set_size(v),
            (Property::Mesh, PropertyValue::Mesh(v)) => self.set_mesh(v),
            (Property::SourceTexture, PropertyValue::Texture(v)) => self.set_source_texture(v),
            (Property::Shader, PropertyValue::Shader(v)) => self.set_shader(v),
            (Property::Transform, PropertyValue::Transform(v)) => self.set_transform(v),
            (Property::ClearColor, PropertyValue::Color(v)) => self.set_clear_color(v),
            (Property::GenerateMipmaps, PropertyValue::Bool(v)) => self.set_generate_mipmaps(v),
            (property, value) => return Err(PropertyError::wrong_type(property, &value)),
        }
        Ok(())
    }

    /// Reads a property by name.
    pub fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        let property: Property = name.parse()?;
        let s = self.inner.borrow();
        Ok(match property {
            Property::Size => PropertyValue::Size(s.inputs.size),
            Property::Mesh => PropertyValue::Mesh(s.inputs.mesh.clone()),
            Property::SourceTexture => PropertyValue::Texture(s.inputs.source.clone()),
            Property::Shader => PropertyValue::Shader(s.inputs.shader.clone()),
            Property::Transform => PropertyValue::Transform(s.inputs.transform),
            Property::ClearColor => PropertyValue::Color(s.inputs.clear_color),
            Property::GenerateMipmaps => PropertyValue::Bool(s.inputs.generate_mipmaps),
        })
    }

    // ── getters ───────────────────────────────────────────────────────────

    pub fn size(&self) -> Extent {
        self.inner.borrow().inputs.size
    }

    pub fn mesh(&self) -> Option<Rc<MeshSource>> {
        self.inner.borrow().inputs.mesh.clone()
    }

    pub fn source_texture(&self) -> Option<TextureRef> {
        self.inner.borrow().inputs.source.clone()
    }

    pub fn shader(&self) -> Option<ShaderBlob> {
        self.inner.borrow().inputs.shader.clone()
    }

    pub fn transform(&self) -> Mat4 {
        self.inner.borrow().inputs.transform
    }

    pub fn clear_color(&self) -> Color {
        self.inner.borrow().inputs.clear_color
    }

    pub fn generate_mipmaps(&self) -> bool {
        self.inner.borrow().inputs.generate_mipmaps
    }

    // ── output ────────────────────────────────────────────────────────────

    /// Current output texture, if built.
    pub fn texture(&self) -> Option<TextureHandle> {
        self.inner.borrow().slots.texture.get()
    }

    /// Late-bound view of the output that follows target rebuilds.
    pub fn proxy(&self) -> TextureProxy {
        self.inner.borrow().proxy.clone()
    }

    /// The output as a source-texture input for another mesh texture.
    pub fn texture_ref(&self) -> TextureRef {
        TextureRef::Proxy(self.proxy())
    }

    pub fn is_ready(&self) -> bool {
        self.inner.borrow().is_ready()
    }

    pub fn status(&self) -> Status {
        let s = self.inner.borrow();
        let geometry = if s.slots.vertex_array.is_set() {
            ResourceState::Ready
        } else {
            ResourceState::Unbuilt
        };
        Status {
            shader: s.slots.shader.state(),
            pipeline: s.pipeline_state(),
            binding: s.slots.binding_set.state(),
            geometry,
            ready: s.is_ready(),
            passes: s.passes,
            pending: !s.torn_down && s.dirty.is_pending(),
        }
    }

    pub fn handles(&self) -> Handles {
        let s = self.inner.borrow();
        let slots = &s.slots;
        Handles {
            sampler: slots.sampler.get(),
            shader: slots.shader.get(),
            texture: slots.texture.get(),
            framebuffer: slots.framebuffer.get(),
            pipeline: slots.pipeline.get(),
            transform_buffer: slots.transform_buffer.get(),
            binding_set: slots.binding_set.get(),
            positions: slots.positions.get(),
            uvs: slots.uvs.get(),
            vertex_array: slots.vertex_array.get(),
            index_buffer: slots.index_buffer.get(),
            index_array: slots.index_array.get(),
        }
    }

    // ── observers ─────────────────────────────────────────────────────────

    pub fn subscribe(&self, f: impl FnMut(&Changed) + 'static) -> ListenerId {
        self.inner.borrow_mut().listeners.add(f)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().listeners.remove(id)
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Frees every owned device object. Idempotent. Later writes are stored
    /// but never resolved.
    pub fn teardown(&self) {
        self.inner.borrow_mut().teardown();
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.borrow().torn_down
    }

    pub fn ticks(&self) -> &TickLoop {
        &self.ticks
    }

    // ── scheduling ────────────────────────────────────────────────────────

    fn update<R>(&self, f: impl FnOnce(&mut State<D>) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }

    fn mark(&self, flags: DirtyFlags) {
        if flags.is_empty() {
            return;
        }
        let schedule = {
            let mut s = self.inner.borrow_mut();
            !s.torn_down && s.dirty.mark(flags)
        };
        if schedule {
            schedule_resolve(Rc::downgrade(&self.inner), &self.ticks);
        }
    }
}

fn schedule_resolve<D: RenderDevice + 'static>(state: Weak<RefCell<State<D>>>, ticks: &TickLoop) {
    let next = ticks.clone();
    ticks.defer(move || resolve(state, &next));
}

/// One resolve window: rebuild, draw, notify, then reschedule if writes
/// arrived meanwhile.
fn resolve<D: RenderDevice + 'static>(state: Weak<RefCell<State<D>>>, ticks: &TickLoop) {
    let Some(inner) = state.upgrade() else {
        return;
    };

    let outcome = {
        let mut s = inner.borrow_mut();
        if s.torn_down {
            return;
        }
        let flags = s.dirty.begin_pass();
        s.run_pass(flags).then(|| (s.changed(), s.listeners.snapshot()))
    };

    if let Some((changed, listeners)) = outcome {
        notify(&listeners, &changed);
    }

    let again = {
        let mut s = inner.borrow_mut();
        !s.torn_down && s.dirty.finish_pass()
    };
    if again {
        schedule_resolve(state, ticks);
    }
}
