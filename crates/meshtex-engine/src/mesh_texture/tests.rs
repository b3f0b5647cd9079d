use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::{Mat4, Vec3};

use super::*;
use crate::backend::dummy::{DeviceEvent, Reject};
use crate::backend::{
    CullMode, DrawCommand, DummyDevice, IndexFormat, PixelFormat, RenderDevice, ResourceId,
    TextureDesc, TextureUsage,
};
use crate::render::TransformUniform;

type Device = Rc<RefCell<DummyDevice>>;

fn setup() -> (Device, TickLoop, MeshTexture<DummyDevice>) {
    setup_with(MeshTextureConfig::default())
}

fn setup_with(config: MeshTextureConfig) -> (Device, TickLoop, MeshTexture<DummyDevice>) {
    let dev = Rc::new(RefCell::new(DummyDevice::new()));
    let ticks = TickLoop::new();
    let mt = MeshTexture::new(&dev, &ticks, config);
    (dev, ticks, mt)
}

fn source_texture(dev: &Device) -> TextureHandle {
    dev.borrow_mut()
        .create_texture(&TextureDesc {
            label: "source",
            size: Extent::new(4, 4),
            format: PixelFormat::Rgba8Unorm,
            mip_level_count: 1,
            usage: TextureUsage::SAMPLED,
        })
        .unwrap()
}

/// Object with mesh and source texture set, resolved once.
fn ready() -> (Device, TickLoop, MeshTexture<DummyDevice>) {
    let (dev, ticks, mt) = setup();
    let src = source_texture(&dev);
    mt.set_mesh(Some(Rc::new(MeshSource::quad())));
    mt.set_source_texture(Some(src.into()));
    ticks.run_tick();
    assert!(mt.is_ready());
    (dev, ticks, mt)
}

fn grid(vertex_count: usize) -> Rc<MeshSource> {
    let positions = (0..vertex_count).map(|i| [i as f32 * 1e-5, 0.0, 0.0]).collect();
    let indices = vec![0, 1, (vertex_count - 1) as u32];
    Rc::new(MeshSource::spatial(positions, vec![]).with_indices(indices))
}

// ── construction & coalescing ────────────────────────────────────────────

#[test]
fn construction_schedules_one_resolve() {
    let (dev, ticks, mt) = setup();
    assert_eq!(ticks.pending(), 1);
    assert!(mt.status().pending);
    assert_eq!(mt.texture(), None);

    ticks.run_tick();

    let st = mt.status();
    assert_eq!(st.shader, ResourceState::Ready);
    assert_eq!(st.pipeline, ResourceState::Ready);
    assert_eq!(st.binding, ResourceState::Unbuilt);
    assert_eq!(st.geometry, ResourceState::Unbuilt);
    assert!(!st.ready);
    assert!(!st.pending);
    assert_eq!(st.passes, 1);
    assert_eq!(dev.borrow().draw_count(), 0);
    assert_eq!(ticks.pending(), 0);
}

#[test]
fn writes_before_a_tick_collapse_into_one_pass() {
    let (dev, ticks, mt) = setup();
    ticks.run_tick();
    let src = source_texture(&dev);

    mt.set_size(Extent::new(64, 64));
    mt.set_mesh(Some(Rc::new(MeshSource::quad())));
    mt.set_source_texture(Some(src.into()));
    mt.set_size(Extent::new(32, 16));
    assert_eq!(ticks.pending(), 1);

    ticks.run_tick();

    assert_eq!(mt.status().passes, 2);
    assert!(mt.is_ready());
    let texture = mt.texture().unwrap();
    assert_eq!(dev.borrow().texture_size(texture), Some(Extent::new(32, 16)));
    assert_eq!(dev.borrow().draw_count(), 1);
    assert_eq!(ticks.pending(), 0);
}

#[test]
fn unchanged_values_do_not_schedule() {
    let (_dev, ticks, mt) = ready();
    let mesh = mt.mesh();
    mt.set_mesh(mesh);
    mt.set_size(mt.size());
    mt.set_clear_color(mt.clear_color());
    mt.set_transform(mt.transform());
    assert_eq!(ticks.pending(), 0);
}

#[test]
fn draw_sequence_uses_index_array() {
    let (dev, _ticks, mt) = ready();
    let h = mt.handles();
    let dev = dev.borrow();
    let list = dev.last_draw().unwrap();
    assert_eq!(list.framebuffer, h.framebuffer.unwrap());
    assert_eq!(
        list.commands,
        vec![
            DrawCommand::BindPipeline(h.pipeline.unwrap()),
            DrawCommand::BindVertexArray(h.vertex_array.unwrap()),
            DrawCommand::BindSet { index: 0, set: h.binding_set.unwrap() },
            DrawCommand::BindIndexArray(h.index_array.unwrap()),
            DrawCommand::Draw { indexed: true, instances: 1 },
        ]
    );
}

// ── selective rebuilds ────────────────────────────────────────────────────

#[test]
fn transform_change_updates_buffer_in_place() {
    let (dev, ticks, mt) = ready();
    let before = mt.handles();
    let draws = dev.borrow().draw_count();

    let m = Mat4::from_rotation_z(0.5);
    mt.set_transform(m);
    ticks.run_tick();

    assert_eq!(mt.handles(), before);
    let dev = dev.borrow();
    assert_eq!(dev.draw_count(), draws + 1);
    assert_eq!(
        dev.buffer_contents(before.transform_buffer.unwrap()),
        Some(bytemuck::bytes_of(&TransformUniform::from(m)))
    );
}

#[test]
fn transform_written_while_source_missing() {
    let (dev, ticks, mt) = ready();
    let buffer = mt.handles().transform_buffer.unwrap();
    let src = mt.source_texture();

    let m = Mat4::from_translation(Vec3::new(0.25, 0.0, 0.0));
    mt.set_source_texture(None);
    mt.set_transform(m);
    ticks.run_tick();
    assert!(!mt.is_ready());

    mt.set_source_texture(src);
    ticks.run_tick();
    assert!(mt.is_ready());
    assert_eq!(mt.handles().transform_buffer, Some(buffer));
    assert_eq!(
        dev.borrow().buffer_contents(buffer),
        Some(bytemuck::bytes_of(&TransformUniform::from(m)))
    );
}

#[test]
fn transform_written_while_shader_missing() {
    let (dev, ticks, mt) = ready();
    let buffer = mt.handles().transform_buffer.unwrap();

    let m = Mat4::from_scale(Vec3::new(0.5, 0.5, 1.0));
    mt.set_shader(None);
    mt.set_transform(m);
    ticks.run_tick();
    assert!(!mt.is_ready());

    mt.set_shader(Some(crate::render::default_shader(true)));
    ticks.run_tick();
    assert!(mt.is_ready());
    assert_eq!(
        dev.borrow().buffer_contents(buffer),
        Some(bytemuck::bytes_of(&TransformUniform::from(m)))
    );
}

#[test]
fn mesh_change_rebuilds_only_geometry() {
    let (dev, ticks, mt) = ready();
    let before = mt.handles();

    mt.set_mesh(Some(Rc::new(MeshSource::quad())));
    ticks.run_tick();

    let after = mt.handles();
    assert_eq!(after.shader, before.shader);
    assert_eq!(after.pipeline, before.pipeline);
    assert_eq!(after.binding_set, before.binding_set);
    assert_eq!(after.texture, before.texture);
    assert_ne!(after.positions, before.positions);
    assert_ne!(after.vertex_array, before.vertex_array);
    assert!(!dev.borrow().is_live(before.positions.unwrap()));
    assert!(!dev.borrow().is_live(before.index_array.unwrap()));
}

#[test]
fn clear_color_only_redraws() {
    let (dev, ticks, mt) = ready();
    let before = mt.handles();

    mt.set_clear_color(Color::rgba(1.0, 0.0, 0.0, 1.0));
    ticks.run_tick();

    assert_eq!(mt.handles(), before);
    let dev = dev.borrow();
    assert_eq!(dev.last_draw().unwrap().clear_color, [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(dev.texture_level(before.texture.unwrap(), 0).unwrap()[..4], [255, 0, 0, 255]);
}

#[test]
fn resize_replaces_target_and_republishes_proxy() {
    let (dev, ticks, mt) = ready();
    let proxy = mt.proxy();
    let before = mt.handles();
    assert_eq!(proxy.get(), before.texture);

    mt.set_size(Extent::new(128, 64));
    ticks.run_tick();

    let after = mt.handles();
    assert_ne!(after.texture, before.texture);
    assert_ne!(after.pipeline, before.pipeline);
    assert_eq!(after.shader, before.shader);
    assert_eq!(after.binding_set, before.binding_set);
    assert_eq!(proxy.get(), after.texture);
    assert_eq!(proxy.size(), Extent::new(128, 64));
    assert!(!dev.borrow().is_live(before.texture.unwrap()));
}

#[test]
fn shader_change_rebuilds_pipeline_and_binding() {
    let (_dev, ticks, mt) = ready();
    let before = mt.handles();

    let mut blob = crate::render::default_shader(true);
    blob.label = "custom".to_string();
    mt.set_shader(Some(blob));
    ticks.run_tick();

    let after = mt.handles();
    assert_ne!(after.shader, before.shader);
    assert_ne!(after.pipeline, before.pipeline);
    assert_ne!(after.binding_set, before.binding_set);
    assert_eq!(after.positions, before.positions);
    assert_eq!(after.transform_buffer, before.transform_buffer);
    assert_eq!(after.sampler, before.sampler);
    assert!(mt.is_ready());
}

// ── missing inputs & rejections ───────────────────────────────────────────

#[test]
fn shader_none_clears_dependent_stages() {
    let (_dev, ticks, mt) = ready();
    mt.set_shader(None);
    ticks.run_tick();

    let st = mt.status();
    assert_eq!(st.shader, ResourceState::Unbuilt);
    assert_eq!(st.pipeline, ResourceState::Unbuilt);
    assert_eq!(st.binding, ResourceState::Unbuilt);
    assert_eq!(st.geometry, ResourceState::Ready);
    assert!(!st.ready);
    // The target itself survives.
    assert!(mt.texture().is_some());
}

#[test]
fn rejected_shader_leaves_object_not_ready_until_replaced() {
    let (dev, ticks, mt) = ready();
    let draws = dev.borrow().draw_count();

    dev.borrow_mut().reject_next(Reject::Shader, 1);
    let mut blob = crate::render::default_shader(true);
    blob.label = "broken".to_string();
    mt.set_shader(Some(blob));
    ticks.run_tick();

    assert_eq!(mt.status().shader, ResourceState::Unbuilt);
    assert!(!mt.is_ready());
    assert_eq!(dev.borrow().draw_count(), draws);

    mt.set_shader(Some(crate::render::default_shader(true)));
    ticks.run_tick();
    assert!(mt.is_ready());
    assert_eq!(dev.borrow().draw_count(), draws + 1);
}

#[test]
fn zero_size_is_not_ready() {
    let (_dev, ticks, mt) = ready();
    mt.set_size(Extent::new(0, 32));
    ticks.run_tick();

    assert_eq!(mt.texture(), None);
    assert_eq!(mt.proxy().get(), None);
    assert_eq!(mt.status().pipeline, ResourceState::Unbuilt);
    assert!(!mt.is_ready());
}

#[test]
fn mesh_none_clears_but_empty_mesh_keeps_geometry() {
    let (_dev, ticks, mt) = ready();
    let before = mt.handles();

    mt.set_mesh(Some(Rc::new(MeshSource::spatial(vec![], vec![]))));
    ticks.run_tick();
    assert_eq!(mt.handles().vertex_array, before.vertex_array);
    assert!(mt.is_ready());

    mt.set_mesh(None);
    ticks.run_tick();
    assert_eq!(mt.handles().vertex_array, None);
    assert_eq!(mt.handles().positions, None);
    assert!(!mt.is_ready());
}

#[test]
fn freed_source_texture_unbinds() {
    let (dev, ticks, mt) = ready();
    let src = mt.source_texture().and_then(|s| s.resolve()).unwrap();
    dev.borrow_mut().free(src.into());

    mt.request_redraw();
    ticks.run_tick();

    assert_eq!(mt.status().binding, ResourceState::Unbuilt);
    assert!(!mt.is_ready());
}

#[test]
fn own_output_is_never_bound_as_source() {
    let (dev, ticks, mt) = ready();
    let draws = dev.borrow().draw_count();

    mt.set_source_texture(Some(mt.texture_ref()));
    ticks.run_tick();
    assert_eq!(mt.status().binding, ResourceState::Unbuilt);
    assert!(!mt.is_ready());
    assert_eq!(dev.borrow().draw_count(), draws);

    // The replacement target is ours too.
    mt.set_size(Extent::new(16, 16));
    ticks.run_tick();
    assert!(mt.texture().is_some());
    assert!(!mt.is_ready());
    assert_eq!(dev.borrow().draw_count(), draws);
}

#[test]
fn rejected_binding_waits_for_an_input_change() {
    let (dev, ticks, mt) = ready();

    dev.borrow_mut().reject_next(Reject::BindingSet, 1);
    mt.set_source_texture(Some(source_texture(&dev).into()));
    ticks.run_tick();
    assert_eq!(mt.status().binding, ResourceState::Unbuilt);

    // The rejection is used up, so a retry here would succeed.
    mt.request_redraw();
    ticks.run_tick();
    assert_eq!(mt.status().binding, ResourceState::Unbuilt);

    mt.set_source_texture(Some(source_texture(&dev).into()));
    ticks.run_tick();
    assert!(mt.is_ready());
}

// ── index width & planar meshes ───────────────────────────────────────────

#[test]
fn index_width_follows_vertex_count() {
    let (dev, ticks, mt) = ready();

    mt.set_mesh(Some(grid(100)));
    ticks.run_tick();
    let ia = mt.handles().index_array.unwrap();
    assert_eq!(dev.borrow().index_array(ia).map(|(_, f, _)| f), Some(IndexFormat::Uint16));

    mt.set_mesh(Some(grid(70_000)));
    ticks.run_tick();
    let ia = mt.handles().index_array.unwrap();
    assert_eq!(dev.borrow().index_array(ia).map(|(_, f, c)| (f, c)), Some((IndexFormat::Uint32, 3)));
    assert!(mt.is_ready());
}

#[test]
fn planar_mesh_uses_reversed_cull_mode() {
    let (dev, ticks, mt) = ready();
    let before = mt.handles();
    let spatial_pipeline = before.pipeline.unwrap();
    assert_eq!(dev.borrow().pipeline(spatial_pipeline).unwrap().raster.cull_mode, CullMode::Back);

    mt.set_mesh(Some(Rc::new(MeshSource::planar_quad(100.0))));
    ticks.run_tick();

    let planar_pipeline = mt.handles().pipeline.unwrap();
    assert_ne!(planar_pipeline, spatial_pipeline);
    assert_eq!(dev.borrow().pipeline(planar_pipeline).unwrap().raster.cull_mode, CullMode::Front);
    assert!(mt.is_ready());
    // Only the pipeline is rebuilt; consumers keep the same output.
    assert_eq!(mt.texture(), before.texture);
    assert_eq!(mt.handles().framebuffer, before.framebuffer);
    assert_eq!(mt.handles().binding_set, before.binding_set);

    // Same planarity: the pipeline stays.
    mt.set_mesh(Some(Rc::new(MeshSource::planar_quad(50.0))));
    ticks.run_tick();
    assert_eq!(mt.handles().pipeline, Some(planar_pipeline));
}

// ── mipmaps ───────────────────────────────────────────────────────────────

#[test]
fn mipmaps_fill_every_level() {
    let config = MeshTextureConfig {
        size: Extent::new(16, 8),
        clear_color: Color::rgba(0.0, 1.0, 0.0, 1.0),
        generate_mipmaps: true,
        ..Default::default()
    };
    let (dev, ticks, mt) = setup_with(config);
    let src = source_texture(&dev);
    mt.set_mesh(Some(Rc::new(MeshSource::quad())));
    mt.set_source_texture(Some(src.into()));
    ticks.run_tick();

    let texture = mt.texture().unwrap();
    let dev = dev.borrow();
    assert_eq!(dev.mip_level_count(texture), Some(5));
    assert_eq!(dev.texture_level(texture, 4), Some(&[0, 255, 0, 255][..]));
}

#[test]
fn mip_copy_failure_is_not_fatal() {
    let config = MeshTextureConfig { generate_mipmaps: true, ..Default::default() };
    let (dev, ticks, mt) = setup_with(config);
    let src = source_texture(&dev);
    dev.borrow_mut().reject_after(Reject::TextureWrite, 2, 1);
    mt.set_mesh(Some(Rc::new(MeshSource::quad())));
    mt.set_source_texture(Some(src.into()));
    ticks.run_tick();

    assert!(mt.is_ready());
    let dev = dev.borrow();
    let writes = dev
        .events()
        .iter()
        .filter(|e| matches!(e, DeviceEvent::TextureWrite { .. }))
        .count();
    assert_eq!(writes, 2);
}

#[test]
fn toggling_mipmaps_rebuilds_target() {
    let (dev, ticks, mt) = ready();
    mt.set_generate_mipmaps(true);
    ticks.run_tick();
    let texture = mt.texture().unwrap();
    assert_eq!(dev.borrow().mip_level_count(texture), Some(9));
}

// ── observers & re-entrancy ───────────────────────────────────────────────

#[test]
fn observers_see_every_pass_including_not_ready() {
    let (_dev, ticks, mt) = setup();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    mt.subscribe(move |c| log.borrow_mut().push(*c));

    ticks.run_tick();
    mt.set_mesh(Some(Rc::new(MeshSource::quad())));
    ticks.run_tick();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|c| !c.ready));
    assert_eq!(seen[0].revision, 1);
    assert_eq!(seen[1].revision, 2);
    assert_eq!(seen[1].size, Extent::new(256, 256));
    assert_eq!(seen[1].texture, mt.texture());
}

#[test]
fn write_from_observer_is_deferred_to_next_tick() {
    let (_dev, ticks, mt) = setup();
    let handle = mt.clone();
    let fired = Rc::new(Cell::new(false));
    let once = fired.clone();
    mt.subscribe(move |_| {
        if !once.replace(true) {
            handle.set_clear_color(Color::WHITE);
        }
    });

    assert_eq!(ticks.run_tick(), 1);
    assert_eq!(mt.status().passes, 1);
    assert!(mt.status().pending);
    assert_eq!(ticks.pending(), 1);

    assert_eq!(ticks.run_tick(), 1);
    assert_eq!(mt.status().passes, 2);
    assert_eq!(ticks.pending(), 0);

    // Break the handle cycle held by the observer.
    mt.teardown();
}

#[test]
fn unsubscribed_observer_stops_receiving() {
    let (_dev, ticks, mt) = setup();
    let hits = Rc::new(Cell::new(0));
    let h = hits.clone();
    let id = mt.subscribe(move |_| h.set(h.get() + 1));
    ticks.run_tick();
    assert!(mt.unsubscribe(id));
    mt.request_redraw();
    ticks.run_tick();
    assert_eq!(hits.get(), 1);
}

#[test]
fn output_can_feed_another_mesh_texture() {
    let (dev, ticks, upstream) = ready();
    let downstream = MeshTexture::new(&dev, &ticks, MeshTextureConfig::default());
    downstream.set_mesh(Some(Rc::new(MeshSource::quad())));
    downstream.set_source_texture(Some(upstream.texture_ref()));
    let relay = downstream.clone();
    upstream.subscribe(move |_| relay.request_redraw());
    ticks.run_tick();
    assert!(downstream.is_ready());

    upstream.set_size(Extent::new(32, 32));
    ticks.run_until_idle(4);

    let set = downstream.handles().binding_set.unwrap();
    let entries = dev.borrow().binding_entries(set).unwrap().to_vec();
    assert!(entries.iter().any(|e| matches!(
        e,
        crate::backend::BindingEntry::SampledTexture { texture, .. }
            if Some(*texture) == upstream.texture()
    )));
    upstream.teardown();
}

// ── teardown ──────────────────────────────────────────────────────────────

#[test]
fn teardown_before_any_resolve_is_safe() {
    let (dev, ticks, mt) = setup();
    mt.teardown();
    mt.teardown();
    assert!(mt.is_torn_down());

    // Only the eagerly built sampler existed.
    assert_eq!(dev.borrow().freed_count(), 1);
    assert_eq!(dev.borrow().live_count(), 0);

    ticks.run_tick();
    assert_eq!(dev.borrow().draw_count(), 0);
}

#[test]
fn teardown_twice_frees_everything_once() {
    let (dev, ticks, mt) = ready();
    let src = mt.source_texture().and_then(|s| s.resolve()).unwrap();
    mt.teardown();
    let freed = dev.borrow().freed_count();
    mt.teardown();

    let dev_ref = dev.borrow();
    assert_eq!(dev_ref.freed_count(), freed);
    // The source texture is not owned by the mesh texture.
    assert!(dev_ref.is_live(src));
    assert_eq!(dev_ref.live_count(), 1);
    assert!(!dev_ref.events().contains(&DeviceEvent::Freed(ResourceId::from(src))));
    drop(dev_ref);

    mt.set_size(Extent::new(8, 8));
    assert_eq!(ticks.pending(), 0);
    assert_eq!(mt.proxy().get(), None);
}

#[test]
fn teardown_on_lost_device_frees_nothing() {
    let (dev, _ticks, mt) = ready();
    let freed = dev.borrow().freed_count();
    dev.borrow_mut().mark_lost();
    mt.teardown();
    assert_eq!(dev.borrow().freed_count(), freed);
}

#[test]
fn teardown_after_device_dropped_is_safe() {
    let (dev, _ticks, mt) = ready();
    drop(dev);
    mt.teardown();
    assert!(mt.is_torn_down());
    assert_eq!(mt.texture(), None);
}

#[test]
fn dropping_last_handle_tears_down() {
    let (dev, ticks, mt) = ready();
    let other = mt.clone();
    drop(mt);
    assert!(dev.borrow().live_count() > 1);
    drop(other);
    assert_eq!(dev.borrow().live_count(), 1);
    ticks.run_tick();
}

#[test]
fn lost_device_mid_life_degrades_to_not_ready() {
    let (dev, ticks, mt) = ready();
    dev.borrow_mut().mark_lost();
    mt.set_transform(Mat4::from_translation(Vec3::X));
    ticks.run_tick();
    assert!(!mt.is_ready());
    assert_eq!(mt.texture(), None);
}

// ── property bag ──────────────────────────────────────────────────────────

#[test]
fn property_bag_routes_to_setters() {
    let (_dev, ticks, mt) = ready();
    mt.set_property("size", Extent::new(10, 20).into()).unwrap();
    mt.set_property("clear_color", Color::BLACK.into()).unwrap();
    mt.set_property("generate_mipmaps", true.into()).unwrap();
    ticks.run_tick();

    assert_eq!(mt.size(), Extent::new(10, 20));
    assert!(matches!(mt.property("generate_mipmaps"), Ok(PropertyValue::Bool(true))));
    assert!(matches!(mt.property("clear_color"), Ok(PropertyValue::Color(c)) if c == Color::BLACK));
    assert!(mt.is_ready());
}

#[test]
fn property_bag_rejects_bad_input() {
    let (_dev, ticks, mt) = setup();
    ticks.run_tick();
    assert_eq!(
        mt.set_property("size", true.into()),
        Err(PropertyError::WrongType { property: Property::Size, expected: "size", got: "bool" })
    );
    assert!(matches!(mt.set_property("nope", true.into()), Err(PropertyError::Unknown(_))));
    assert!(mt.property("nope").is_err());
    assert_eq!(ticks.pending(), 0);
}
