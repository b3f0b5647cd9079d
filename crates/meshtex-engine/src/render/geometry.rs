use crate::backend::{
    BufferDesc, BufferHandle, BufferUsage, IndexArrayHandle, RenderDevice, RenderResult,
    ResourceId, VertexArrayHandle,
};
use crate::geometry::EncodedGeometry;

/// Device objects built from one mesh version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryHandles {
    pub positions: BufferHandle,
    pub uvs: BufferHandle,
    pub vertex_array: VertexArrayHandle,
    pub index_buffer: Option<BufferHandle>,
    pub index_array: Option<IndexArrayHandle>,
}

/// Uploads `geometry` into fresh buffers.
///
/// Either every object is created or none is left behind.
pub fn upload_geometry<D: RenderDevice + ?Sized>(
    device: &mut D,
    geometry: &EncodedGeometry,
) -> RenderResult<GeometryHandles> {
    let mut created: Vec<ResourceId> = Vec::with_capacity(5);
    let result = upload_inner(device, geometry, &mut created);
    if result.is_err() {
        for id in created.into_iter().rev() {
            device.free(id);
        }
    }
    result
}

fn upload_inner<D: RenderDevice + ?Sized>(
    device: &mut D,
    geometry: &EncodedGeometry,
    created: &mut Vec<ResourceId>,
) -> RenderResult<GeometryHandles> {
    let vertex = |label| BufferDesc { label, usage: BufferUsage::Vertex };

    let positions = device.create_buffer(&vertex("meshtex positions"), &geometry.positions)?;
    created.push(positions.into());
    let uvs = device.create_buffer(&vertex("meshtex uvs"), &geometry.uvs)?;
    created.push(uvs.into());
    let vertex_array = device.create_vertex_array(geometry.vertex_count, [positions, uvs])?;
    created.push(vertex_array.into());

    let (index_buffer, index_array) = match &geometry.indices {
        Some(indices) => {
            let buffer = device.create_buffer(
                &BufferDesc { label: "meshtex indices", usage: BufferUsage::Index },
                &indices.bytes,
            )?;
            created.push(buffer.into());
            let array = device.create_index_array(buffer, indices.format, indices.count)?;
            created.push(array.into());
            (Some(buffer), Some(array))
        }
        None => (None, None),
    };

    log::trace!(
        "uploaded {} vertices ({}), indices: {:?}",
        geometry.vertex_count,
        if geometry.planar { "planar" } else { "spatial" },
        geometry.indices.as_ref().map(|i| (i.format, i.count)),
    );

    Ok(GeometryHandles {
        positions,
        uvs,
        vertex_array,
        index_buffer,
        index_array,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::Reject;
    use crate::backend::{DummyDevice, IndexFormat};
    use crate::geometry::{MeshSource, encode};

    #[test]
    fn uploads_indexed_mesh() {
        let mut dev = DummyDevice::new();
        let g = encode(&MeshSource::quad(), 1.0).unwrap();
        let h = upload_geometry(&mut dev, &g).unwrap();

        assert_eq!(dev.vertex_array(h.vertex_array), Some(([h.positions, h.uvs], 4)));
        let (_, format, count) = dev.index_array(h.index_array.unwrap()).unwrap();
        assert_eq!((format, count), (IndexFormat::Uint16, 6));
        assert_eq!(dev.live_count(), 5);
        assert_eq!(dev.freed_count(), 0);
    }

    #[test]
    fn failed_upload_leaves_nothing_behind() {
        let mut dev = DummyDevice::new();
        let g = encode(&MeshSource::quad(), 1.0).unwrap();
        // positions and uvs go through, the index buffer is refused
        dev.reject_after(Reject::Buffer, 2, 1);

        assert!(upload_geometry(&mut dev, &g).is_err());
        assert_eq!(dev.live_count(), 0);
        assert_eq!(dev.freed_count(), 3);
    }
}
