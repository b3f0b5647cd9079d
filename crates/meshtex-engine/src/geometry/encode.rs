//! Packs a [`MeshSource`] into the byte layout the device expects.
//!
//! Layout:
//! - positions: tightly packed `[f32; 3]`, native endianness
//! - uvs: tightly packed `[f32; 2]`, one per position
//! - indices: `u16` when the vertex count fits, else `u32`

use super::{MeshSource, Positions};
use crate::backend::IndexFormat;

/// Largest vertex count addressable with 16-bit indices.
const MAX_U16_VERTICES: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedIndices {
    pub format: IndexFormat,
    pub count: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedGeometry {
    pub vertex_count: u32,
    pub positions: Vec<u8>,
    pub uvs: Vec<u8>,
    pub indices: Option<EncodedIndices>,
    /// Source positions were 2-component.
    pub planar: bool,
}

/// Index width for a mesh with `vertex_count` vertices.
#[inline]
pub fn index_format_for(vertex_count: usize) -> IndexFormat {
    if vertex_count <= MAX_U16_VERTICES {
        IndexFormat::Uint16
    } else {
        IndexFormat::Uint32
    }
}

/// Encodes `mesh`. Returns `None` for a mesh without vertices.
///
/// Planar positions are promoted to `z = 0` and multiplied by `planar_scale`.
pub fn encode(mesh: &MeshSource, planar_scale: f32) -> Option<EncodedGeometry> {
    let vertex_count = mesh.vertex_count();
    if vertex_count == 0 {
        return None;
    }

    let positions: Vec<[f32; 3]> = match mesh.positions() {
        Positions::Spatial(p) => p.clone(),
        Positions::Planar(p) => p
            .iter()
            .map(|&[x, y]| [x * planar_scale, y * planar_scale, 0.0])
            .collect(),
    };

    let mut uvs = mesh.uvs().to_vec();
    uvs.resize(vertex_count, [0.0, 0.0]);

    let indices = mesh.indices().map(|idx| encode_indices(idx, vertex_count));

    Some(EncodedGeometry {
        vertex_count: vertex_count as u32,
        positions: bytemuck::cast_slice(&positions).to_vec(),
        uvs: bytemuck::cast_slice(&uvs).to_vec(),
        indices,
        planar: mesh.is_planar(),
    })
}

fn encode_indices(indices: &[u32], vertex_count: usize) -> EncodedIndices {
    let count = indices.len() as u32;
    if index_format_for(vertex_count) == IndexFormat::Uint16 {
        let narrow: Option<Vec<u16>> = indices.iter().map(|&i| u16::try_from(i).ok()).collect();
        if let Some(narrow) = narrow {
            return EncodedIndices {
                format: IndexFormat::Uint16,
                count,
                bytes: bytemuck::cast_slice(&narrow).to_vec(),
            };
        }
        log::warn!("index out of 16-bit range for a {vertex_count}-vertex mesh; using 32-bit indices");
    }
    EncodedIndices {
        format: IndexFormat::Uint32,
        count,
        bytes: bytemuck::cast_slice(indices).to_vec(),
    }
}
