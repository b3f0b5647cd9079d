/// Vertex positions as supplied by the asset side.
#[derive(Debug, Clone, PartialEq)]
pub enum Positions {
    /// 2-component positions. Promoted to `z = 0` and scaled when encoded.
    Planar(Vec<[f32; 2]>),
    Spatial(Vec<[f32; 3]>),
}

impl Positions {
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Planar(p) => p.len(),
            Self::Spatial(p) => p.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Three parallel arrays describing one triangle list.
///
/// The mesh texture only ever reads a `MeshSource`; callers share it behind an
/// `Rc` and replace it wholesale to change geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSource {
    positions: Positions,
    uvs: Vec<[f32; 2]>,
    indices: Option<Vec<u32>>,
}

impl MeshSource {
    pub fn spatial(positions: Vec<[f32; 3]>, uvs: Vec<[f32; 2]>) -> Self {
        Self {
            positions: Positions::Spatial(positions),
            uvs,
            indices: None,
        }
    }

    pub fn planar(positions: Vec<[f32; 2]>, uvs: Vec<[f32; 2]>) -> Self {
        Self {
            positions: Positions::Planar(positions),
            uvs,
            indices: None,
        }
    }

    /// Attaches an index list. An empty list means non-indexed drawing.
    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = if indices.is_empty() { None } else { Some(indices) };
        self
    }

    /// Full-viewport quad in clip space, counter-clockwise.
    pub fn quad() -> Self {
        Self::spatial(
            vec![
                [-1.0, -1.0, 0.0],
                [1.0, -1.0, 0.0],
                [1.0, 1.0, 0.0],
                [-1.0, 1.0, 0.0],
            ],
            vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
        )
        .with_indices(vec![0, 1, 2, 0, 2, 3])
    }

    /// Planar quad spanning `[-half, half]` on both axes, wound the way 2D
    /// meshes are authored (mirrored relative to [`MeshSource::quad`]).
    pub fn planar_quad(half: f32) -> Self {
        Self::planar(
            vec![[-half, -half], [half, -half], [half, half], [-half, half]],
            vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
        )
        .with_indices(vec![0, 2, 1, 0, 3, 2])
    }

    #[inline]
    pub fn positions(&self) -> &Positions {
        &self.positions
    }

    #[inline]
    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    #[inline]
    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_planar(&self) -> bool {
        matches!(self.positions, Positions::Planar(_))
    }
}
