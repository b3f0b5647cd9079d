//! Mesh input and its packed GPU layout.

mod encode;
mod source;

pub use encode::{EncodedGeometry, EncodedIndices, encode, index_format_for};
pub use source::{MeshSource, Positions};
