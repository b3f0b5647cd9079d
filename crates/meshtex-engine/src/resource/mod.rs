//! Ownership of device objects.
//!
//! - [`Slot`]: one owned handle per role, freed before it is replaced
//! - [`TextureProxy`]: shared view of the current output texture
//! - [`TextureRef`]: what the source-texture input points at

mod proxy;
mod slot;

pub use proxy::{TextureProxy, TextureRef};
pub use slot::Slot;

/// Build state of one resource role.
///
/// `Building` only exists inside a resolve pass and is never reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Unbuilt,
    Building,
    Ready,
}
