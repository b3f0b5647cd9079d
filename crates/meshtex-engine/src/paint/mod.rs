//! Color model for clear colors and CPU-side pixel work.

pub mod color;

pub use color::Color;
