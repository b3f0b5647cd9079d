//! Name-keyed access to the mesh texture's inputs.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use glam::Mat4;
use thiserror::Error;

use crate::backend::{Extent, ShaderBlob};
use crate::geometry::MeshSource;
use crate::paint::Color;
use crate::resource::TextureRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Size,
    Mesh,
    SourceTexture,
    Shader,
    Transform,
    ClearColor,
    GenerateMipmaps,
}

impl Property {
    pub const ALL: [Property; 7] = [
        Property::Size,
        Property::Mesh,
        Property::SourceTexture,
        Property::Shader,
        Property::Transform,
        Property::ClearColor,
        Property::GenerateMipmaps,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Mesh => "mesh",
            Self::SourceTexture => "source_texture",
            Self::Shader => "shader",
            Self::Transform => "transform",
            Self::ClearColor => "clear_color",
            Self::GenerateMipmaps => "generate_mipmaps",
        }
    }

    fn expects(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Mesh => "mesh",
            Self::SourceTexture => "texture",
            Self::Shader => "shader",
            Self::Transform => "transform",
            Self::ClearColor => "color",
            Self::GenerateMipmaps => "bool",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Property {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| PropertyError::Unknown(s.to_string()))
    }
}

/// Dynamically typed property value.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Size(Extent),
    Mesh(Option<Rc<MeshSource>>),
    Texture(Option<TextureRef>),
    Shader(Option<ShaderBlob>),
    Transform(Mat4),
    Color(Color),
    Bool(bool),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Size(_) => "size",
            Self::Mesh(_) => "mesh",
            Self::Texture(_) => "texture",
            Self::Shader(_) => "shader",
            Self::Transform(_) => "transform",
            Self::Color(_) => "color",
            Self::Bool(_) => "bool",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("unknown property `{0}`")]
    Unknown(String),
    #[error("property `{property}` expects a {expected} value, got {got}")]
    WrongType {
        property: Property,
        expected: &'static str,
        got: &'static str,
    },
}

impl PropertyError {
    pub(super) fn wrong_type(property: Property, value: &PropertyValue) -> Self {
        Self::WrongType {
            property,
            expected: property.expects(),
            got: value.type_name(),
        }
    }
}

impl From<Extent> for PropertyValue {
    fn from(v: Extent) -> Self {
        Self::Size(v)
    }
}

impl From<Rc<MeshSource>> for PropertyValue {
    fn from(v: Rc<MeshSource>) -> Self {
        Self::Mesh(Some(v))
    }
}

impl From<MeshSource> for PropertyValue {
    fn from(v: MeshSource) -> Self {
        Self::Mesh(Some(Rc::new(v)))
    }
}

impl From<TextureRef> for PropertyValue {
    fn from(v: TextureRef) -> Self {
        Self::Texture(Some(v))
    }
}

impl From<ShaderBlob> for PropertyValue {
    fn from(v: ShaderBlob) -> Self {
        Self::Shader(Some(v))
    }
}

impl From<Mat4> for PropertyValue {
    fn from(v: Mat4) -> Self {
        Self::Transform(v)
    }
}

impl From<Color> for PropertyValue {
    fn from(v: Color) -> Self {
        Self::Color(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for p in Property::ALL {
            assert_eq!(p.name().parse::<Property>(), Ok(p));
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        assert_eq!(
            "albedo".parse::<Property>(),
            Err(PropertyError::Unknown("albedo".to_string()))
        );
    }

    #[test]
    fn wrong_type_message_names_both_types() {
        let err = PropertyError::wrong_type(Property::Size, &PropertyValue::Bool(true));
        assert_eq!(err.to_string(), "property `size` expects a size value, got bool");
    }
}
