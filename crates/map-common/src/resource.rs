//! Resource requests issued by the render engine.
//!
//! The engine identifies resources by a small integer code. Those codes are
//! mapped onto [`ResourceKind`] at the boundary; anything unknown is rejected
//! instead of being silently ignored.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::RenderError;

/// Kind of resource the engine needs while loading or rendering a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// TileJSON document for a style source
    Source,
    /// A single raster or vector tile
    Tile,
    /// A glyph range (protobuf SDF font data)
    Glyph,
    /// Sprite sheet image
    SpriteImage,
    /// Sprite sheet index
    SpriteJson,
    /// Image used by an `image` source
    ImageSource,
}

impl ResourceKind {
    /// Engine-side integer code for this kind.
    pub fn code(self) -> u8 {
        match self {
            ResourceKind::Source => 2,
            ResourceKind::Tile => 3,
            ResourceKind::Glyph => 4,
            ResourceKind::SpriteImage => 5,
            ResourceKind::SpriteJson => 6,
            ResourceKind::ImageSource => 7,
        }
    }
}

impl TryFrom<u8> for ResourceKind {
    type Error = RenderError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            2 => Ok(ResourceKind::Source),
            3 => Ok(ResourceKind::Tile),
            4 => Ok(ResourceKind::Glyph),
            5 => Ok(ResourceKind::SpriteImage),
            6 => Ok(ResourceKind::SpriteJson),
            7 => Ok(ResourceKind::ImageSource),
            other => Err(RenderError::UnsupportedResourceKind(other)),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Source => "source",
            ResourceKind::Tile => "tile",
            ResourceKind::Glyph => "glyph",
            ResourceKind::SpriteImage => "sprite image",
            ResourceKind::SpriteJson => "sprite json",
            ResourceKind::ImageSource => "image source",
        };
        f.write_str(name)
    }
}

/// A request for one resource. Created per engine callback, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub url: String,
    pub kind: ResourceKind,
}

impl ResourceRequest {
    pub fn new(url: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    /// Build a request from the engine's raw integer kind code.
    pub fn from_code(url: impl Into<String>, code: u8) -> Result<Self, RenderError> {
        Ok(Self::new(url, ResourceKind::try_from(code)?))
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceResponse {
    /// Resource content
    Data(Bytes),
    /// No content for this resource; the engine leaves the area blank
    Empty,
}

impl ResourceResponse {
    pub fn data(&self) -> Option<&Bytes> {
        match self {
            ResourceResponse::Data(bytes) => Some(bytes),
            ResourceResponse::Empty => None,
        }
    }

    pub fn into_data(self) -> Option<Bytes> {
        match self {
            ResourceResponse::Data(bytes) => Some(bytes),
            ResourceResponse::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResourceResponse::Empty)
    }
}

impl From<Vec<u8>> for ResourceResponse {
    fn from(data: Vec<u8>) -> Self {
        ResourceResponse::Data(Bytes::from(data))
    }
}
