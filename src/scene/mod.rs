//! Scene data model and the I/O boundary that produces/consumes it.

pub mod io;
pub mod types;

pub use types::{
    Bone, EmbeddedTexture, EmbeddedTextureData, Material, Mesh, Node, PrimitiveKind, Scene,
    TextureSlot, TextureType, WrapMode, MAX_COLOR_CHANNELS, MAX_UV_CHANNELS,
};
