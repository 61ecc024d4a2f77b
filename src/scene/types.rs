//! Plain-data scene model.
//!
//! This is the in-memory representation every component in this crate
//! mutates. It is translated to and from the scene I/O collaborator's own
//! handle at the load/save boundary in [`super::io`] — nothing outside that
//! module ever touches the collaborator's types directly.

use std::collections::HashMap;

/// Maximum number of UV channels a mesh may carry (mirrors Assimp's limit).
pub const MAX_UV_CHANNELS: usize = 8;
/// Maximum number of vertex-color channels a mesh may carry.
pub const MAX_COLOR_CHANNELS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Triangles,
    Lines,
    Points,
    Mixed,
}

/// A set of skinning weights bound to one bone.
#[derive(Debug, Clone, Default)]
pub struct Bone {
    pub name: String,
    /// `(vertex_id, weight)` pairs, vertex_id < mesh.vertex_count().
    pub weights: Vec<(u32, f32)>,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tangents: Option<Vec<[f32; 3]>>,
    pub bitangents: Option<Vec<[f32; 3]>>,
    /// Up to 8 UV channels. Each entry is `None` if the channel is absent,
    /// otherwise a vector of the same length as `positions` of 2- or 3-float
    /// UVs (stored padded to 3 floats; the third component is unused by
    /// every operation that reads 2D UVs).
    pub uv_channels: [Option<Vec<[f32; 3]>>; MAX_UV_CHANNELS],
    pub color_channels: [Option<Vec<[f32; 4]>>; MAX_COLOR_CHANNELS],
    /// Flattened triangle/line/point index buffer.
    pub indices: Vec<u32>,
    pub primitive_kind: PrimitiveKind,
    pub material_index: u32,
    pub bones: Vec<Bone>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of complete triangles in `indices` (0 if not a triangle mesh).
    pub fn triangle_count(&self) -> usize {
        if self.primitive_kind == PrimitiveKind::Triangles {
            self.indices.len() / 3
        } else {
            0
        }
    }
}

/// Either a compressed on-disk-format blob or decoded ARGB8888 pixels.
#[derive(Debug, Clone)]
pub enum EmbeddedTextureData {
    Compressed {
        bytes: Vec<u8>,
        format_hint: String,
    },
    Uncompressed {
        width: u32,
        height: u32,
        /// Raw ARGB8888 pixels, `width * height * 4` bytes.
        pixels: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct EmbeddedTexture {
    pub filename: Option<String>,
    pub data: EmbeddedTextureData,
}

/// The 20-element canonical texture-semantic-type enumeration (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureType {
    Diffuse,
    Specular,
    Ambient,
    Emissive,
    Height,
    Normals,
    Shininess,
    Opacity,
    Displacement,
    Lightmap,
    Reflection,
    BaseColor,
    NormalCamera,
    EmissionColor,
    Metalness,
    DiffuseRoughness,
    AmbientOcclusion,
    Sheen,
    Clearcoat,
    Transmission,
}

impl TextureType {
    /// The canonical slot-iteration order (§6.2), also the atlas build order.
    pub const CANONICAL_ORDER: [TextureType; 20] = [
        TextureType::Diffuse,
        TextureType::Specular,
        TextureType::Ambient,
        TextureType::Emissive,
        TextureType::Height,
        TextureType::Normals,
        TextureType::Shininess,
        TextureType::Opacity,
        TextureType::Displacement,
        TextureType::Lightmap,
        TextureType::Reflection,
        TextureType::BaseColor,
        TextureType::NormalCamera,
        TextureType::EmissionColor,
        TextureType::Metalness,
        TextureType::DiffuseRoughness,
        TextureType::AmbientOcclusion,
        TextureType::Sheen,
        TextureType::Clearcoat,
        TextureType::Transmission,
    ];

    /// Atlas filename suffix table (§6.3).
    pub fn atlas_suffix(self) -> &'static str {
        match self {
            TextureType::Diffuse => "diffuse",
            TextureType::Specular => "specular",
            TextureType::Ambient => "ambient",
            TextureType::Emissive => "emissive",
            TextureType::Height => "height",
            TextureType::Normals => "normal",
            TextureType::Shininess => "shininess",
            TextureType::Opacity => "opacity",
            TextureType::Displacement => "displacement",
            TextureType::Lightmap => "lightmap",
            TextureType::Reflection => "reflection",
            TextureType::BaseColor => "basecolor",
            TextureType::NormalCamera => "normal_camera",
            TextureType::EmissionColor => "emission",
            TextureType::Metalness => "metalness",
            TextureType::DiffuseRoughness => "roughness",
            TextureType::AmbientOcclusion => "ao",
            TextureType::Sheen => "sheen",
            TextureType::Clearcoat => "clearcoat",
            TextureType::Transmission => "transmission",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Wrap,
    Clamp,
    Mirror,
    Decal,
}

/// One texture reference within a material's per-type slot list.
#[derive(Debug, Clone)]
pub struct TextureSlot {
    /// Either `"*N"` (embedded texture index `N`) or an external path
    /// relative to the model's source directory.
    pub path: String,
    pub wrap_mode_u: WrapMode,
    pub wrap_mode_v: WrapMode,
}

#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: String,
    pub textures: HashMap<TextureType, Vec<TextureSlot>>,
}

impl Material {
    pub fn slots(&self, ty: TextureType) -> &[TextureSlot] {
        self.textures.get(&ty).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn slots_mut(&mut self, ty: TextureType) -> Option<&mut Vec<TextureSlot>> {
        self.textures.get_mut(&ty)
    }
}

/// A node in the scene's transform hierarchy.
///
/// No component in this crate reads or writes `transform`; nodes exist so
/// deep-clone and persistence round-trip the whole graph, not just the
/// mesh/material tables.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    /// Row-major 4x4 local transform.
    pub transform: [[f32; 4]; 4],
    pub mesh_indices: Vec<u32>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub embedded_textures: Vec<EmbeddedTexture>,
    pub root: Option<Node>,
}

impl Scene {
    /// Resolves a material slot path of the form `"*N"` to an embedded
    /// texture index. Returns `None` for external paths.
    pub fn lookup_embedded_index(&self, path: &str) -> Option<usize> {
        resolve_embedded_ref(path, self.embedded_textures.len())
    }
}

/// Shared logic behind `Scene::lookup_embedded_index`, split out so callers
/// already holding a mutable borrow of another `Scene` field (e.g. iterating
/// `&mut scene.materials`) can still validate a `"*N"` ref against the
/// embedded texture count.
pub fn resolve_embedded_ref(path: &str, embedded_len: usize) -> Option<usize> {
    let n = path.strip_prefix('*')?;
    let idx: usize = n.parse().ok()?;
    if idx < embedded_len {
        Some(idx)
    } else {
        None
    }
}
