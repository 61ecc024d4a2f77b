//! Scene I/O collaborator boundary.
//!
//! This is the only module in the crate that talks to `russimp` (the Rust
//! bindings over Assimp). Every other component operates on the plain-data
//! [`super::types::Scene`] — this module's job is translating between that
//! representation and the collaborator's own scene handle at load and save
//! time, the same way `nether-export`'s `mesh/gltf.rs` walks a `gltf::Document`
//! once at the edge and hands plain `Vec<[f32; N]>` buffers to the rest of
//! the tool.

use std::collections::HashMap;
use std::path::Path;

use russimp::material::{DataContent, PropertyTypeInfo, TextureType as RTextureType};
use russimp::node::Node as RNode;
use russimp::scene::{PostProcess, Scene as RScene};

use crate::error::{LodError, Result};
use crate::scene::types::{
    Bone, EmbeddedTexture, EmbeddedTextureData, Material, Mesh, Node, PrimitiveKind, Scene,
    TextureSlot, TextureType, WrapMode, MAX_COLOR_CHANNELS, MAX_UV_CHANNELS,
};

/// Every format id Assimp is built with export/import support for in the
/// configuration this crate links against. Exposed so callers can validate
/// an input/output extension before doing any work.
pub fn supported_formats() -> &'static [&'static str] {
    &[
        "gltf", "glb", "obj", "fbx", "dae", "ply", "stl", "3ds", "blend", "x3d",
    ]
}

fn assimp_export_format_id(ext: &str) -> Result<&'static str> {
    Ok(match ext.to_ascii_lowercase().as_str() {
        "gltf" => "gltf2",
        "glb" => "glb2",
        "obj" => "obj",
        "fbx" => "fbx",
        "dae" => "collada",
        "ply" => "ply",
        "stl" => "stl",
        "3ds" => "3ds",
        "x3d" => "x3d",
        other => return Err(LodError::UnsupportedFormat(other.to_string())),
    })
}

/// Loads a scene file, applying triangulation, identical-vertex joining, and
/// a by-primitive-type sort at import time (§6.1).
pub fn load_scene(path: &Path) -> Result<Scene> {
    if !path.exists() {
        return Err(LodError::FileNotFound(path.to_path_buf()));
    }

    let path_str = path
        .to_str()
        .ok_or_else(|| LodError::ImportFailed(format!("non-utf8 path: {:?}", path)))?;

    let rscene = RScene::from_file(
        path_str,
        vec![
            PostProcess::Triangulate,
            PostProcess::JoinIdenticalVertices,
            PostProcess::SortByPrimitiveType,
        ],
    )
    .map_err(|e| LodError::ImportFailed(e.to_string()))?;

    scene_from_russimp(&rscene)
}

/// Persists a scene to `path`, selecting the exporter by extension.
///
/// Per §6.1, the saver deep-copies the scene once more (some exporters
/// mutate their input in place) and strips materials no mesh references
/// before handing off to the collaborator.
pub fn save_scene(scene: &Scene, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| LodError::ExportFailed("output path has no extension".into()))?;
    let format_id = assimp_export_format_id(ext)?;

    let mut export_copy = deep_clone_scene(scene)?;
    compact_unreferenced_materials(&mut export_copy);

    let rscene = scene_to_russimp(&export_copy)?;
    let path_str = path
        .to_str()
        .ok_or_else(|| LodError::ExportFailed(format!("non-utf8 path: {:?}", path)))?;

    rscene
        .export_file(path_str, format_id)
        .map_err(|e| LodError::ExportFailed(e.to_string()))
}

/// Node hierarchies this deep would already be pathological for any real
/// asset; past this point a recursive clone risks blowing the stack on a
/// malformed or cyclic-looking import, so `deep_clone_scene` refuses first.
const MAX_NODE_DEPTH: usize = 1000;

/// Deep-clones a scene, honoring the `SceneCopyFailed` contract of §4.4 by
/// checking the node hierarchy's depth before the recursive `Clone` runs.
pub fn deep_clone_scene(scene: &Scene) -> Result<Scene> {
    if let Some(root) = &scene.root {
        check_node_depth(root, 0)?;
    }
    Ok(scene.clone())
}

fn check_node_depth(node: &Node, depth: usize) -> Result<()> {
    if depth > MAX_NODE_DEPTH {
        return Err(LodError::SceneCopyFailed(format!(
            "node hierarchy exceeds max depth of {MAX_NODE_DEPTH}"
        )));
    }
    for child in &node.children {
        check_node_depth(child, depth + 1)?;
    }
    Ok(())
}

/// Removes materials no mesh references, compacting the material table and
/// rewriting every `mesh.material_index` to match (§6.1).
fn compact_unreferenced_materials(scene: &mut Scene) {
    let mut referenced = vec![false; scene.materials.len()];
    for mesh in &scene.meshes {
        if let Some(flag) = referenced.get_mut(mesh.material_index as usize) {
            *flag = true;
        }
    }

    let mut remap = vec![0u32; scene.materials.len()];
    let mut kept = Vec::with_capacity(scene.materials.len());
    for (old_idx, keep) in referenced.iter().enumerate() {
        if *keep {
            remap[old_idx] = kept.len() as u32;
            kept.push(scene.materials[old_idx].clone());
        }
    }
    scene.materials = kept;

    for mesh in &mut scene.meshes {
        if let Some(&new_idx) = remap.get(mesh.material_index as usize) {
            mesh.material_index = new_idx;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::types::{Material, Mesh};

    fn scene_with_materials(names: &[&str]) -> Scene {
        Scene {
            materials: names
                .iter()
                .map(|n| Material { name: n.to_string(), ..Default::default() })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn compact_drops_unreferenced_materials_and_remaps_indices() {
        let mut scene = scene_with_materials(&["a", "b", "c"]);
        scene.meshes.push(Mesh { material_index: 2, ..Default::default() });

        compact_unreferenced_materials(&mut scene);

        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.materials[0].name, "c");
        assert_eq!(scene.meshes[0].material_index, 0);
    }

    #[test]
    fn compact_keeps_every_material_multiple_meshes_reference() {
        let mut scene = scene_with_materials(&["a", "b"]);
        scene.meshes.push(Mesh { material_index: 0, ..Default::default() });
        scene.meshes.push(Mesh { material_index: 1, ..Default::default() });

        compact_unreferenced_materials(&mut scene);

        assert_eq!(scene.materials.len(), 2);
        assert_eq!(scene.meshes[0].material_index, 0);
        assert_eq!(scene.meshes[1].material_index, 1);
    }

    #[test]
    fn deep_clone_scene_is_independent_of_source() {
        let mut scene = scene_with_materials(&["a"]);
        let clone = deep_clone_scene(&scene).unwrap();
        scene.materials[0].name = "mutated".into();
        assert_eq!(clone.materials[0].name, "a");
    }

    #[test]
    fn deep_clone_scene_rejects_pathologically_deep_node_tree() {
        let mut root = Node::default();
        let mut current = &mut root;
        for _ in 0..(MAX_NODE_DEPTH + 1) {
            current.children.push(Node::default());
            current = current.children.last_mut().unwrap();
        }

        let scene = Scene { root: Some(root), ..Default::default() };
        let err = deep_clone_scene(&scene).unwrap_err();
        assert!(matches!(err, LodError::SceneCopyFailed(_)));
    }
}

// --- russimp -> Scene --------------------------------------------------

fn scene_from_russimp(rscene: &RScene) -> Result<Scene> {
    let meshes = rscene
        .meshes
        .iter()
        .map(mesh_from_russimp)
        .collect::<Result<Vec<_>>>()?;

    let materials = rscene
        .materials
        .iter()
        .map(material_from_russimp)
        .collect::<Vec<_>>();

    let embedded_textures = rscene
        .textures
        .iter()
        .map(|(_, tex)| embedded_texture_from_russimp(tex))
        .collect::<Vec<_>>();

    let root = rscene
        .root
        .as_ref()
        .map(|rc| node_from_russimp(&rc.borrow()));

    Ok(Scene {
        meshes,
        materials,
        embedded_textures,
        root,
    })
}

fn mesh_from_russimp(rmesh: &russimp::mesh::Mesh) -> Result<Mesh> {
    let positions: Vec<[f32; 3]> = rmesh.vertices.iter().map(|v| [v.x, v.y, v.z]).collect();
    let v_count = positions.len();

    let normals = (!rmesh.normals.is_empty())
        .then(|| rmesh.normals.iter().map(|v| [v.x, v.y, v.z]).collect());
    let tangents = (!rmesh.tangents.is_empty())
        .then(|| rmesh.tangents.iter().map(|v| [v.x, v.y, v.z]).collect());
    let bitangents = (!rmesh.bitangents.is_empty())
        .then(|| rmesh.bitangents.iter().map(|v| [v.x, v.y, v.z]).collect());

    let mut uv_channels: [Option<Vec<[f32; 3]>>; MAX_UV_CHANNELS] = Default::default();
    for (i, chan) in rmesh.texture_coords.iter().enumerate().take(MAX_UV_CHANNELS) {
        if let Some(coords) = chan {
            uv_channels[i] = Some(coords.iter().map(|v| [v.x, v.y, v.z]).collect());
        }
    }

    let mut color_channels: [Option<Vec<[f32; 4]>>; MAX_COLOR_CHANNELS] = Default::default();
    for (i, chan) in rmesh.colors.iter().enumerate().take(MAX_COLOR_CHANNELS) {
        if let Some(colors) = chan {
            color_channels[i] = Some(colors.iter().map(|c| [c.r, c.g, c.b, c.a]).collect());
        }
    }

    let indices: Vec<u32> = rmesh
        .faces
        .iter()
        .flat_map(|f| f.0.iter().copied())
        .collect();

    let primitive_kind = match indices.len().checked_rem(3) {
        Some(0) if !indices.is_empty() => PrimitiveKind::Triangles,
        _ => {
            let max_face_len = rmesh.faces.iter().map(|f| f.0.len()).max().unwrap_or(0);
            match max_face_len {
                1 => PrimitiveKind::Points,
                2 => PrimitiveKind::Lines,
                _ => PrimitiveKind::Mixed,
            }
        }
    };

    let bones = rmesh
        .bones
        .iter()
        .map(|b| Bone {
            name: b.name.clone(),
            weights: b.weights.iter().map(|w| (w.vertex_id, w.weight)).collect(),
        })
        .collect();

    let _ = v_count;
    Ok(Mesh {
        name: rmesh.name.clone(),
        positions,
        normals,
        tangents,
        bitangents,
        uv_channels,
        color_channels,
        indices,
        primitive_kind,
        material_index: rmesh.material_index,
        bones,
    })
}

fn texture_type_from_russimp(ty: RTextureType) -> Option<TextureType> {
    use RTextureType::*;
    Some(match ty {
        Diffuse => TextureType::Diffuse,
        Specular => TextureType::Specular,
        Ambient => TextureType::Ambient,
        Emissive => TextureType::Emissive,
        Height => TextureType::Height,
        Normals => TextureType::Normals,
        Shininess => TextureType::Shininess,
        Opacity => TextureType::Opacity,
        Displacement => TextureType::Displacement,
        Lightmap => TextureType::Lightmap,
        Reflection => TextureType::Reflection,
        BaseColor => TextureType::BaseColor,
        NormalCamera => TextureType::NormalCamera,
        EmissionColor => TextureType::EmissionColor,
        Metalness => TextureType::Metalness,
        DiffuseRoughness => TextureType::DiffuseRoughness,
        AmbientOcclusion => TextureType::AmbientOcclusion,
        Sheen => TextureType::Sheen,
        Clearcoat => TextureType::Clearcoat,
        Transmission => TextureType::Transmission,
        _ => return None,
    })
}

fn texture_type_to_russimp(ty: TextureType) -> RTextureType {
    match ty {
        TextureType::Diffuse => RTextureType::Diffuse,
        TextureType::Specular => RTextureType::Specular,
        TextureType::Ambient => RTextureType::Ambient,
        TextureType::Emissive => RTextureType::Emissive,
        TextureType::Height => RTextureType::Height,
        TextureType::Normals => RTextureType::Normals,
        TextureType::Shininess => RTextureType::Shininess,
        TextureType::Opacity => RTextureType::Opacity,
        TextureType::Displacement => RTextureType::Displacement,
        TextureType::Lightmap => RTextureType::Lightmap,
        TextureType::Reflection => RTextureType::Reflection,
        TextureType::BaseColor => RTextureType::BaseColor,
        TextureType::NormalCamera => RTextureType::NormalCamera,
        TextureType::EmissionColor => RTextureType::EmissionColor,
        TextureType::Metalness => RTextureType::Metalness,
        TextureType::DiffuseRoughness => RTextureType::DiffuseRoughness,
        TextureType::AmbientOcclusion => RTextureType::AmbientOcclusion,
        TextureType::Sheen => RTextureType::Sheen,
        TextureType::Clearcoat => RTextureType::Clearcoat,
        TextureType::Transmission => RTextureType::Transmission,
    }
}

fn material_from_russimp(rmat: &russimp::material::Material) -> Material {
    let mut textures: HashMap<TextureType, Vec<TextureSlot>> = HashMap::new();

    for (rty, slots) in &rmat.textures {
        let Some(ty) = texture_type_from_russimp(*rty) else {
            continue;
        };
        let converted = slots
            .iter()
            .map(|tex| TextureSlot {
                path: tex.borrow().filename.clone(),
                wrap_mode_u: WrapMode::Wrap,
                wrap_mode_v: WrapMode::Wrap,
            })
            .collect::<Vec<_>>();
        if !converted.is_empty() {
            textures.insert(ty, converted);
        }
    }

    let name = rmat
        .properties
        .iter()
        .find(|p| p.key == "?mat.name")
        .and_then(|p| match &p.data {
            PropertyTypeInfo::String(s) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default();

    Material { name, textures }
}

fn embedded_texture_from_russimp(rtex: &russimp::material::Texture) -> EmbeddedTexture {
    let data = match &rtex.data {
        DataContent::Bytes(bytes) => EmbeddedTextureData::Compressed {
            bytes: bytes.clone(),
            format_hint: rtex.ach_format_hint.clone(),
        },
        DataContent::Texel(texels) => {
            let mut pixels = Vec::with_capacity(texels.len() * 4);
            for t in texels {
                // Assimp stores uncompressed embedded textures as ARGB8888.
                pixels.extend_from_slice(&[t.r, t.g, t.b, t.a]);
            }
            EmbeddedTextureData::Uncompressed {
                width: rtex.width,
                height: rtex.height,
                pixels,
            }
        }
    };

    EmbeddedTexture {
        filename: (!rtex.filename.is_empty()).then(|| rtex.filename.clone()),
        data,
    }
}

fn node_from_russimp(rnode: &RNode) -> Node {
    let t = rnode.transformation;
    Node {
        name: rnode.name.clone(),
        transform: [
            [t.a1, t.a2, t.a3, t.a4],
            [t.b1, t.b2, t.b3, t.b4],
            [t.c1, t.c2, t.c3, t.c4],
            [t.d1, t.d2, t.d3, t.d4],
        ],
        mesh_indices: rnode.meshes.clone(),
        children: rnode
            .children
            .borrow()
            .iter()
            .map(|c| node_from_russimp(&c.borrow()))
            .collect(),
    }
}

// --- Scene -> russimp ----------------------------------------------------

fn scene_to_russimp(scene: &Scene) -> Result<RScene> {
    let meshes = scene.meshes.iter().map(mesh_to_russimp).collect();
    let materials = scene.materials.iter().map(material_to_russimp).collect();
    let textures = scene
        .embedded_textures
        .iter()
        .enumerate()
        .map(|(i, t)| (i as u32, embedded_texture_to_russimp(t)))
        .collect();
    let root = scene.root.as_ref().map(node_to_russimp);

    Ok(RScene {
        meshes,
        materials,
        textures,
        root,
        ..Default::default()
    })
}

fn mesh_to_russimp(mesh: &Mesh) -> russimp::mesh::Mesh {
    use russimp::scene::Vector3D;

    let vertices = mesh
        .positions
        .iter()
        .map(|p| Vector3D { x: p[0], y: p[1], z: p[2] })
        .collect();

    let normals = mesh
        .normals
        .as_ref()
        .map(|ns| ns.iter().map(|n| Vector3D { x: n[0], y: n[1], z: n[2] }).collect())
        .unwrap_or_default();
    let tangents = mesh
        .tangents
        .as_ref()
        .map(|ts| ts.iter().map(|t| Vector3D { x: t[0], y: t[1], z: t[2] }).collect())
        .unwrap_or_default();
    let bitangents = mesh
        .bitangents
        .as_ref()
        .map(|ts| ts.iter().map(|t| Vector3D { x: t[0], y: t[1], z: t[2] }).collect())
        .unwrap_or_default();

    let mut texture_coords: [Option<Vec<Vector3D>>; MAX_UV_CHANNELS] = Default::default();
    for (i, chan) in mesh.uv_channels.iter().enumerate() {
        if let Some(uvs) = chan {
            texture_coords[i] = Some(
                uvs.iter()
                    .map(|uv| Vector3D { x: uv[0], y: uv[1], z: uv[2] })
                    .collect(),
            );
        }
    }

    let mut colors: [Option<Vec<russimp::scene::Color4D>>; MAX_COLOR_CHANNELS] = Default::default();
    for (i, chan) in mesh.color_channels.iter().enumerate() {
        if let Some(cs) = chan {
            colors[i] = Some(
                cs.iter()
                    .map(|c| russimp::scene::Color4D { r: c[0], g: c[1], b: c[2], a: c[3] })
                    .collect(),
            );
        }
    }

    let faces = mesh
        .indices
        .chunks(3)
        .map(|chunk| russimp::face::Face(chunk.to_vec()))
        .collect();

    let bones = mesh
        .bones
        .iter()
        .map(|b| russimp::bone::Bone {
            name: b.name.clone(),
            weights: b
                .weights
                .iter()
                .map(|(vid, w)| russimp::bone::VertexWeight {
                    vertex_id: *vid,
                    weight: *w,
                })
                .collect(),
            offset_matrix: Default::default(),
        })
        .collect();

    russimp::mesh::Mesh {
        name: mesh.name.clone(),
        vertices,
        normals,
        tangents,
        bitangents,
        texture_coords,
        colors,
        faces,
        material_index: mesh.material_index,
        bones,
        ..Default::default()
    }
}

fn material_to_russimp(mat: &Material) -> russimp::material::Material {
    let mut textures = HashMap::new();
    for ty in TextureType::CANONICAL_ORDER {
        let slots = mat.slots(ty);
        if slots.is_empty() {
            continue;
        }
        let converted = slots
            .iter()
            .map(|slot| {
                std::rc::Rc::new(std::cell::RefCell::new(russimp::material::Texture {
                    filename: slot.path.clone(),
                    ..Default::default()
                }))
            })
            .collect();
        textures.insert(texture_type_to_russimp(ty), converted);
    }

    russimp::material::Material {
        properties: vec![],
        textures,
    }
}

fn embedded_texture_to_russimp(tex: &EmbeddedTexture) -> russimp::material::Texture {
    match &tex.data {
        EmbeddedTextureData::Compressed { bytes, format_hint } => russimp::material::Texture {
            filename: tex.filename.clone().unwrap_or_default(),
            ach_format_hint: format_hint.clone(),
            width: 0,
            height: 0,
            data: DataContent::Bytes(bytes.clone()),
        },
        EmbeddedTextureData::Uncompressed { width, height, pixels } => {
            let texels = pixels
                .chunks_exact(4)
                .map(|p| russimp::scene::Color4D {
                    r: p[0] as f32,
                    g: p[1] as f32,
                    b: p[2] as f32,
                    a: p[3] as f32,
                })
                .collect();
            russimp::material::Texture {
                filename: tex.filename.clone().unwrap_or_default(),
                ach_format_hint: String::new(),
                width: *width,
                height: *height,
                data: DataContent::Texel(texels),
            }
        }
    }
}

fn node_to_russimp(node: &Node) -> RNode {
    let t = node.transform;
    RNode {
        name: node.name.clone(),
        transformation: russimp::scene::Matrix4x4 {
            a1: t[0][0], a2: t[0][1], a3: t[0][2], a4: t[0][3],
            b1: t[1][0], b2: t[1][1], b3: t[1][2], b4: t[1][3],
            c1: t[2][0], c2: t[2][1], c3: t[2][2], c4: t[2][3],
            d1: t[3][0], d2: t[3][1], d3: t[3][2], d4: t[3][3],
        },
        meshes: node.mesh_indices.clone(),
        children: std::cell::RefCell::new(
            node.children
                .iter()
                .map(|c| std::rc::Rc::new(std::cell::RefCell::new(node_to_russimp(c))))
                .collect(),
        ),
        metadata: Default::default(),
    }
}
