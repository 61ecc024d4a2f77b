//! Per-type texture atlas packing and UV remap (§4.3).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{LodError, Result};
use crate::pixel::PixelBuffer;
use crate::scene::types::{EmbeddedTexture, EmbeddedTextureData, Scene, TextureType, WrapMode};

const MAX_ATLAS_DIM: u32 = 8192;

#[derive(Debug, Clone)]
pub struct AtlasOpts {
    pub model_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct AtlasInfo {
    pub texture_type: TextureType,
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub packed_count: usize,
}

type Region = (u32, u32, u32, u32);

struct SourceEntry {
    pixels: PixelBuffer,
    disk_path: Option<PathBuf>,
}

fn next_pow2(n: u32) -> u32 {
    if n <= 1 {
        return 1;
    }
    1u32 << (32 - (n - 1).leading_zeros())
}

fn decode_embedded(tex: &EmbeddedTexture) -> Result<PixelBuffer> {
    match &tex.data {
        EmbeddedTextureData::Compressed { bytes, .. } => PixelBuffer::decode(bytes),
        EmbeddedTextureData::Uncompressed { width, height, pixels } => {
            Ok(PixelBuffer::new(*width, *height, pixels.clone()))
        }
    }
}

fn load_source(scene: &Scene, key: &str, opts: &AtlasOpts) -> Result<SourceEntry> {
    if let Some(idx) = scene.lookup_embedded_index(key) {
        let pixels = decode_embedded(&scene.embedded_textures[idx])?;
        return Ok(SourceEntry { pixels, disk_path: None });
    }

    let basename = Path::new(key)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(key);
    let out_candidate = opts.output_dir.join(basename);
    let model_candidate = opts.model_dir.join(basename);

    let (path, pixels) = if out_candidate.exists() {
        (out_candidate.clone(), PixelBuffer::load(&out_candidate)?)
    } else if model_candidate.exists() {
        (model_candidate.clone(), PixelBuffer::load(&model_candidate)?)
    } else {
        return Err(LodError::TextureLoadFailed(format!(
            "no source found on disk for '{key}'"
        )));
    };
    Ok(SourceEntry { pixels, disk_path: Some(path) })
}

/// Groups every texture referenced across materials by semantic type,
/// shelf-packs each group into one atlas image, and remaps mesh UVs to the
/// diffuse atlas's regions.
pub fn build_atlas(scene: &mut Scene, opts: &AtlasOpts) -> Result<Vec<AtlasInfo>> {
    // Phase 1: source collection.
    let mut sources: Vec<SourceEntry> = Vec::new();
    let mut key_to_index: HashMap<String, usize> = HashMap::new();
    let mut slot_refs: Vec<(usize, TextureType, usize)> = Vec::new(); // (material_index, type, source_index)
    let mut seen_types: HashSet<TextureType> = HashSet::new();

    for (mi, material) in scene.materials.iter().enumerate() {
        for ty in TextureType::CANONICAL_ORDER {
            for slot in material.slots(ty) {
                let key = slot.path.clone();
                let source_index = match key_to_index.get(&key) {
                    Some(&idx) => idx,
                    None => {
                        let entry = load_source(scene, &key, opts)?;
                        let idx = sources.len();
                        sources.push(entry);
                        key_to_index.insert(key.clone(), idx);
                        idx
                    }
                };
                slot_refs.push((mi, ty, source_index));
                seen_types.insert(ty);
            }
        }
    }

    if sources.is_empty() {
        return Ok(Vec::new());
    }

    // Phase 2: diffuse-first material -> source mapping.
    let mut mat_first_diffuse: HashMap<usize, usize> = HashMap::new();
    let mut mat_first_any: HashMap<usize, usize> = HashMap::new();
    for &(mi, ty, src) in &slot_refs {
        mat_first_any.entry(mi).or_insert(src);
        if ty == TextureType::Diffuse {
            mat_first_diffuse.entry(mi).or_insert(src);
        }
    }
    let mat_to_src = |mi: usize| -> Option<usize> {
        mat_first_diffuse.get(&mi).or_else(|| mat_first_any.get(&mi)).copied()
    };

    let ordered_active: Vec<TextureType> = TextureType::CANONICAL_ORDER
        .into_iter()
        .filter(|t| seen_types.contains(t))
        .collect();

    // Phase 3: per-type pack.
    let mut new_embedded: Vec<EmbeddedTexture> = Vec::new();
    let mut infos: Vec<AtlasInfo> = Vec::new();
    let mut diffuse_regions: Option<(u32, u32, HashMap<usize, Region>)> = None;
    let mut rewrites: Vec<(TextureType, String)> = Vec::new();

    for ty in ordered_active {
        let mut unique_srcs = Vec::new();
        let mut seen_src = HashSet::new();
        for &(_, t, src) in &slot_refs {
            if t == ty && seen_src.insert(src) {
                unique_srcs.push(src);
            }
        }

        let max_w = unique_srcs
            .iter()
            .map(|&i| sources[i].pixels.width)
            .max()
            .unwrap_or(1);
        let n = unique_srcs.len() as f64;
        let atlas_w = next_pow2((max_w as f64 * n.sqrt().ceil()) as u32).min(MAX_ATLAS_DIM);

        let mut order = unique_srcs.clone();
        order.sort_by(|&a, &b| sources[b].pixels.height.cmp(&sources[a].pixels.height));

        let mut cur_x = 0u32;
        let mut cur_y = 0u32;
        let mut shelf_h = 0u32;
        let mut regions: HashMap<usize, Region> = HashMap::new();
        for &src_idx in &order {
            let (w, h) = (sources[src_idx].pixels.width, sources[src_idx].pixels.height);
            if cur_x + w > atlas_w {
                cur_y += shelf_h;
                cur_x = 0;
                shelf_h = 0;
            }
            regions.insert(src_idx, (cur_x, cur_y, w, h));
            cur_x += w;
            shelf_h = shelf_h.max(h);
        }
        let atlas_h = next_pow2(cur_y + shelf_h);
        if atlas_h > MAX_ATLAS_DIM {
            return Err(LodError::AtlasBuildFailed(format!(
                "{ty:?} atlas would exceed {MAX_ATLAS_DIM}px ({atlas_w}x{atlas_h})"
            )));
        }

        let mut canvas = PixelBuffer::blank(atlas_w, atlas_h);
        for (&src_idx, &(x, y, _, _)) in &regions {
            canvas.blit(&sources[src_idx].pixels, x, y);
        }

        let encoded = canvas.encode_png()?;
        let suffix = ty.atlas_suffix();
        let filename = format!("atlas_{suffix}.png");
        std::fs::write(opts.output_dir.join(&filename), &encoded)?;

        new_embedded.push(EmbeddedTexture {
            filename: Some(filename.clone()),
            data: EmbeddedTextureData::Compressed { bytes: encoded, format_hint: "png".into() },
        });
        rewrites.push((ty, filename));

        if ty == TextureType::Diffuse && diffuse_regions.is_none() {
            diffuse_regions = Some((atlas_w, atlas_h, regions.clone()));
        }

        info!(texture_type = ?ty, atlas_w, atlas_h, packed = order.len(), "built atlas");
        infos.push(AtlasInfo {
            texture_type: ty,
            atlas_width: atlas_w,
            atlas_height: atlas_h,
            packed_count: order.len(),
        });
    }

    // Rewrite material slot paths + wrap modes for every active type.
    for (ty, filename) in &rewrites {
        for material in &mut scene.materials {
            if let Some(slots) = material.slots_mut(*ty) {
                for slot in slots.iter_mut() {
                    slot.path = filename.clone();
                    slot.wrap_mode_u = WrapMode::Clamp;
                    slot.wrap_mode_v = WrapMode::Clamp;
                }
            }
        }
    }

    // Phase 4: install.
    scene.embedded_textures = new_embedded;

    // Phase 5: UV remap.
    if let Some((atlas_w, atlas_h, regions)) = &diffuse_regions {
        for mesh in &mut scene.meshes {
            if mesh.material_index as usize >= scene.materials.len() {
                continue;
            }
            let Some(src_idx) = mat_to_src(mesh.material_index as usize) else { continue };
            let Some(&(x, y, w, h)) = regions.get(&src_idx) else { continue };
            if w == 0 || h == 0 {
                continue;
            }
            let u0 = x as f32 / *atlas_w as f32;
            let v0 = y as f32 / *atlas_h as f32;
            let us = w as f32 / *atlas_w as f32;
            let vs = h as f32 / *atlas_h as f32;

            for chan in mesh.uv_channels.iter_mut() {
                if let Some(uvs) = chan {
                    for uv in uvs.iter_mut() {
                        uv[0] = u0 + uv[0] * us;
                        uv[1] = v0 + uv[1] * vs;
                    }
                }
            }
        }
    }

    // Phase 6: best-effort external source cleanup.
    for source in &sources {
        if let Some(path) = &source.disk_path {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "failed to clean up packed source texture");
            }
        }
    }

    Ok(infos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_pow2_rounds_up() {
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(2), 2);
        assert_eq!(next_pow2(3), 4);
        assert_eq!(next_pow2(257), 512);
        assert_eq!(next_pow2(1024), 1024);
    }

    #[test]
    fn empty_scene_produces_no_atlases() {
        let mut scene = Scene::default();
        let opts = AtlasOpts { model_dir: "/tmp".into(), output_dir: "/tmp".into() };
        let infos = build_atlas(&mut scene, &opts).unwrap();
        assert!(infos.is_empty());
    }
}
