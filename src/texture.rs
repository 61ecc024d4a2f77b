//! Retargets embedded and external textures for one LOD ratio (§4.2).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{LodError, Result};
use crate::pixel::PixelBuffer;
use crate::scene::types::{resolve_embedded_ref, EmbeddedTextureData, Scene, TextureType};

#[derive(Debug, Clone, Default)]
pub struct TextureStats {
    pub input_count: usize,
    pub output_count: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

#[derive(Debug, Clone)]
pub struct TextureProcessorOpts {
    pub model_dir: PathBuf,
    pub output_dir: PathBuf,
    pub resize: bool,
}

fn resized_dims(w: u32, h: u32, ratio: f32) -> (u32, u32) {
    (
        ((w as f32 * ratio).floor() as u32).max(1),
        ((h as f32 * ratio).floor() as u32).max(1),
    )
}

fn normalize_key(path: &str) -> String {
    path.to_ascii_lowercase().replace('\\', "/")
}

pub fn process_textures(
    scene: &mut Scene,
    ratio: f32,
    opts: &TextureProcessorOpts,
) -> Result<TextureStats> {
    let mut stats = TextureStats::default();

    process_embedded(scene, ratio, &mut stats)?;
    if !opts.output_dir.as_os_str().is_empty() {
        process_external(scene, ratio, opts, &mut stats)?;
    }

    info!(
        input_count = stats.input_count,
        output_count = stats.output_count,
        bytes_in = stats.bytes_in,
        bytes_out = stats.bytes_out,
        "processed textures for ratio {ratio}"
    );
    Ok(stats)
}

fn process_embedded(scene: &mut Scene, ratio: f32, stats: &mut TextureStats) -> Result<()> {
    for (index, tex) in scene.embedded_textures.iter_mut().enumerate() {
        let (decoded, hint) = match &tex.data {
            EmbeddedTextureData::Compressed { bytes, format_hint } => {
                stats.bytes_in += bytes.len() as u64;
                (PixelBuffer::decode(bytes)?, format_hint.clone())
            }
            EmbeddedTextureData::Uncompressed { width, height, pixels } => {
                stats.bytes_in += pixels.len() as u64;
                (PixelBuffer::new(*width, *height, pixels.clone()), String::new())
            }
        };
        stats.input_count += 1;

        let (new_w, new_h) = resized_dims(decoded.width, decoded.height, ratio);
        let resized = decoded.resize(new_w, new_h)?;

        let is_jpeg = matches!(hint.to_ascii_lowercase().as_str(), "jpg" | "jpeg");
        let (encoded, used_hint) = if is_jpeg {
            (resized.encode_jpeg()?, "jpg".to_string())
        } else {
            (resized.encode_png()?, "png".to_string())
        };
        stats.bytes_out += encoded.len() as u64;
        stats.output_count += 1;

        if tex.filename.is_none() {
            tex.filename = Some(format!("texture_{index}.{used_hint}"));
        }
        tex.data = EmbeddedTextureData::Compressed { bytes: encoded, format_hint: used_hint };
    }
    Ok(())
}

fn process_external(
    scene: &mut Scene,
    ratio: f32,
    opts: &TextureProcessorOpts,
    stats: &mut TextureStats,
) -> Result<()> {
    let mut dedup: HashMap<PathBuf, String> = HashMap::new();
    let mut used_basenames: HashMap<String, u32> = HashMap::new();
    let embedded_count = scene.embedded_textures.len();

    for material in &mut scene.materials {
        for ty in TextureType::CANONICAL_ORDER {
            let Some(slots) = material.slots_mut(ty) else { continue };
            for slot in slots.iter_mut() {
                if resolve_embedded_ref(&slot.path, embedded_count).is_some() {
                    continue;
                }

                let key = normalize_key(&slot.path);
                let full_path = opts.model_dir.join(&key);
                let canonical = full_path.canonicalize().unwrap_or(full_path.clone());

                if let Some(out_name) = dedup.get(&canonical) {
                    slot.path = out_name.clone();
                    continue;
                }

                let bytes = std::fs::read(&canonical)
                    .map_err(|e| LodError::TextureLoadFailed(format!("{}: {e}", canonical.display())))?;
                stats.bytes_in += bytes.len() as u64;

                let decoded = PixelBuffer::decode(&bytes)?;
                stats.input_count += 1;

                let resized = if opts.resize {
                    let (w, h) = resized_dims(decoded.width, decoded.height, ratio);
                    decoded.resize(w, h)?
                } else {
                    decoded
                };

                let out_name = dedup_basename(&canonical, &mut used_basenames);
                let encoded = resized.encode_for_path(Path::new(&out_name))?;
                stats.bytes_out += encoded.len() as u64;
                stats.output_count += 1;

                std::fs::write(opts.output_dir.join(&out_name), &encoded)?;

                dedup.insert(canonical, out_name.clone());
                slot.path = out_name;
            }
        }
    }
    Ok(())
}

/// Disambiguates colliding output basenames by appending `_2`, `_3`, ... to
/// the stem the second (third, ...) time a distinct source resolves to it.
fn dedup_basename(path: &Path, used: &mut HashMap<String, u32>) -> String {
    let base = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("texture")
        .to_string();
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("texture");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("png");

    let count = used.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base
    } else {
        let disambiguated = format!("{stem}_{count}.{ext}");
        warn!(original = %base, disambiguated = %disambiguated, "basename collision on texture dedup");
        disambiguated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::types::{EmbeddedTexture, Material, TextureSlot, WrapMode};

    fn one_px_embedded() -> EmbeddedTexture {
        EmbeddedTexture {
            filename: None,
            data: EmbeddedTextureData::Uncompressed { width: 1, height: 1, pixels: vec![0; 4] },
        }
    }

    fn material_with_slot(path: &str) -> Material {
        let mut material = Material::default();
        material.textures.insert(
            TextureType::Diffuse,
            vec![TextureSlot {
                path: path.to_string(),
                wrap_mode_u: WrapMode::Wrap,
                wrap_mode_v: WrapMode::Wrap,
            }],
        );
        material
    }

    #[test]
    fn out_of_range_embedded_ref_falls_through_to_external_handling() {
        let mut scene = Scene {
            embedded_textures: vec![one_px_embedded(), one_px_embedded()],
            materials: vec![material_with_slot("*999")],
            ..Default::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let opts = TextureProcessorOpts {
            model_dir: dir.path().to_path_buf(),
            output_dir: dir.path().to_path_buf(),
            resize: false,
        };
        let mut stats = TextureStats::default();
        let err = process_external(&mut scene, 1.0, &opts, &mut stats).unwrap_err();
        assert!(matches!(err, LodError::TextureLoadFailed(_)));
    }

    #[test]
    fn in_range_embedded_ref_is_skipped() {
        let mut scene = Scene {
            embedded_textures: vec![one_px_embedded()],
            materials: vec![material_with_slot("*0")],
            ..Default::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let opts = TextureProcessorOpts {
            model_dir: dir.path().to_path_buf(),
            output_dir: dir.path().to_path_buf(),
            resize: false,
        };
        let mut stats = TextureStats::default();
        process_external(&mut scene, 1.0, &opts, &mut stats).unwrap();
        assert_eq!(stats.input_count, 0);
    }

    #[test]
    fn resized_dims_never_zero() {
        assert_eq!(resized_dims(1, 1, 0.1), (1, 1));
        assert_eq!(resized_dims(256, 256, 0.5), (128, 128));
    }

    #[test]
    fn normalize_key_lowercases_and_flips_slashes() {
        assert_eq!(normalize_key("Textures\\Wood.PNG"), "textures/wood.png");
    }

    #[test]
    fn dedup_basename_disambiguates_collisions() {
        let mut used = HashMap::new();
        let a = dedup_basename(Path::new("a/brick.png"), &mut used);
        let b = dedup_basename(Path::new("b/brick.png"), &mut used);
        assert_eq!(a, "brick.png");
        assert_eq!(b, "brick_2.png");
    }
}
