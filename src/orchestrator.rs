//! Drives per-ratio LOD generation and the (optional) follow-up atlas build
//! (§4.4).

use std::path::{Path, PathBuf};

use tracing::info;

use crate::atlas::{self, AtlasInfo, AtlasOpts};
use crate::error::Result;
use crate::scene::io;
use crate::scene::types::Scene;
use crate::simplify::{self, SimplifyResult};
use crate::texture::{self, TextureProcessorOpts, TextureStats};

#[derive(Debug, Clone)]
pub struct GenerateLodsOpts {
    pub ratios: Vec<f32>,
    pub resize_textures: bool,
    pub build_atlas: bool,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LodInfo {
    pub ratio: f32,
    pub out_path: PathBuf,
    pub mesh_results: Vec<SimplifyResult>,
    pub texture_stats: Option<TextureStats>,
}

/// Generates one output directory per ratio in `opts.ratios`, leaving the
/// caller's `scene` untouched (P10).
pub fn generate_lods(scene: &Scene, input_path: &Path, opts: &GenerateLodsOpts) -> Result<Vec<LodInfo>> {
    let model_dir = input_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = input_path.file_stem().and_then(|s| s.to_str()).unwrap_or("model");
    let ext = input_path.extension().and_then(|e| e.to_str()).unwrap_or("gltf");

    let mut results = Vec::with_capacity(opts.ratios.len());

    for (i, &ratio) in opts.ratios.iter().enumerate() {
        let lod_num = i + 1;
        info!(ratio, lod = lod_num, total = opts.ratios.len(), "starting LOD iteration");

        let lod_dir = opts.output_dir.join(format!("lod{lod_num}"));
        std::fs::create_dir_all(&lod_dir)?;
        let out_path = lod_dir.join(format!("{stem}_lod{lod_num}.{ext}"));

        let mut lod_scene = io::deep_clone_scene(scene)?;

        let mesh_results: Vec<SimplifyResult> = lod_scene
            .meshes
            .iter_mut()
            .map(|mesh| simplify::simplify(mesh, ratio))
            .collect();

        let texture_stats = if opts.resize_textures {
            let tex_opts = TextureProcessorOpts {
                model_dir: model_dir.to_path_buf(),
                output_dir: lod_dir.clone(),
                resize: opts.resize_textures,
            };
            Some(texture::process_textures(&mut lod_scene, ratio, &tex_opts)?)
        } else {
            None
        };

        io::save_scene(&lod_scene, &out_path)?;

        info!(ratio, lod = lod_num, out_path = %out_path.display(), "finished LOD iteration");
        results.push(LodInfo { ratio, out_path, mesh_results, texture_stats });
    }

    Ok(results)
}

/// Reopens a persisted LOD file, runs the atlas packer on it, and
/// re-persists it in place.
pub fn build_lod_atlas(model_path: &Path) -> Result<Vec<AtlasInfo>> {
    let model_dir = model_path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let mut scene = io::load_scene(model_path)?;

    let opts = AtlasOpts { model_dir: model_dir.clone(), output_dir: model_dir };
    let infos = atlas::build_atlas(&mut scene, &opts)?;

    io::save_scene(&scene, model_path)?;
    Ok(infos)
}
