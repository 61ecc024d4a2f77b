//! `lodgen.toml` manifest support, mirroring the teacher's
//! `NetherManifest::load` pattern: a thin serde struct read from disk and
//! converted into the same options struct the CLI builds from flags.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{LodError, Result};
use crate::orchestrator::GenerateLodsOpts;

#[derive(Debug, Clone, Deserialize)]
pub struct LodManifest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub ratios: Vec<f32>,
    #[serde(default)]
    pub resize_textures: bool,
    #[serde(default)]
    pub build_atlas: bool,
}

impl LodManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| LodError::UnsupportedFormat(format!("malformed manifest: {e}")))
    }

    pub fn to_opts(&self) -> GenerateLodsOpts {
        GenerateLodsOpts {
            ratios: self.ratios.clone(),
            resize_textures: self.resize_textures,
            build_atlas: self.build_atlas,
            output_dir: self.output_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_manifest() {
        let toml_src = r#"
            input = "model.gltf"
            output_dir = "out"
            ratios = [0.5, 0.25]
            resize_textures = true
        "#;
        let manifest: LodManifest = toml::from_str(toml_src).unwrap();
        assert_eq!(manifest.ratios, vec![0.5, 0.25]);
        assert!(manifest.resize_textures);
        assert!(!manifest.build_atlas);
    }

    #[test]
    fn cli_and_manifest_opts_compare_equal() {
        let manifest = LodManifest {
            input: "model.gltf".into(),
            output_dir: "out".into(),
            ratios: vec![0.5],
            resize_textures: true,
            build_atlas: false,
        };
        let from_manifest = manifest.to_opts();
        let from_flags = GenerateLodsOpts {
            ratios: vec![0.5],
            resize_textures: true,
            build_atlas: false,
            output_dir: "out".into(),
        };
        assert_eq!(from_manifest.ratios, from_flags.ratios);
        assert_eq!(from_manifest.resize_textures, from_flags.resize_textures);
        assert_eq!(from_manifest.build_atlas, from_flags.build_atlas);
        assert_eq!(from_manifest.output_dir, from_flags.output_dir);
    }
}
