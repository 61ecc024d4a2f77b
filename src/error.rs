//! Error kinds shared across the LOD pipeline.

use std::path::PathBuf;

/// Discriminated failure kinds for every fallible core operation.
///
/// The simplifier never produces one of these: degenerate mesh inputs are
/// handled by returning the mesh unchanged, not by erroring.
#[derive(Debug, thiserror::Error)]
pub enum LodError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to import scene: {0}")]
    ImportFailed(String),

    #[error("failed to export scene: {0}")]
    ExportFailed(String),

    #[error("failed to clone scene: {0}")]
    SceneCopyFailed(String),

    #[error("failed to decode texture: {0}")]
    TextureDecodeFailed(String),

    #[error("failed to resize texture: {0}")]
    TextureResizeFailed(String),

    #[error("failed to encode texture: {0}")]
    TextureEncodeFailed(String),

    #[error("failed to load texture from disk: {0}")]
    TextureLoadFailed(String),

    #[error("atlas build failed: {0}")]
    AtlasBuildFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LodError>;
