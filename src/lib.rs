//! Generates reduced-triangle-count, reduced-texture-resolution LOD variants
//! of a 3D scene.
//!
//! The public surface mirrors the pipeline described in the component
//! design: [`scene::io`] loads/saves via the scene I/O collaborator,
//! [`simplify`] reduces a single mesh, [`texture`] retargets material
//! textures for one ratio, [`atlas`] packs per-type atlases, and
//! [`orchestrator`] drives all of the above across a ratio list.

pub mod atlas;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pixel;
pub mod scene;
pub mod simplify;
pub mod texture;

pub use error::{LodError, Result};
pub use orchestrator::{build_lod_atlas, generate_lods, GenerateLodsOpts, LodInfo};
