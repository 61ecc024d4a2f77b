//! lodgen - Generates LOD variants of a 3D scene with resized and repacked
//! textures.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lodgen::config::LodManifest;
use lodgen::orchestrator::{self, GenerateLodsOpts};
use lodgen::scene::io as scene_io;

#[derive(Parser)]
#[command(name = "lodgen")]
#[command(about = "Generates LOD variants of a 3D scene with resized and repacked textures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one or more LOD variants of a scene file
    Generate {
        /// Input scene file (any format the scene library supports). Falls
        /// back to the manifest's `input` field when omitted.
        input: Option<PathBuf>,

        /// Output directory; `lod1/`, `lod2/`, ... are created beneath it
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target triangle ratios, e.g. `-r 0.5 -r 0.25`
        #[arg(short, long = "ratio")]
        ratios: Vec<f32>,

        /// Resize and repack textures alongside each LOD
        #[arg(long)]
        resize_textures: bool,

        /// Build a per-type texture atlas for each LOD after it is written
        #[arg(long)]
        build_atlas: bool,

        /// Load options from a lodgen.toml manifest; flags above override it
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Build a per-type texture atlas for an already-exported LOD file
    Atlas {
        /// Path to a previously exported LOD scene file
        input: PathBuf,
    },

    /// List the scene formats this build can import and export
    Formats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            output,
            ratios,
            resize_textures,
            build_atlas,
            manifest,
            verbose,
        } => {
            let manifest = manifest
                .map(|path| {
                    LodManifest::load(&path)
                        .with_context(|| format!("failed to load manifest {:?}", path))
                })
                .transpose()?;

            let mut opts = match &manifest {
                Some(m) => m.to_opts(),
                None => GenerateLodsOpts {
                    ratios: vec![],
                    resize_textures: false,
                    build_atlas: false,
                    output_dir: PathBuf::new(),
                },
            };
            if !ratios.is_empty() {
                opts.ratios = ratios;
            }
            if resize_textures {
                opts.resize_textures = true;
            }
            if build_atlas {
                opts.build_atlas = true;
            }
            if let Some(output) = output {
                opts.output_dir = output;
            }
            anyhow::ensure!(!opts.ratios.is_empty(), "at least one --ratio is required");

            let input = input
                .or_else(|| manifest.as_ref().map(|m| m.input.clone()))
                .context("an input scene path is required (positionally or via --manifest)")?;
            if opts.output_dir.as_os_str().is_empty() {
                opts.output_dir = input.with_extension("");
            }

            if verbose {
                tracing::info!(input = %input.display(), "loading source scene");
            }

            let scene = scene_io::load_scene(&input)
                .with_context(|| format!("failed to import scene {:?}", input))?;

            let lods = orchestrator::generate_lods(&scene, &input, &opts)
                .context("failed to generate LODs")?;

            for lod in &lods {
                let tris: usize = lod.mesh_results.iter().map(|r| r.simplified_tris).sum();
                tracing::info!(
                    ratio = lod.ratio,
                    out_path = %lod.out_path.display(),
                    total_simplified_tris = tris,
                    "wrote LOD"
                );

                if opts.build_atlas {
                    let atlases = orchestrator::build_lod_atlas(&lod.out_path).with_context(|| {
                        format!("failed to build atlas for {:?}", lod.out_path)
                    })?;
                    for atlas in &atlases {
                        tracing::info!(
                            texture_type = ?atlas.texture_type,
                            width = atlas.atlas_width,
                            height = atlas.atlas_height,
                            packed = atlas.packed_count,
                            "built atlas"
                        );
                    }
                }
            }

            tracing::info!("Build complete!");
        }

        Commands::Atlas { input } => {
            tracing::info!(input = %input.display(), "building atlas for existing LOD");
            let atlases = orchestrator::build_lod_atlas(&input)
                .with_context(|| format!("failed to build atlas for {:?}", input))?;
            for atlas in &atlases {
                tracing::info!(
                    texture_type = ?atlas.texture_type,
                    width = atlas.atlas_width,
                    height = atlas.atlas_height,
                    packed = atlas.packed_count,
                    "built atlas"
                );
            }
            tracing::info!("Done!");
        }

        Commands::Formats => {
            for fmt in scene_io::supported_formats() {
                println!("{fmt}");
            }
        }
    }

    Ok(())
}
