//! rw4-export - RW4 interchange tool
//!
//! Unpacks RW4 models to Ogre mesh/skeleton XML and RW4 textures to DDS,
//! and packs them back.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use rw4_common::Model;
use rw4_export::inspect::{self, Verification};
use rw4_export::{Config, batch, pack, unpack};

#[derive(Parser)]
#[command(name = "rw4-export")]
#[command(about = "RW4 model and texture interchange tool")]
#[command(version)]
struct Cli {
    /// Configuration file (default: rw4-export.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack a model or texture RW4
    Unpack {
        /// Input .rw4 file
        input: PathBuf,

        /// Output directory (default: input path without extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Pack an Ogre mesh XML into a model RW4
    PackMesh {
        /// Input .mesh.xml file
        input: PathBuf,

        /// Existing model RW4 supplying the vertex format and material data
        #[arg(short, long)]
        template: PathBuf,

        /// Output .rw4 file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Pack a DXT5 DDS into a texture RW4
    PackTexture {
        /// Input .dds file
        input: PathBuf,

        /// Output .rw4 file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the sections of an RW4 file
    Info {
        /// Input .rw4 file
        input: PathBuf,
    },

    /// Check that an RW4 file is written back byte for byte
    Verify {
        /// Input .rw4 file
        input: PathBuf,
    },

    /// Unpack every matching file under a directory
    Batch {
        /// Directory to walk
        #[arg(default_value = ".")]
        root: PathBuf,
    },
}

fn read_input(input: &Path) -> Result<Vec<u8>> {
    std::fs::read(input).with_context(|| format!("Failed to read {:?}", input))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Unpack { input, output } => {
            let output = output.unwrap_or_else(|| input.with_extension(""));
            tracing::info!("Converting {:?} -> {:?}", input, output);
            let names = config.name_registry()?;
            let report = unpack::unpack_file(&input, &output, &config, &names)?;
            for file in &report.files {
                tracing::info!("  {:?}", file);
            }
            if !report.animations.is_empty() {
                tracing::info!("Animations: {}", report.animations.join(", "));
            }
            tracing::info!("Done!");
        }

        Commands::PackMesh {
            input,
            template,
            output,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("rw4"));
            tracing::info!("Converting {:?} -> {:?}", input, output);
            pack::pack_mesh(&input, &template, &output)?;
            tracing::info!("Done!");
        }

        Commands::PackTexture { input, output } => {
            let output = output.unwrap_or_else(|| input.with_extension("rw4"));
            tracing::info!("Converting {:?} -> {:?}", input, output);
            pack::pack_texture(&input, &output)?;
            tracing::info!("Done!");
        }

        Commands::Info { input } => {
            let data = read_input(&input)?;
            let model = Model::read_with(&data, config.read.options())
                .with_context(|| format!("Failed to parse RW4: {:?}", input))?;
            println!("{:?}: {:?}, {} sections", input, model.file_type(), model.len());
            for line in inspect::section_listing(&model) {
                println!("{line}");
            }
        }

        Commands::Verify { input } => {
            let data = read_input(&input)?;
            let verified = inspect::verify(&data, config.read.options())
                .with_context(|| format!("Failed to re-encode {:?}", input))?;
            match verified {
                Verification::Identical => println!("{:?}: identical", input),
                Verification::Differs {
                    offset,
                    original,
                    written,
                } => anyhow::bail!(
                    "{:?}: differs at 0x{:x} ({} bytes read, {} written)",
                    input,
                    offset,
                    original,
                    written
                ),
            }
        }

        Commands::Batch { root } => {
            tracing::info!("Unpacking {:?} files under {:?}", config.batch.file_name, root);
            let names = config.name_registry()?;
            let report = batch::run_batch(&root, &config, &names);
            println!("{}", report.summary());
        }
    }

    Ok(())
}
