//! obj-uniquify - per-object materials and vertex merging for OBJ scenes
//!
//! Rewrites every `usemtl` so each object gets its own material block, then
//! merges duplicate vertices per mesh and exports OBJ + MTL.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use obj_uniquify::{Mode, NamingStrategy, PipelineConfig};

#[derive(Parser)]
#[command(name = "obj-uniquify")]
#[command(about = "Give every OBJ object its own material and merge duplicate vertices")]
#[command(version)]
struct Cli {
    /// Path to the input OBJ file
    #[arg(long = "input_obj")]
    input_obj: PathBuf,

    /// Path to save the output OBJ file
    #[arg(long = "output_obj")]
    output_obj: PathBuf,

    /// Pipeline config (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Decimal digits used when merging vertices (default: 5, 4 with --inspect)
    #[arg(long)]
    precision: Option<u32>,

    /// Where to write the rewritten scene (default: temporary directory)
    #[arg(long)]
    intermediate: Option<PathBuf>,

    /// Material naming strategy
    #[arg(long, value_enum)]
    naming: Option<NamingStrategy>,

    /// Log connected components of every merged mesh
    #[arg(long)]
    inspect: bool,

    /// Process meshes in parallel
    #[arg(long)]
    parallel: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(precision) = self.precision {
            config.vertex_merge_precision = Some(precision);
        }
        if let Some(path) = &self.intermediate {
            config.intermediate_path = Some(path.clone());
        }
        if let Some(naming) = self.naming {
            config.naming = naming;
        }
        if self.inspect {
            config.mode = Mode::Inspect;
        }
        config.parallel |= self.parallel;

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    println!("Input OBJ: {}", cli.input_obj.display());
    println!("Output OBJ: {}", cli.output_obj.display());

    let config = cli.pipeline_config()?;
    let report = obj_uniquify::run(&cli.input_obj, &cli.output_obj, &config)?;

    tracing::info!(
        "Done! {} meshes, {} materials",
        report.consolidate.export.mesh_count,
        report.consolidate.export.material_count
    );
    Ok(())
}
