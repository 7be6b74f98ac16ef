use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use camtrap_tables::pipeline::{run, RunConfig};

/// Generate the standard analysis report tables from a camera-trap
/// survey bundle.
#[derive(Parser)]
#[command(name = "camtrap-tables", version)]
struct Cli {
    /// Bundle directory with the cameras, deployments, images and
    /// projects tables
    bundle_path: PathBuf,

    /// Directory the report artifacts are written to (created if absent)
    output_path: PathBuf,

    /// Split reports by survey season extracted from deployment identifiers
    #[arg(short = 's', long)]
    seasons: bool,

    /// Auxiliary data folder enabling taxonomic and geographic enrichment
    #[arg(short = 'd', long = "data-folder")]
    data_folder: Option<PathBuf>,

    /// Suppress progress output
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if !cli.bundle_path.is_dir() {
        bail!("bundle path {} does not exist", cli.bundle_path.display());
    }
    if let Some(folder) = &cli.data_folder {
        if !folder.is_dir() {
            bail!("data folder {} does not exist", folder.display());
        }
    }

    run(&RunConfig {
        bundle_path: cli.bundle_path,
        output_path: cli.output_path,
        seasons: cli.seasons,
        data_folder: cli.data_folder,
    })?;
    Ok(())
}
