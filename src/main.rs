//! Depth image dataset generation for 6-DoF pose estimation.

use anyhow::Result;
use clap::Parser;
use pose_datagen::{DatasetGenerator, GenConfig, SimParams, SyntheticEngine};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pose-datagen",
    about = "Depth image dataset generation for 6-DoF pose estimation"
)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "cfg/config.yaml")]
    config: PathBuf,

    /// Save results to disk
    #[arg(long)]
    save_results: bool,

    /// Open an interactive viewer (headless otherwise)
    #[arg(long)]
    viewer: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = GenConfig::load(&args.config)?;

    // The analytic backend stands in for a real physics/rendering engine;
    // production deployments provide their own SimEngine implementation.
    let engine = SyntheticEngine::new(SimParams::from_config(&config.simulation));

    let mut generator = DatasetGenerator::new(engine, config, args.save_results, args.viewer)?;
    generator.run()?;
    Ok(())
}
