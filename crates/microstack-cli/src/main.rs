mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "microstack", about = "Microscopy image stack processing tool")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show image or stack metadata
    Info(commands::info::InfoArgs),
    /// Run the full processing pipeline
    Run(commands::pipeline::RunArgs),
    /// Tile frames of a sequence into one image
    Montage(commands::montage::MontageArgs),
    /// Print or save a default pipeline config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Run(args) => commands::pipeline::run(args),
        Commands::Montage(args) => commands::montage::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
