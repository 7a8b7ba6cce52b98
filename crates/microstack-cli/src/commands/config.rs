use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use microstack_core::annotation::TimeStampParams;
use microstack_core::correction::BackgroundParams;
use microstack_core::montage::MontageParams;
use microstack_core::pipeline::config::{ContrastConfig, PipelineConfig, ScaleBarConfig};

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a default PipelineConfig with every step enabled, as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let config = PipelineConfig {
        background: Some(BackgroundParams::default()),
        contrast: Some(ContrastConfig::default()),
        scale_bar: Some(ScaleBarConfig::default()),
        time_stamps: Some(TimeStampParams::default()),
        montage: Some(MontageParams::default()),
        ..PipelineConfig::new("input.tif", "result.ser")
    };
    let toml_str = toml::to_string_pretty(&config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
