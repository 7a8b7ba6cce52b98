use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use microstack_core::export::{BitDepth, ExportOptions};
use microstack_core::image_stack::ImageStack;
use microstack_core::io::{ImageLoader, ImagePersister, Loader};
use microstack_core::montage::{FrameSelection, MontageParams};

#[derive(Args)]
pub struct MontageArgs {
    /// Input sequence (SER, GIF, or folder of images)
    pub file: PathBuf,

    /// Use every n-th frame
    #[arg(long, default_value = "1", conflicts_with = "frames")]
    pub step: usize,

    /// Comma-separated frame indices, in placement order
    #[arg(long, value_delimiter = ',')]
    pub frames: Option<Vec<usize>>,

    /// Number of columns
    #[arg(long)]
    pub column: Option<usize>,

    /// Number of rows
    #[arg(long)]
    pub row: Option<usize>,

    /// Gap between frames in pixels
    #[arg(long, default_value = "0")]
    pub margin: usize,

    /// Fill gaps with white instead of black
    #[arg(long)]
    pub white_margin: bool,

    /// Output bit depth (8 or 16)
    #[arg(long, default_value = "16")]
    pub bit_depth: u32,

    /// Output file path
    #[arg(short, long, default_value = "montage.tif")]
    pub output: PathBuf,
}

pub fn run(args: &MontageArgs) -> Result<()> {
    let loaded = ImageLoader
        .load(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stack = ImageStack::new(loaded.into_buffer(), name);

    let params = MontageParams {
        frames: match args.frames {
            Some(ref indices) => FrameSelection::Indices(indices.clone()),
            None => FrameSelection::Step(args.step),
        },
        column: args.column,
        row: args.row,
        margin: args.margin,
        white_margin: args.white_margin,
    };
    let options = ExportOptions {
        bit_depth: BitDepth::try_from(args.bit_depth)?,
        ..Default::default()
    };

    let path = stack
        .save_montage(&ImagePersister, Some(&args.output), &params, &options)
        .context("Montage failed")?;
    println!("Montage saved to {}", path.display());

    Ok(())
}
