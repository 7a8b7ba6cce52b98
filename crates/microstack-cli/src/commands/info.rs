use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use microstack_core::io::ser::SerReader;
use microstack_core::io::{extension_of, ImageLoader, Loaded, Loader};

#[derive(Args)]
pub struct InfoArgs {
    /// Input image, SER file, or folder of images
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let loaded = ImageLoader
        .load(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    let kind = match loaded {
        Loaded::SingleFrame(_) => "single frame",
        Loaded::MultiFrame(_) => "sequence",
    };
    let buffer = loaded.buffer();
    let (frames, height, width) = buffer.dim();
    let (min, max) = buffer.sample_range();

    println!("File:        {}", args.file.display());
    println!("Kind:        {}", kind);
    println!("Frames:      {}", frames);
    println!("Dimensions:  {}x{}", width, height);
    println!("Data type:   {}", buffer.element_type());
    println!("Range:       {} .. {}", min, max);

    if extension_of(&args.file).as_deref() == Some("ser") {
        let reader = SerReader::open(&args.file)?;
        println!("Bit depth:   {}", reader.header.pixel_depth);
        if !reader.header.observer.is_empty() {
            println!("Observer:    {}", reader.header.observer);
        }
        if !reader.header.telescope.is_empty() {
            println!("Telescope:   {}", reader.header.telescope);
        }
        if !reader.header.instrument.is_empty() {
            println!("Instrument:  {}", reader.header.instrument);
        }
        let frame_bytes = reader.header.frame_byte_size().unwrap_or(0);
        let total_mb = (frame_bytes * frames) as f64 / (1024.0 * 1024.0);
        println!("Data size:   {:.1} MB", total_mb);
    }

    Ok(())
}
