use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use microstack_core::annotation::{FontDirectoryResolver, TextPosition, TimeStampParams};
use microstack_core::buffer::Calibration;
use microstack_core::correction::{AverageMethod, BackgroundParams, ContrastParams, CorrectionMethod};
use microstack_core::export::{BitDepth, ExportOptions};
use microstack_core::io::{FfmpegEncoder, ImageLoader, ImagePersister};
use microstack_core::montage::MontageParams;
use microstack_core::pipeline::config::{
    ContrastConfig, CropConfig, FontConfig, FrameRangeConfig, PipelineConfig, ScaleBarConfig, VideoConfig,
};
use microstack_core::pipeline::{run_pipeline, PipelineStage, ProgressReporter};

use crate::summary::print_pipeline_summary;

#[derive(Args)]
pub struct RunArgs {
    /// Input image, SER file, or folder of images
    pub file: PathBuf,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// First frame to keep
    #[arg(long)]
    pub first: Option<usize>,

    /// Frame after the last one to keep
    #[arg(long)]
    pub last: Option<usize>,

    /// Background reference average (mean or median)
    #[arg(long)]
    pub background: Option<AverageMethod>,

    /// Background correction (subtraction or division)
    #[arg(long, default_value = "division")]
    pub correction: CorrectionMethod,

    /// Samples are signed values stored as unsigned
    #[arg(long)]
    pub signed_bits: bool,

    /// Percentile clipped at each end for contrast correction
    #[arg(long)]
    pub contrast: Option<f64>,

    /// Crop rectangle as x0,y0,x1,y1
    #[arg(long, value_parser = parse_crop)]
    pub crop: Option<CropConfig>,

    /// Add a scale bar of this length, in space units
    #[arg(long)]
    pub scale_bar: Option<f64>,

    /// Space unit for the scale bar
    #[arg(long, default_value = "px")]
    pub space_unit: String,

    /// Space units per pixel
    #[arg(long, default_value = "1.0")]
    pub space_scale: f64,

    /// Add time stamps to every frame
    #[arg(long)]
    pub time_stamps: bool,

    /// Time unit for the time stamps
    #[arg(long, default_value = "frame")]
    pub time_unit: String,

    /// Time units per frame
    #[arg(long, default_value = "1.0")]
    pub time_scale: f64,

    /// Time stamp position (top or bottom)
    #[arg(long, default_value = "top")]
    pub position: TextPosition,

    /// Font used for annotations
    #[arg(long, default_value = "Arial.ttf")]
    pub font: String,

    /// Extra directory to search for fonts (repeatable)
    #[arg(long)]
    pub font_dir: Vec<PathBuf>,

    /// Also save a montage of every frame
    #[arg(long)]
    pub montage: bool,

    /// Also encode an mp4 video at this frame rate
    #[arg(long)]
    pub video_fps: Option<u32>,

    /// Output bit depth (8 or 16)
    #[arg(long, default_value = "16")]
    pub bit_depth: u32,

    /// Keep the stored value range instead of stretching it
    #[arg(long)]
    pub no_rescale: bool,

    /// Output file path (.tif/.gif/.ser for stacks, .tif/.png/.bmp/.jpg for frames)
    #[arg(short, long, default_value = "result.ser")]
    pub output: PathBuf,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        let mut config: PipelineConfig = toml::from_str(&contents).context("Invalid pipeline config")?;
        config.input = args.file.clone();
        config
    } else {
        build_config_from_args(args)?
    };

    print_pipeline_summary(&config);

    let resolver = FontDirectoryResolver::with_system_dirs(config.fonts.directories.clone());
    let reporter = Arc::new(BarReporter::new(config.step_count() + 2)?);
    let output = run_pipeline(
        &config,
        &ImageLoader,
        &ImagePersister,
        &resolver,
        &FfmpegEncoder::default(),
        reporter.clone(),
    )
    .with_context(|| format!("Pipeline failed for {}", config.input.display()))?;

    reporter.bar.finish_with_message("Done");
    println!();
    println!(
        "Processed {} frame(s) of {}x{} ({})",
        output.frames, output.width, output.height, output.element_type
    );
    for path in &output.written {
        println!("Output saved to {}", path.display());
    }

    Ok(())
}

fn build_config_from_args(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::new(&args.file, &args.output);
    config.calibration = Calibration {
        space_unit: args.space_unit.clone(),
        space_scale: args.space_scale,
        time_unit: args.time_unit.clone(),
        time_scale: args.time_scale,
    };
    config.fonts = FontConfig {
        directories: args.font_dir.clone(),
    };

    if args.first.is_some() || args.last.is_some() {
        config.frame_range = Some(FrameRangeConfig {
            first: args.first.unwrap_or(0),
            last: args.last,
        });
    }

    config.background = args.background.map(|average| BackgroundParams {
        signed_bits: args.signed_bits,
        average,
        correction: args.correction,
        ..Default::default()
    });

    config.contrast = args.contrast.map(|percentile| ContrastConfig {
        frame: None,
        params: ContrastParams {
            percentile,
            ..Default::default()
        },
    });

    config.crop = args.crop.clone();

    config.scale_bar = args.scale_bar.map(|scale_length| {
        let mut bar = ScaleBarConfig::default();
        bar.params.scale_length = scale_length;
        bar.params.font = args.font.clone();
        bar
    });

    if args.time_stamps {
        config.time_stamps = Some(TimeStampParams {
            font: args.font.clone(),
            position: args.position,
            ..Default::default()
        });
    }

    if args.montage {
        config.montage = Some(MontageParams::default());
    }

    config.video = args.video_fps.map(|fps| VideoConfig {
        fps,
        ..Default::default()
    });

    config.export = ExportOptions {
        bit_depth: BitDepth::try_from(args.bit_depth)?,
        rescale: !args.no_rescale,
        ..Default::default()
    };

    Ok(config)
}

fn parse_crop(s: &str) -> std::result::Result<CropConfig, String> {
    let values: Vec<i64> = s
        .split(',')
        .map(|v| v.trim().parse::<i64>().map_err(|e| format!("'{v}': {e}")))
        .collect::<std::result::Result<_, _>>()?;
    match values.as_slice() {
        [x0, y0, x1, y1] => Ok(CropConfig {
            top_left: (*x0, *y0),
            bottom_right: Some((*x1, *y1)),
        }),
        [x0, y0] => Ok(CropConfig {
            top_left: (*x0, *y0),
            bottom_right: None,
        }),
        _ => Err("expected x0,y0 or x0,y0,x1,y1".into()),
    }
}

/// Drives one progress bar across the pipeline stages.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new(stages: usize) -> Result<Self> {
        let bar = ProgressBar::new(stages as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:20} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: PipelineStage, _total_items: Option<usize>) {
        self.bar.set_message(stage.to_string());
    }

    fn finish_stage(&self) {
        self.bar.inc(1);
    }
}
