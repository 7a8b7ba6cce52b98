use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::annotation::FontResolver;
use crate::error::Result;
use crate::image_stack::ImageStack;
use crate::io::{with_default_extension, Loader, Persister, VideoEncoder};

use super::config::PipelineConfig;
use super::types::{PipelineOutput, PipelineStage, ProgressReporter};

/// `<output stem>_montage` next to the stack output.
pub fn montage_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}_montage"))
}

/// Configured video path, or the stack output with an `.mp4` extension.
pub fn video_path(config: &PipelineConfig) -> PathBuf {
    config
        .video
        .as_ref()
        .and_then(|v| v.output.clone())
        .unwrap_or_else(|| config.output.with_extension("mp4"))
}

/// Load `config.input`, apply every configured step in a fixed order, and
/// write the results.
///
/// Steps run as: frame range, background, contrast, crop, scale bar, time
/// stamps. The contrast mapping is computed on one frame and then applied to
/// the whole working stack, so every written output carries it. The stack is then written to `config.output` (the displayed frame
/// when only one frame is left), followed by the optional montage and video.
pub fn run_pipeline(
    config: &PipelineConfig,
    loader: &dyn Loader,
    persister: &dyn Persister,
    fonts: &dyn FontResolver,
    encoder: &dyn VideoEncoder,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<PipelineOutput> {
    reporter.begin_stage(PipelineStage::Reading, None);
    let loaded = loader.load(&config.input)?;
    let name = config.name.clone().unwrap_or_else(|| {
        config
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| crate::image_stack::UNTITLED.to_string())
    });
    let mut stack = ImageStack::new(loaded.into_buffer(), name);
    stack.set_calibration(config.calibration.clone())?;
    info!(
        name = stack.name(),
        frames = stack.n_frames(),
        steps = config.step_count(),
        "Pipeline started"
    );
    reporter.finish_stage();

    if let Some(ref range) = config.frame_range {
        reporter.begin_stage(PipelineStage::FrameRange, None);
        stack.reduced_range(range.first, range.last)?;
        reporter.finish_stage();
    }

    if let Some(ref background) = config.background {
        reporter.begin_stage(PipelineStage::Background, Some(stack.n_frames()));
        stack.background_correction(background)?;
        reporter.finish_stage();
    }

    if let Some(ref contrast) = config.contrast {
        reporter.begin_stage(PipelineStage::Contrast, None);
        if let Some(frame) = contrast.frame {
            stack.set_frame(frame)?;
        }
        stack.contrast_correction(&contrast.params)?;
        stack.commit_contrast()?;
        reporter.finish_stage();
    }

    if let Some(ref crop) = config.crop {
        reporter.begin_stage(PipelineStage::Cropping, None);
        stack.crop(crop.top_left, crop.bottom_right)?;
        reporter.finish_stage();
    }

    if let Some(ref bar) = config.scale_bar {
        reporter.begin_stage(PipelineStage::ScaleBar, None);
        let rasterizer = if bar.params.add_text {
            Some(fonts.resolve(&bar.params.font)?)
        } else {
            None
        };
        stack.scale_bar(&bar.params, bar.frame, rasterizer.as_deref())?;
        reporter.finish_stage();
    }

    if let Some(ref stamps) = config.time_stamps {
        reporter.begin_stage(PipelineStage::TimeStamps, Some(stack.n_frames()));
        let rasterizer = fonts.resolve(&stamps.font)?;
        stack.time_stamps(stamps, rasterizer.as_ref())?;
        reporter.finish_stage();
    }

    let mut written = Vec::new();

    reporter.begin_stage(PipelineStage::Writing, None);
    let path = if stack.n_frames() == 1 {
        stack.save_frame(persister, Some(&config.output), &config.export)?
    } else {
        stack.save_stack(persister, Some(&config.output), &config.export)?
    };
    info!(path = %path.display(), "Output written");
    written.push(path);
    reporter.finish_stage();

    if let Some(ref montage) = config.montage {
        reporter.begin_stage(PipelineStage::Montage, None);
        let target = montage_path(&with_default_extension(&config.output, &config.export.extension));
        let path = stack.save_montage(persister, Some(&target), montage, &config.export)?;
        info!(path = %path.display(), "Montage written");
        written.push(path);
        reporter.finish_stage();
    }

    if let Some(ref video) = config.video {
        reporter.begin_stage(PipelineStage::Video, Some(stack.n_frames()));
        let path = stack.save_video(encoder, Some(&video_path(config)), video.fps, &video.codec)?;
        written.push(path);
        reporter.finish_stage();
    }

    let (frames, height, width) = stack.array().dim();
    Ok(PipelineOutput {
        frames,
        height,
        width,
        element_type: stack.array().element_type(),
        written,
    })
}
