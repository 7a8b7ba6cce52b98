use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::annotation::{ScaleBarParams, TimeStampParams};
use crate::buffer::Calibration;
use crate::consts::{DEFAULT_FPS, DEFAULT_VIDEO_CODEC};
use crate::correction::{BackgroundParams, ContrastParams};
use crate::export::ExportOptions;
use crate::montage::MontageParams;

/// Everything `run_pipeline` does, in one TOML-friendly document.
///
/// Optional sections are steps; a missing section skips the step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input: PathBuf,
    /// Stack or frame output; the extension picks the format.
    pub output: PathBuf,
    /// Stack name, defaults to the input file name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub fonts: FontConfig,
    pub frame_range: Option<FrameRangeConfig>,
    pub background: Option<BackgroundParams>,
    pub contrast: Option<ContrastConfig>,
    pub crop: Option<CropConfig>,
    pub scale_bar: Option<ScaleBarConfig>,
    pub time_stamps: Option<TimeStampParams>,
    pub montage: Option<MontageParams>,
    #[serde(default)]
    pub export: ExportOptions,
    pub video: Option<VideoConfig>,
}

impl PipelineConfig {
    /// Config with no processing steps: load `input` and write it to `output`.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            name: None,
            calibration: Calibration::default(),
            fonts: FontConfig::default(),
            frame_range: None,
            background: None,
            contrast: None,
            crop: None,
            scale_bar: None,
            time_stamps: None,
            montage: None,
            export: ExportOptions::default(),
            video: None,
        }
    }

    /// Number of optional steps enabled.
    pub fn step_count(&self) -> usize {
        [
            self.frame_range.is_some(),
            self.background.is_some(),
            self.contrast.is_some(),
            self.crop.is_some(),
            self.scale_bar.is_some(),
            self.time_stamps.is_some(),
            self.montage.is_some(),
            self.video.is_some(),
        ]
        .iter()
        .filter(|&&on| on)
        .count()
    }
}

/// Directories searched for annotation fonts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub directories: Vec<PathBuf>,
}

/// Frames `first..last` to keep; `last` defaults to the frame count.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameRangeConfig {
    pub first: usize,
    pub last: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContrastConfig {
    /// Frame the mapping is computed from; defaults to the first.
    #[serde(default)]
    pub frame: Option<usize>,
    #[serde(flatten)]
    pub params: ContrastParams,
}

/// Crop corners in `(x, y)` pixel coordinates; `bottom_right` is exclusive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CropConfig {
    #[serde(default)]
    pub top_left: (i64, i64),
    #[serde(default)]
    pub bottom_right: Option<(i64, i64)>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaleBarConfig {
    /// Only draw on this frame; every frame when unset.
    #[serde(default)]
    pub frame: Option<usize>,
    #[serde(flatten)]
    pub params: ScaleBarParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Defaults to the stack output with an `.mp4` extension.
    pub output: Option<PathBuf>,
    pub fps: u32,
    pub codec: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            output: None,
            fps: DEFAULT_FPS,
            codec: DEFAULT_VIDEO_CODEC.to_string(),
        }
    }
}
