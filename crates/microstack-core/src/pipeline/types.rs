use std::path::PathBuf;

use crate::buffer::ElementType;

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Reading,
    FrameRange,
    Background,
    Contrast,
    Cropping,
    ScaleBar,
    TimeStamps,
    Writing,
    Montage,
    Video,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading => write!(f, "Reading frames"),
            Self::FrameRange => write!(f, "Selecting frames"),
            Self::Background => write!(f, "Background"),
            Self::Contrast => write!(f, "Contrast"),
            Self::Cropping => write!(f, "Cropping"),
            Self::ScaleBar => write!(f, "Scale bar"),
            Self::TimeStamps => write!(f, "Time stamps"),
            Self::Writing => write!(f, "Writing output"),
            Self::Montage => write!(f, "Montage"),
            Self::Video => write!(f, "Encoding video"),
        }
    }
}

/// What a pipeline run produced.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOutput {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    pub element_type: ElementType,
    /// Every file written, in order.
    pub written: Vec<PathBuf>,
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (e.g., frame count), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// Progress reporter that ignores every event.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
