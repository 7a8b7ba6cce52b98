pub mod config;
mod orchestrator;
mod types;

pub use orchestrator::{montage_path, run_pipeline, video_path};
pub use types::{NoOpReporter, PipelineOutput, PipelineStage, ProgressReporter};
