//! File collaborators: loading buffers, persisting them, and video encoding.
//!
//! The engines never touch the filesystem. Everything here sits behind the
//! [`Loader`], [`Persister`] and [`VideoEncoder`] traits so the stack
//! aggregate and the pipeline can be driven with in-memory doubles.

pub mod image_io;
pub mod ser;
pub mod ser_writer;
pub mod video;

use std::path::{Path, PathBuf};

use ndarray::Array4;
use tracing::debug;

use crate::buffer::Buffer;
use crate::error::{MicroStackError, Result};
use crate::export::{convert_bit_depth, to_rgb24, BitDepth};

pub use image_io::{ImageLoader, ImagePersister};
pub use video::FfmpegEncoder;

/// Result of loading a path: one frame, or a sequence of frames.
#[derive(Clone, Debug, PartialEq)]
pub enum Loaded {
    SingleFrame(Buffer),
    MultiFrame(Buffer),
}

impl Loaded {
    /// Classify a buffer by its frame count.
    pub fn from_buffer(buffer: Buffer) -> Self {
        if buffer.is_sequence() {
            Self::MultiFrame(buffer)
        } else {
            Self::SingleFrame(buffer)
        }
    }

    pub fn buffer(&self) -> &Buffer {
        match self {
            Self::SingleFrame(b) | Self::MultiFrame(b) => b,
        }
    }

    pub fn into_buffer(self) -> Buffer {
        match self {
            Self::SingleFrame(b) | Self::MultiFrame(b) => b,
        }
    }
}

pub trait Loader {
    fn load(&self, path: &Path) -> Result<Loaded>;
}

/// Writes an already normalized buffer. One-frame buffers are single images.
pub trait Persister {
    fn persist(&self, buffer: &Buffer, path: &Path) -> Result<()>;
}

pub trait VideoEncoder {
    /// `frames` is `(frames, height, width, 3)` rgb24.
    fn encode(&self, frames: &Array4<u8>, path: &Path, fps: u32, codec: &str) -> Result<()>;
}

/// Lower-case extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Return the extension of `path` if it is one of `allowed`.
pub fn check_extension(path: &Path, allowed: &[&str]) -> Result<String> {
    match extension_of(path) {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(ext),
        Some(ext) => Err(MicroStackError::UnsupportedFormat(format!(
            ".{ext} (expected one of: {})",
            allowed.join(", ")
        ))),
        None => Err(MicroStackError::UnsupportedFormat(format!(
            "{} has no extension",
            path.display()
        ))),
    }
}

/// Append `default` (with or without a leading dot) when `path` has no extension.
pub fn with_default_extension(path: &Path, default: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(default.trim_start_matches('.'))
    }
}

/// Normalize `buffer` to `bit_depth` and hand it to `persister`.
///
/// Returns the path actually written.
pub fn save_image(
    persister: &dyn Persister,
    buffer: &Buffer,
    path: &Path,
    default_extension: &str,
    bit_depth: BitDepth,
    rescale: bool,
) -> Result<PathBuf> {
    let path = with_default_extension(path, default_extension);
    let normalized = convert_bit_depth(buffer, bit_depth, rescale)?;
    debug!(
        path = %path.display(),
        frames = normalized.n_frames(),
        bit_depth = %bit_depth,
        "Saving image"
    );
    persister.persist(&normalized, &path)?;
    Ok(path)
}

/// Convert `buffer` to rgb24 frames and encode them as a video.
pub fn save_video(
    encoder: &dyn VideoEncoder,
    buffer: &Buffer,
    path: &Path,
    fps: u32,
    codec: &str,
) -> Result<()> {
    if fps == 0 {
        return Err(MicroStackError::InvalidParameter(
            "video frame rate must be at least 1".into(),
        ));
    }
    let frames = to_rgb24(buffer)?;
    encoder.encode(&frames, path, fps, codec)
}
