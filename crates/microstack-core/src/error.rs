use thiserror::Error;

#[derive(Error, Debug)]
pub enum MicroStackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Operation requires a sequence of frames (got {frames})")]
    SequenceRequired { frames: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported bit depth: {0} (expected 8 or 16)")]
    UnsupportedBitDepth(u32),

    #[error("Degenerate contrast range: min and max are both {value}")]
    InvalidRange { value: f64 },

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Frame index {index} out of range (total: {total})")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Frame shape mismatch: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Font error: {0}")]
    Font(String),

    #[error("Video encoder failed: {0}")]
    Encoder(String),
}

pub type Result<T> = std::result::Result<T, MicroStackError>;
