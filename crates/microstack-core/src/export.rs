use std::fmt;

use ndarray::{Array3, Array4, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buffer::{Buffer, ElementType};
use crate::consts::{DEFAULT_EXTENSION, RGB_CHANNEL_COUNT};
use crate::correction::{rescale, Limits};
use crate::error::{MicroStackError, Result};

/// Integer bit depth used on export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BitDepth {
    Eight,
    #[default]
    Sixteen,
}

impl BitDepth {
    pub fn bits(self) -> u32 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }

    pub fn element_type(self) -> ElementType {
        match self {
            Self::Eight => ElementType::U8,
            Self::Sixteen => ElementType::U16,
        }
    }

    /// Largest sample value, `2^bits - 1`.
    pub fn max_value(self) -> f64 {
        ((1u32 << self.bits()) - 1) as f64
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = MicroStackError;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            other => Err(MicroStackError::UnsupportedBitDepth(other)),
        }
    }
}

impl From<BitDepth> for u32 {
    fn from(depth: BitDepth) -> Self {
        depth.bits()
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// How a buffer is written out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Extension used when the output path has none.
    pub extension: String,
    /// Write the uncorrected data instead of the working buffer.
    pub save_raw: bool,
    pub bit_depth: BitDepth,
    /// Stretch the data range over the output range.
    pub rescale: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            save_raw: false,
            bit_depth: BitDepth::default(),
            rescale: true,
        }
    }
}

/// Map a buffer onto `[0, 2^bits - 1]` in the matching unsigned type.
///
/// With `rescale` the buffer's own `[min, max]` is stretched over the output
/// range. Without it the lower limit is 0, and integer data already stored in
/// 8 or 16 bits is treated as spanning its full type range. A flat input
/// (`min == max`) produces zeros.
pub fn convert_bit_depth(buffer: &Buffer, bit_depth: BitDepth, rescale_range: bool) -> Result<Buffer> {
    let (min, max) = buffer.sample_range();
    let old_min = if rescale_range { min } else { 0.0 };
    let old_max = match buffer.element_type().max_value() {
        Some(type_max) if !rescale_range => type_max,
        _ => max,
    };

    let old = Limits::new(old_min, old_max);
    let new = Limits::new(0.0, bit_depth.max_value());
    let output = bit_depth.element_type();

    debug!(
        from = %buffer.element_type(),
        to = %bit_depth,
        old_min,
        old_max,
        "Converting bit depth"
    );

    if old.is_degenerate() || !old.span().is_finite() {
        warn!(old_min, old_max, "Flat or empty sample range, exporting zeros");
        return Ok(Buffer::from_f64(&Array3::zeros(buffer.dim()), output));
    }

    rescale(buffer, old, new, output)
}

/// 8-bit RGB frames `(frames, height, width, 3)` for video encoding.
///
/// Non-u8 data is first rescaled to 8 bits; the single channel is replicated.
pub fn to_rgb24(buffer: &Buffer) -> Result<Array4<u8>> {
    let eight_bit = match buffer {
        Buffer::U8(_) => buffer.clone(),
        _ => convert_bit_depth(buffer, BitDepth::Eight, true)?,
    };
    let Buffer::U8(gray) = eight_bit else {
        return Err(MicroStackError::UnsupportedFormat(
            "video frames must be 8-bit".into(),
        ));
    };

    let (n, h, w) = gray.dim();
    let rgb = gray
        .insert_axis(Axis(3))
        .broadcast((n, h, w, RGB_CHANNEL_COUNT))
        .map(|view| view.to_owned())
        .ok_or_else(|| MicroStackError::UnsupportedFormat("cannot expand frames to RGB".into()))?;
    Ok(rgb)
}
