use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buffer::{Buffer, Calibration};
use crate::consts::{DEFAULT_FONT, DEFAULT_PADDING};
use crate::error::{MicroStackError, Result};

use super::font::{fit_font_size, render_text_mask, TextRasterizer};
use super::overlay_value;

/// Vertical placement of the time stamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    #[default]
    Top,
    Bottom,
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Bottom => write!(f, "bottom"),
        }
    }
}

impl FromStr for TextPosition {
    type Err = MicroStackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            other => Err(MicroStackError::InvalidParameter(format!(
                "text position '{other}' not recognized (expected top/bottom)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeStampParams {
    /// Fixed label size; searched for when unset.
    pub font_size: Option<u32>,
    pub font: String,
    pub padding: usize,
    pub position: TextPosition,
    pub white_text: bool,
}

impl Default for TimeStampParams {
    fn default() -> Self {
        Self {
            font_size: None,
            font: DEFAULT_FONT.to_string(),
            padding: DEFAULT_PADDING,
            position: TextPosition::Top,
            white_text: true,
        }
    }
}

/// One "<time> <unit>" label per frame.
pub fn time_labels(n_frames: usize, calibration: &Calibration) -> Vec<String> {
    (0..n_frames)
        .map(|i| format!("{:.3} {}", i as f64 * calibration.time_scale, calibration.time_unit))
        .collect()
}

/// Burn the elapsed time into each frame of a sequence.
///
/// The font size is chosen once so the longest label fits within the frame
/// width minus twice the padding; every label is drawn at that size.
pub fn time_stamps(
    buffer: &Buffer,
    calibration: &Calibration,
    params: &TimeStampParams,
    rasterizer: &dyn TextRasterizer,
) -> Result<Buffer> {
    buffer.require_sequence()?;

    let (n, h, w) = buffer.dim();
    let labels = time_labels(n, calibration);
    let longest = labels
        .iter()
        .fold(&labels[0], |best, l| if l.len() > best.len() { l } else { best });

    let limit = w.saturating_sub(2 * params.padding);
    let size = params
        .font_size
        .unwrap_or_else(|| fit_font_size(rasterizer, longest, limit));

    let mut out = buffer.clone();
    if size == 0 {
        warn!(longest = %longest, limit, "Time stamps do not fit the frame width, skipping");
        return Ok(out);
    }

    let (_, text_h) = rasterizer.measure(longest, size);
    let left = params.padding as i64;
    let top = match params.position {
        TextPosition::Top => params.padding as i64,
        TextPosition::Bottom => h as i64 - (params.padding + text_h) as i64,
    };
    debug!(size, top, position = %params.position, "Rendering time stamps");

    let masks: Vec<Array2<bool>> = labels
        .par_iter()
        .map(|label| render_text_mask(rasterizer, label, size, left, top, (h, w)))
        .collect();

    let color = overlay_value(buffer, params.white_text);
    for (i, mask) in masks.iter().enumerate() {
        out.burn_mask(i, mask.view(), color);
    }

    Ok(out)
}
