use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buffer::{Buffer, Calibration};
use crate::consts::{DEFAULT_BAR_THICKNESS, DEFAULT_FONT, DEFAULT_PADDING, DEFAULT_SCALE_LENGTH};
use crate::error::{MicroStackError, Result};

use super::font::{fit_font_size, render_text_mask, TextRasterizer};
use super::overlay_value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleBarParams {
    /// Bar length in calibrated space units.
    pub scale_length: f64,
    /// Bar height in pixels.
    pub thickness: usize,
    /// Distance from the bottom-right corner, and between bar and label.
    pub padding: usize,
    pub white_bar: bool,
    /// Write "<length> <unit>" above the bar.
    pub add_text: bool,
    pub font: String,
    /// Fixed label size; searched for when unset.
    pub font_size: Option<u32>,
}

impl Default for ScaleBarParams {
    fn default() -> Self {
        Self {
            scale_length: DEFAULT_SCALE_LENGTH,
            thickness: DEFAULT_BAR_THICKNESS,
            padding: DEFAULT_PADDING,
            white_bar: true,
            add_text: true,
            font: DEFAULT_FONT.to_string(),
            font_size: None,
        }
    }
}

/// Pixel extent of a scale bar; `bottom` and `right` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarGeometry {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl BarGeometry {
    pub fn length(&self) -> usize {
        self.right - self.left
    }
}

/// Place a bar of `scale_length` calibrated units `padding` pixels from the
/// bottom-right corner of a `width` x `height` frame.
pub fn bar_geometry(
    width: usize,
    height: usize,
    calibration: &Calibration,
    params: &ScaleBarParams,
) -> Result<BarGeometry> {
    let length_px = if calibration.is_pixel_unit() {
        params.scale_length
    } else {
        if calibration.space_scale <= 0.0 {
            return Err(MicroStackError::InvalidParameter(format!(
                "space scale must be positive, got {}",
                calibration.space_scale
            )));
        }
        params.scale_length / calibration.space_scale
    };

    if !(length_px > 0.0) || params.thickness == 0 {
        return Err(MicroStackError::InvalidParameter(format!(
            "scale bar needs a positive size (length {length_px} px, thickness {})",
            params.thickness
        )));
    }

    let right = width as i64 - params.padding as i64;
    let bottom = height as i64 - params.padding as i64;
    let left = (right as f64 - length_px) as i64;
    let top = bottom - params.thickness as i64;

    if left < 0 || top < 0 || right <= left {
        return Err(MicroStackError::OutOfBounds(format!(
            "scale bar of {length_px:.1}x{} px with padding {} does not fit a {width}x{height} frame",
            params.thickness, params.padding
        )));
    }

    Ok(BarGeometry {
        top: top as usize,
        left: left as usize,
        bottom: bottom as usize,
        right: right as usize,
    })
}

/// Burn a scale bar (and optionally its label) into every frame, or only
/// into `frame` when given.
///
/// `rasterizer` is required when `params.add_text` is set.
pub fn scale_bar(
    buffer: &Buffer,
    calibration: &Calibration,
    params: &ScaleBarParams,
    frame: Option<usize>,
    rasterizer: Option<&dyn TextRasterizer>,
) -> Result<Buffer> {
    let (n, h, w) = buffer.dim();
    if let Some(index) = frame {
        if index >= n {
            return Err(MicroStackError::IndexOutOfRange { index, total: n });
        }
    }

    let bar = bar_geometry(w, h, calibration, params)?;
    let color = overlay_value(buffer, params.white_bar);

    let label_mask = if params.add_text {
        let rasterizer = rasterizer.ok_or_else(|| {
            MicroStackError::InvalidParameter("a text rasterizer is required to label the scale bar".into())
        })?;
        let text = format!("{} {}", params.scale_length, calibration.space_unit);
        let size = params
            .font_size
            .unwrap_or_else(|| fit_font_size(rasterizer, &text, bar.length()));

        if size == 0 {
            warn!(text = %text, bar_length = bar.length(), "Scale bar label does not fit, skipping");
            None
        } else {
            let (_, text_h) = rasterizer.measure(&text, size);
            let top = bar.top as i64 - (params.padding + text_h) as i64;
            debug!(text = %text, size, top, left = bar.left, "Placing scale bar label");
            Some(render_text_mask(rasterizer, &text, size, bar.left as i64, top, (h, w)))
        }
    } else {
        None
    };

    let frames = match frame {
        Some(index) => index..index + 1,
        None => 0..n,
    };
    let mut out = buffer.clone();
    out.fill_rect(frames.clone(), bar.top..bar.bottom, bar.left..bar.right, color);
    if let Some(ref mask) = label_mask {
        for i in frames {
            out.burn_mask(i, mask.view(), color);
        }
    }

    Ok(out)
}
