use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::Buffer;
use crate::error::{MicroStackError, Result};

/// A rectangle in image coordinates for cropping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl CropRect {
    /// Build a rectangle from `(x, y)` corners; `bottom_right` is exclusive and
    /// defaults to the full `(src_w, src_h)` extent.
    pub fn from_corners(
        top_left: (i64, i64),
        bottom_right: Option<(i64, i64)>,
        src_w: usize,
        src_h: usize,
    ) -> Result<CropRect> {
        let (x0, y0) = top_left;
        let (x1, y1) = bottom_right.unwrap_or((src_w as i64, src_h as i64));

        if x0 < 0 || y0 < 0 || x1 < 0 || y1 < 0 {
            return Err(MicroStackError::OutOfBounds(format!(
                "crop corners ({x0},{y0})-({x1},{y1}) contain negative coordinates"
            )));
        }
        if x1 <= x0 || y1 <= y0 {
            return Err(MicroStackError::OutOfBounds(format!(
                "crop corners ({x0},{y0})-({x1},{y1}) do not span a region"
            )));
        }

        CropRect {
            x: x0 as usize,
            y: y0 as usize,
            width: (x1 - x0) as usize,
            height: (y1 - y0) as usize,
        }
        .validated(src_w, src_h)
    }

    /// Check the rect is non-empty and fits within the source dimensions.
    pub fn validated(&self, src_w: usize, src_h: usize) -> Result<CropRect> {
        if self.width == 0 || self.height == 0 {
            return Err(MicroStackError::OutOfBounds(
                "crop width and height must be > 0".into(),
            ));
        }

        if self.x + self.width > src_w || self.y + self.height > src_h {
            return Err(MicroStackError::OutOfBounds(format!(
                "crop region ({},{} {}x{}) exceeds frame dimensions ({src_w}x{src_h})",
                self.x, self.y, self.width, self.height
            )));
        }

        Ok(self.clone())
    }
}

/// Crop every frame of `buffer` to the rectangle between two `(x, y)` corners.
///
/// `bottom_right` is exclusive and defaults to the frame extent. The frame
/// axis is never sliced.
pub fn crop(buffer: &Buffer, top_left: (i64, i64), bottom_right: Option<(i64, i64)>) -> Result<Buffer> {
    let rect = CropRect::from_corners(top_left, bottom_right, buffer.width(), buffer.height())?;
    crop_rect(buffer, &rect)
}

/// Crop every frame of `buffer` to `rect`.
pub fn crop_rect(buffer: &Buffer, rect: &CropRect) -> Result<Buffer> {
    let rect = rect.validated(buffer.width(), buffer.height())?;
    debug!(
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height,
        "Cropping"
    );
    // (x, y) -> (row, col)
    Ok(buffer.slice_region(rect.y..rect.y + rect.height, rect.x..rect.x + rect.width))
}
