//! Burned-in overlays: scale bars and time stamps.
//!
//! Overlays never blend. Every pixel covered by a bar or a glyph mask is
//! forced to the overlay colour in a copy of the input buffer.

pub mod font;
pub mod scale_bar;
pub mod time_stamps;

pub use font::{fit_font_size, render_text_mask, FontDirectoryResolver, FontResolver, GlyphRasterizer, TextRasterizer};
pub use scale_bar::{bar_geometry, scale_bar, BarGeometry, ScaleBarParams};
pub use time_stamps::{time_labels, time_stamps, TextPosition, TimeStampParams};

use crate::buffer::Buffer;

/// Sample value used for an overlay on `buffer`.
pub(crate) fn overlay_value(buffer: &Buffer, white: bool) -> f64 {
    if white {
        buffer.white_value()
    } else {
        0.0
    }
}
