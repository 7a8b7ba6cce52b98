use ndarray::{s, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::buffer::{with_samples, Buffer, Sample};
use crate::error::{MicroStackError, Result};

/// Which frames of a sequence go into a montage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSelection {
    /// Every k-th frame, starting at 0.
    Step(usize),
    /// Explicit frame indices, in placement order.
    Indices(Vec<usize>),
}

impl Default for FrameSelection {
    fn default() -> Self {
        Self::Step(1)
    }
}

impl FrameSelection {
    /// Resolve to concrete indices into a stack of `n_frames`.
    pub fn resolve(&self, n_frames: usize) -> Result<Vec<usize>> {
        match self {
            Self::Step(0) => Err(MicroStackError::InvalidParameter(
                "montage frame step must be at least 1".into(),
            )),
            Self::Step(step) => Ok((0..n_frames).step_by(*step).collect()),
            Self::Indices(indices) if indices.is_empty() => Err(MicroStackError::InvalidParameter(
                "montage frame list is empty".into(),
            )),
            Self::Indices(indices) => {
                if let Some(&index) = indices.iter().find(|&&i| i >= n_frames) {
                    return Err(MicroStackError::IndexOutOfRange {
                        index,
                        total: n_frames,
                    });
                }
                Ok(indices.clone())
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MontageParams {
    pub frames: FrameSelection,
    pub column: Option<usize>,
    pub row: Option<usize>,
    /// Gap between cells in pixels.
    pub margin: usize,
    /// Fill gaps and empty cells with white instead of black.
    pub white_margin: bool,
}

/// Grid dimensions of a montage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridLayout {
    pub column: usize,
    pub row: usize,
}

impl GridLayout {
    pub fn cells(&self) -> usize {
        self.column * self.row
    }
}

/// Integer whose square is closest to `number`, among the two bracketing
/// its square root. Ties go to the larger one.
pub fn closest_square(number: usize) -> usize {
    let mut lower = 0usize;
    let mut upper = 1usize;
    while upper * upper < number {
        lower += 1;
        upper += 1;
    }
    if lower == 0 {
        return upper;
    }
    if number.abs_diff(lower * lower) < number.abs_diff(upper * upper) {
        lower
    } else {
        upper
    }
}

/// Work out the grid for `count` frames. Returns the layout and how many of
/// the frames fit in it.
pub fn grid_layout(count: usize, column: Option<usize>, row: Option<usize>) -> Result<(GridLayout, usize)> {
    if count == 0 {
        return Err(MicroStackError::EmptySequence);
    }
    if column == Some(0) || row == Some(0) {
        return Err(MicroStackError::InvalidParameter(
            "montage column and row counts must be at least 1".into(),
        ));
    }

    let layout = match (column, row) {
        (None, None) => {
            let column = closest_square(count);
            GridLayout {
                column,
                row: count.div_ceil(column),
            }
        }
        (Some(column), None) => GridLayout {
            column,
            row: count.div_ceil(column),
        },
        (None, Some(row)) => GridLayout {
            column: count.div_ceil(row),
            row,
        },
        (Some(column), Some(row)) => GridLayout { column, row },
    };

    Ok((layout, count.min(layout.cells())))
}

/// Tile selected frames of a sequence into a single-frame buffer.
///
/// Frames are placed row-major with `margin` pixels between cells. When both
/// `column` and `row` are given and the grid is too small, the selection is
/// truncated to the first `column * row` frames.
pub fn make_montage(buffer: &Buffer, params: &MontageParams) -> Result<Buffer> {
    buffer.require_sequence()?;

    let mut indices = params.frames.resolve(buffer.n_frames())?;
    let (layout, placed) = grid_layout(indices.len(), params.column, params.row)?;
    if placed < indices.len() {
        debug!(
            selected = indices.len(),
            cells = layout.cells(),
            "Truncating montage selection to grid size"
        );
        indices.truncate(placed);
    }

    let background = if params.white_margin {
        buffer.white_value()
    } else {
        0.0
    };

    info!(
        frames = indices.len(),
        column = layout.column,
        row = layout.row,
        margin = params.margin,
        "Composing montage"
    );

    Ok(with_samples!(buffer, a => Buffer::from(tile(a, &indices, layout, params.margin, Sample::from_f64(background)))))
}

fn tile<T: Sample>(
    stack: &Array3<T>,
    indices: &[usize],
    layout: GridLayout,
    margin: usize,
    background: T,
) -> Array3<T> {
    let (_, h, w) = stack.dim();
    let out_h = layout.row * h + (layout.row - 1) * margin;
    let out_w = layout.column * w + (layout.column - 1) * margin;
    let mut montage = Array2::from_elem((out_h, out_w), background);

    for (cell, &index) in indices.iter().enumerate() {
        let y = (cell / layout.column) * (h + margin);
        let x = (cell % layout.column) * (w + margin);
        montage
            .slice_mut(s![y..y + h, x..x + w])
            .assign(&stack.index_axis(Axis(0), index));
    }

    montage.insert_axis(Axis(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_square_prefers_nearer_square() {
        assert_eq!(closest_square(1), 1);
        assert_eq!(closest_square(4), 2);
        assert_eq!(closest_square(5), 2);
        assert_eq!(closest_square(7), 3);
        assert_eq!(closest_square(9), 3);
        assert_eq!(closest_square(10), 3);
    }

    #[test]
    fn closest_square_switches_past_midpoint() {
        // 12 is nearer 9 than 16; 13 is nearer 16.
        assert_eq!(closest_square(2), 1);
        assert_eq!(closest_square(12), 3);
        assert_eq!(closest_square(13), 4);
    }

    #[test]
    fn layout_for_five_frames_leaves_one_empty_cell() {
        let (layout, placed) = grid_layout(5, None, None).unwrap();
        assert_eq!(layout, GridLayout { column: 2, row: 3 });
        assert_eq!(placed, 5);
        assert_eq!(layout.cells() - placed, 1);
    }
}
