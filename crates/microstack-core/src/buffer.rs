use std::fmt;
use std::ops::Range;

use ndarray::{s, Array2, Array3, ArrayView2, Axis, Zip};
use num_traits::{Bounded, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::consts::{FRAME_UNIT, PIXEL_UNIT};
use crate::error::{MicroStackError, Result};

/// Element type shared by every sample of a [`Buffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    U8,
    U16,
    F32,
}

impl ElementType {
    /// Largest representable sample, `None` for floating point.
    pub fn max_value(self) -> Option<f64> {
        match self {
            Self::U8 => Some(u8::type_max()),
            Self::U16 => Some(u16::type_max()),
            Self::F32 => None,
        }
    }

    pub fn is_integer(self) -> bool {
        self.max_value().is_some()
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "uint8"),
            Self::U16 => write!(f, "uint16"),
            Self::F32 => write!(f, "float32"),
        }
    }
}

/// A sample type a [`Buffer`] can hold.
pub trait Sample: Copy + Send + Sync + 'static {
    const ELEMENT: ElementType;

    fn wrap(array: Array3<Self>) -> Buffer;

    fn to_f64(self) -> f64;

    /// Round-to-nearest saturating conversion; NaN maps to zero for integer types.
    fn from_f64(value: f64) -> Self;

    fn type_max() -> f64;
}

macro_rules! impl_integer_sample {
    ($t:ty, $variant:ident) => {
        impl Sample for $t {
            const ELEMENT: ElementType = ElementType::$variant;

            fn wrap(array: Array3<Self>) -> Buffer {
                Buffer::$variant(array)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                // `as` saturates at the type bounds and maps NaN to 0.
                value.round() as $t
            }

            fn type_max() -> f64 {
                ToPrimitive::to_f64(&<$t as Bounded>::max_value()).unwrap_or(f64::MAX)
            }
        }
    };
}

impl_integer_sample!(u8, U8);
impl_integer_sample!(u16, U16);

impl Sample for f32 {
    const ELEMENT: ElementType = ElementType::F32;

    fn wrap(array: Array3<Self>) -> Buffer {
        Buffer::F32(array)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn type_max() -> f64 {
        f32::MAX as f64
    }
}

/// An ordered sequence of same-shaped 2-D intensity frames.
///
/// Shape is `(frames, height, width)`; a single image is a buffer with one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Buffer {
    U8(Array3<u8>),
    U16(Array3<u16>),
    F32(Array3<f32>),
}

/// Run `$body` with `$arr` bound to the typed array of a buffer.
macro_rules! with_samples {
    ($buf:expr, $arr:ident => $body:expr) => {
        match $buf {
            $crate::buffer::Buffer::U8($arr) => $body,
            $crate::buffer::Buffer::U16($arr) => $body,
            $crate::buffer::Buffer::F32($arr) => $body,
        }
    };
}

/// Like `with_samples!`, rewrapping the resulting array in the same variant.
macro_rules! map_samples {
    ($buf:expr, $arr:ident => $body:expr) => {
        match $buf {
            $crate::buffer::Buffer::U8($arr) => $crate::buffer::Buffer::U8($body),
            $crate::buffer::Buffer::U16($arr) => $crate::buffer::Buffer::U16($body),
            $crate::buffer::Buffer::F32($arr) => $crate::buffer::Buffer::F32($body),
        }
    };
}

pub(crate) use with_samples;

impl<T: Sample> From<Array3<T>> for Buffer {
    fn from(array: Array3<T>) -> Self {
        T::wrap(array)
    }
}

impl Buffer {
    /// Build a buffer from individual frames, checking they all share one shape.
    pub fn from_frames<T: Sample>(frames: &[Array2<T>]) -> Result<Self> {
        let first = frames.first().ok_or(MicroStackError::EmptySequence)?;
        let expected = first.dim();
        if let Some(frame) = frames.iter().find(|f| f.dim() != expected) {
            return Err(MicroStackError::ShapeMismatch {
                expected,
                found: frame.dim(),
            });
        }
        let views: Vec<ArrayView2<'_, T>> = frames.iter().map(|f| f.view()).collect();
        let data = ndarray::stack(Axis(0), &views).map_err(|_| MicroStackError::ShapeMismatch {
            expected,
            found: expected,
        })?;
        Ok(T::wrap(data))
    }

    /// Join buffers of one element type and frame shape along the frame axis.
    pub fn concat(parts: &[Buffer]) -> Result<Self> {
        let first = parts.first().ok_or(MicroStackError::EmptySequence)?;
        let expected = (first.height(), first.width());
        for part in parts {
            if part.element_type() != first.element_type() {
                return Err(MicroStackError::InvalidParameter(format!(
                    "cannot join {} frames with {} frames",
                    first.element_type(),
                    part.element_type()
                )));
            }
            let found = (part.height(), part.width());
            if found != expected {
                return Err(MicroStackError::ShapeMismatch { expected, found });
            }
        }

        macro_rules! join {
            ($variant:ident) => {{
                let views: Vec<_> = parts
                    .iter()
                    .filter_map(|p| match p {
                        Buffer::$variant(a) => Some(a.view()),
                        _ => None,
                    })
                    .collect();
                ndarray::concatenate(Axis(0), &views)
                    .map(Buffer::$variant)
                    .map_err(|_| MicroStackError::ShapeMismatch {
                        expected,
                        found: expected,
                    })
            }};
        }

        match first.element_type() {
            ElementType::U8 => join!(U8),
            ElementType::U16 => join!(U16),
            ElementType::F32 => join!(F32),
        }
    }

    /// Wrap a single 2-D frame.
    pub fn single<T: Sample>(frame: Array2<T>) -> Self {
        T::wrap(frame.insert_axis(Axis(0)))
    }

    /// Cast an f64 array into the requested element type (saturating).
    pub fn from_f64(array: &Array3<f64>, element: ElementType) -> Self {
        match element {
            ElementType::U8 => Self::U8(array.mapv(u8::from_f64)),
            ElementType::U16 => Self::U16(array.mapv(u16::from_f64)),
            ElementType::F32 => Self::F32(array.mapv(f32::from_f64)),
        }
    }

    pub fn to_f64(&self) -> Array3<f64> {
        with_samples!(self, a => a.mapv(Sample::to_f64))
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::U8(_) => ElementType::U8,
            Self::U16(_) => ElementType::U16,
            Self::F32(_) => ElementType::F32,
        }
    }

    /// `(frames, height, width)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        with_samples!(self, a => a.dim())
    }

    pub fn n_frames(&self) -> usize {
        self.dim().0
    }

    pub fn height(&self) -> usize {
        self.dim().1
    }

    pub fn width(&self) -> usize {
        self.dim().2
    }

    pub fn is_sequence(&self) -> bool {
        self.n_frames() > 1
    }

    /// Fail with `SequenceRequired` unless the buffer holds at least two frames.
    pub fn require_sequence(&self) -> Result<()> {
        if self.is_sequence() {
            Ok(())
        } else {
            Err(MicroStackError::SequenceRequired {
                frames: self.n_frames(),
            })
        }
    }

    /// Smallest and largest sample, ignoring NaN.
    pub fn sample_range(&self) -> (f64, f64) {
        with_samples!(self, a => a.iter().map(|&v| Sample::to_f64(v)).filter(|v| !v.is_nan()).fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), v| (lo.min(v), hi.max(v)),
        ))
    }

    pub fn min(&self) -> f64 {
        self.sample_range().0
    }

    pub fn max(&self) -> f64 {
        self.sample_range().1
    }

    /// Value burned in for "white" overlays: the type maximum, or the
    /// buffer's own maximum for floating point data.
    pub fn white_value(&self) -> f64 {
        self.element_type().max_value().unwrap_or_else(|| self.max())
    }

    /// Copy of frame `index` as a one-frame buffer.
    pub fn frame(&self, index: usize) -> Result<Buffer> {
        self.check_index(index)?;
        Ok(map_samples!(self, a => a.slice(s![index..index + 1, .., ..]).to_owned()))
    }

    /// Copy of the given frames, in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Buffer> {
        if indices.is_empty() {
            return Err(MicroStackError::EmptySequence);
        }
        for &index in indices {
            self.check_index(index)?;
        }
        Ok(map_samples!(self, a => a.select(Axis(0), indices)))
    }

    /// Copy of the contiguous frame range `first..last`.
    pub(crate) fn slice_frames(&self, frames: Range<usize>) -> Buffer {
        map_samples!(self, a => a.slice(s![frames.clone(), .., ..]).to_owned())
    }

    /// Copy of the same spatial region of every frame.
    pub(crate) fn slice_region(&self, rows: Range<usize>, cols: Range<usize>) -> Buffer {
        map_samples!(self, a => a.slice(s![.., rows.clone(), cols.clone()]).to_owned())
    }

    /// Force every masked pixel of frame `index` to `value`.
    pub(crate) fn burn_mask(&mut self, index: usize, mask: ArrayView2<'_, bool>, value: f64) {
        with_samples!(self, a => {
            let fill = Sample::from_f64(value);
            Zip::from(a.index_axis_mut(Axis(0), index))
                .and(mask)
                .for_each(|px, &m| {
                    if m {
                        *px = fill;
                    }
                });
        })
    }

    /// Set the same rectangle of each frame in `frames` to `value`.
    pub(crate) fn fill_rect(
        &mut self,
        frames: Range<usize>,
        rows: Range<usize>,
        cols: Range<usize>,
        value: f64,
    ) {
        with_samples!(self, a => {
            let fill = Sample::from_f64(value);
            a.slice_mut(s![frames.clone(), rows.clone(), cols.clone()]).fill(fill);
        })
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let total = self.n_frames();
        if index >= total {
            return Err(MicroStackError::IndexOutOfRange { index, total });
        }
        Ok(())
    }
}

/// Spatial and temporal calibration used to label annotations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub space_unit: String,
    /// Space units per pixel.
    pub space_scale: f64,
    pub time_unit: String,
    /// Time units per frame.
    pub time_scale: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            space_unit: PIXEL_UNIT.to_string(),
            space_scale: 1.0,
            time_unit: FRAME_UNIT.to_string(),
            time_scale: 1.0,
        }
    }
}

impl Calibration {
    /// Whether the space unit is plain pixels.
    pub fn is_pixel_unit(&self) -> bool {
        matches!(self.space_unit.to_lowercase().as_str(), "px" | "pixel")
    }
}
