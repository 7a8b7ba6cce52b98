use serde::{Deserialize, Serialize};

use crate::buffer::{Buffer, ElementType};
use crate::error::{MicroStackError, Result};

/// A `[min, max]` pair of sample values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub min: f64,
    pub max: f64,
}

impl Limits {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }
}

/// Linearly map `old` onto `new` and cast the result to `output`.
///
/// Values are normalized to `[0, 1]` against `old`, clipped, then spread over
/// `new`. Values outside `old` therefore saturate at the ends of `new`.
pub fn rescale(buffer: &Buffer, old: Limits, new: Limits, output: ElementType) -> Result<Buffer> {
    if old.is_degenerate() {
        return Err(MicroStackError::InvalidRange { value: old.min });
    }

    let old_span = old.span();
    let new_span = new.span();

    let mut data = buffer.to_f64();
    data.par_mapv_inplace(|v| ((v - old.min) / old_span).clamp(0.0, 1.0) * new_span + new.min);

    Ok(Buffer::from_f64(&data, output))
}
