use std::fmt;
use std::str::FromStr;

use ndarray::{Array3, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buffer::{Buffer, ElementType};
use crate::error::{MicroStackError, Result};

use super::reference::reference_frame;

/// How the per-pixel background reference is computed across frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AverageMethod {
    #[default]
    Mean,
    Median,
}

impl fmt::Display for AverageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => write!(f, "mean"),
            Self::Median => write!(f, "median"),
        }
    }
}

impl FromStr for AverageMethod {
    type Err = MicroStackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            other => Err(MicroStackError::InvalidParameter(format!(
                "average method '{other}' not recognized (expected mean/median)"
            ))),
        }
    }
}

/// How each frame is corrected against the background reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionMethod {
    Subtraction,
    #[default]
    Division,
}

impl fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subtraction => write!(f, "subtraction"),
            Self::Division => write!(f, "division"),
        }
    }
}

impl FromStr for CorrectionMethod {
    type Err = MicroStackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "subtraction" => Ok(Self::Subtraction),
            "division" => Ok(Self::Division),
            other => Err(MicroStackError::InvalidParameter(format!(
                "correction method '{other}' not recognized (expected subtraction/division)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundParams {
    /// Samples are signed values stored as unsigned; recentre them on zero.
    pub signed_bits: bool,
    pub average: AverageMethod,
    pub correction: CorrectionMethod,
    /// Stretch the result so its maximum reaches the element type maximum.
    pub rescale: bool,
}

impl Default for BackgroundParams {
    fn default() -> Self {
        Self {
            signed_bits: false,
            average: AverageMethod::Mean,
            correction: CorrectionMethod::Division,
            rescale: true,
        }
    }
}

/// Remove the static background of a frame sequence.
///
/// With `rescale`, the output keeps the input element type: the corrected
/// values are scaled so the largest finite value lands on the type maximum
/// (1.0 for float data), non-finite values become 0, and the cast clamps
/// anything outside the representable range. Without `rescale` the raw
/// corrected values are returned as `F32`.
pub fn background_correction(buffer: &Buffer, params: &BackgroundParams) -> Result<Buffer> {
    buffer.require_sequence()?;

    let element = buffer.element_type();
    let mut data = buffer.to_f64();

    if params.signed_bits {
        let type_max = element.max_value().ok_or_else(|| {
            MicroStackError::InvalidParameter(format!(
                "signed-bit correction requires an integer element type, got {element}"
            ))
        })?;
        data -= (type_max + 1.0) / 2.0 - 1.0;
    }

    let reference = reference_frame(&data, params.average);
    debug!(
        frames = buffer.n_frames(),
        average = %params.average,
        correction = %params.correction,
        "Computed background reference"
    );

    apply_correction(&mut data, &reference, params.correction);

    if !params.rescale {
        return Ok(Buffer::from_f64(&data, ElementType::F32));
    }

    let target_max = element.max_value().unwrap_or(1.0);
    let peak = data
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    let factor = if peak > 0.0 {
        target_max / peak
    } else {
        warn!(peak, "Corrected stack has no positive values, skipping rescale");
        1.0
    };

    data.par_mapv_inplace(|v| if v.is_finite() { v * factor } else { 0.0 });

    Ok(Buffer::from_f64(&data, element))
}

fn apply_correction(
    data: &mut Array3<f64>,
    reference: &ndarray::Array2<f64>,
    correction: CorrectionMethod,
) {
    data.axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(|mut frame| match correction {
            CorrectionMethod::Subtraction => frame -= reference,
            CorrectionMethod::Division => frame /= reference,
        });
}
