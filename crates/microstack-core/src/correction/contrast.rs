use serde::{Deserialize, Serialize};

use crate::buffer::{Buffer, Sample};
use crate::buffer::with_samples;
use crate::consts::DEFAULT_CONTRAST_PERCENTILE;
use crate::error::{MicroStackError, Result};

use super::rescale::{rescale, Limits};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContrastParams {
    /// Explicit lower display limit; computed from `percentile_min` when unset.
    pub min: Option<f64>,
    /// Explicit upper display limit; computed from `100 - percentile` when unset.
    pub max: Option<f64>,
    /// Percent of samples clipped at each end (0..=100).
    pub percentile: f64,
    /// Lower-end clip percent, defaults to `percentile`.
    pub percentile_min: Option<f64>,
    /// Map onto the full element range instead of the buffer's own range.
    pub rescale: bool,
    /// Compute percentiles on log10 of the samples.
    pub log_scale: bool,
}

impl Default for ContrastParams {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            percentile: DEFAULT_CONTRAST_PERCENTILE,
            percentile_min: None,
            rescale: true,
            log_scale: false,
        }
    }
}

/// A memoized contrast correction: samples in `old` are spread over `new`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContrastMapping {
    pub old: Limits,
    pub new: Limits,
}

impl ContrastMapping {
    /// Fails with `InvalidRange` if the mapping cannot be applied.
    pub fn validate(&self) -> Result<()> {
        if self.old.is_degenerate() {
            return Err(MicroStackError::InvalidRange {
                value: self.old.min,
            });
        }
        Ok(())
    }
}

/// Compute the contrast mapping for `buffer` without applying it.
pub fn set_contrast_correction(buffer: &Buffer, params: &ContrastParams) -> Result<ContrastMapping> {
    let old = display_limits(buffer, params)?;
    let new = target_limits(buffer, params.rescale);
    Ok(ContrastMapping { old, new })
}

/// Apply a contrast mapping, keeping the buffer's element type.
pub fn do_contrast_correction(buffer: &Buffer, mapping: &ContrastMapping) -> Result<Buffer> {
    rescale(buffer, mapping.old, mapping.new, buffer.element_type())
}

fn display_limits(buffer: &Buffer, params: &ContrastParams) -> Result<Limits> {
    if let (Some(min), Some(max)) = (params.min, params.max) {
        return Ok(Limits::new(min, max));
    }

    let lower_pct = params.percentile_min.unwrap_or(params.percentile);
    let upper_pct = 100.0 - params.percentile;
    for pct in [lower_pct, params.percentile] {
        if !(0.0..=100.0).contains(&pct) {
            return Err(MicroStackError::InvalidParameter(format!(
                "percentile {pct} outside 0..=100"
            )));
        }
    }

    let sorted = sorted_samples(buffer, params.log_scale)?;
    let unlog = |v: f64| if params.log_scale { 10f64.powf(v) } else { v };

    let min = params
        .min
        .unwrap_or_else(|| unlog(percentile(&sorted, lower_pct)));
    let max = params
        .max
        .unwrap_or_else(|| unlog(percentile(&sorted, upper_pct)));

    Ok(Limits::new(min, max))
}

fn target_limits(buffer: &Buffer, rescale: bool) -> Limits {
    if rescale {
        Limits::new(0.0, buffer.white_value())
    } else {
        let (min, max) = buffer.sample_range();
        Limits::new(min, max)
    }
}

/// Finite samples in ascending order; log10 of the positive ones for `log_scale`.
fn sorted_samples(buffer: &Buffer, log_scale: bool) -> Result<Vec<f64>> {
    let mut values: Vec<f64> = with_samples!(buffer, a => a.iter().map(|&v| Sample::to_f64(v)).collect());
    if log_scale {
        values.retain(|&v| v > 0.0);
        values.iter_mut().for_each(|v| *v = v.log10());
    }
    values.retain(|v| v.is_finite());

    if values.is_empty() {
        return Err(MicroStackError::InvalidParameter(
            "no usable samples to compute percentiles from".into(),
        ));
    }

    values.sort_unstable_by(|a, b| a.total_cmp(b));
    Ok(values)
}

/// Percentile of sorted data, interpolating linearly between closest ranks.
pub(crate) fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
