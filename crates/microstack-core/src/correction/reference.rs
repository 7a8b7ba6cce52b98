use ndarray::{s, Array2, Array3};
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

use super::background::AverageMethod;

/// Per-pixel average across the frame axis, ignoring NaN samples.
///
/// A pixel that is NaN in every frame stays NaN.
/// Parallelizes at the row level for images >= 256x256.
pub fn reference_frame(data: &Array3<f64>, method: AverageMethod) -> Array2<f64> {
    let (n, h, w) = data.dim();

    let reduce = |row: usize, col: usize, values: &mut Vec<f64>| -> f64 {
        values.clear();
        values.extend(
            data.slice(s![.., row, col])
                .iter()
                .copied()
                .filter(|v| !v.is_nan()),
        );
        match method {
            AverageMethod::Mean => nan_mean(values),
            AverageMethod::Median => nan_median(values),
        }
    };

    if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        let rows: Vec<Vec<f64>> = (0..h)
            .into_par_iter()
            .map(|row| {
                let mut values = Vec::with_capacity(n);
                (0..w).map(|col| reduce(row, col, &mut values)).collect()
            })
            .collect();

        let mut result = Array2::<f64>::zeros((h, w));
        for (row, row_data) in rows.into_iter().enumerate() {
            for (col, val) in row_data.into_iter().enumerate() {
                result[[row, col]] = val;
            }
        }
        result
    } else {
        let mut values = Vec::with_capacity(n);
        Array2::from_shape_fn((h, w), |(row, col)| reduce(row, col, &mut values))
    }
}

fn nan_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn nan_median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        f64::NAN
    } else if n % 2 == 1 {
        let mid = n / 2;
        *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    } else {
        let mid = n / 2;
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        (values[mid - 1] + values[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_even_count_averages_middle_pair() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(nan_median(&mut values), 2.5);
    }

    #[test]
    fn median_odd_count() {
        let mut values = vec![9.0, 1.0, 5.0];
        assert_eq!(nan_median(&mut values), 5.0);
    }

    #[test]
    fn nan_samples_are_ignored() {
        let mut data = Array3::<f64>::zeros((3, 1, 1));
        data[[0, 0, 0]] = 2.0;
        data[[1, 0, 0]] = f64::NAN;
        data[[2, 0, 0]] = 4.0;
        let mean = reference_frame(&data, AverageMethod::Mean);
        let median = reference_frame(&data, AverageMethod::Median);
        assert_eq!(mean[[0, 0]], 3.0);
        assert_eq!(median[[0, 0]], 3.0);
    }

    #[test]
    fn all_nan_pixel_stays_nan() {
        let data = Array3::<f64>::from_elem((2, 1, 1), f64::NAN);
        assert!(reference_frame(&data, AverageMethod::Mean)[[0, 0]].is_nan());
    }
}
