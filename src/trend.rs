// src/trend.rs
//
// Post-session linear trend of height over sample index.

use crate::types::HeightSample;
use serde::Serialize;
use thiserror::Error;

pub const MIN_TREND_SAMPLES: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrendError {
    #[error("need at least {MIN_TREND_SAMPLES} samples to fit a trend, got {count}")]
    InsufficientSamples { count: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendModel {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination. NaN when every height is the same.
    pub r_squared: f64,
    pub mse: f64,
    /// One prediction per input sample, same order
    pub predicted: Vec<f64>,
}

impl TrendModel {
    pub fn r_squared_defined(&self) -> bool {
        self.r_squared.is_finite()
    }
}

/// Ordinary least squares fit of `height ≈ slope · index + intercept`.
///
/// When all indices coincide the slope is 0 and the intercept is the mean
/// height (minimum-norm solution).
pub fn fit_trend(samples: &[HeightSample]) -> Result<TrendModel, TrendError> {
    if samples.len() < MIN_TREND_SAMPLES {
        return Err(TrendError::InsufficientSamples {
            count: samples.len(),
        });
    }

    let n = samples.len() as f64;
    let mean_x = samples.iter().map(|s| s.index as f64).sum::<f64>() / n;
    let mean_y = samples.iter().map(|s| s.height).sum::<f64>() / n;

    let mut sxx = 0.0f64;
    let mut sxy = 0.0f64;
    let mut ss_tot = 0.0f64;
    for s in samples {
        let dx = s.index as f64 - mean_x;
        let dy = s.height - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        ss_tot += dy * dy;
    }

    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = mean_y - slope * mean_x;

    let predicted: Vec<f64> = samples
        .iter()
        .map(|s| slope * s.index as f64 + intercept)
        .collect();
    let ss_res: f64 = samples
        .iter()
        .zip(&predicted)
        .map(|(s, p)| (s.height - p).powi(2))
        .sum();

    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        f64::NAN
    };

    Ok(TrendModel {
        slope,
        intercept,
        r_squared,
        mse: ss_res / n,
        predicted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(heights: &[f64]) -> Vec<HeightSample> {
        heights
            .iter()
            .enumerate()
            .map(|(index, &height)| HeightSample { index, height })
            .collect()
    }

    #[test]
    fn test_perfect_line() {
        let model = fit_trend(&samples(&[10.0, 20.0, 30.0])).unwrap();
        assert!((model.slope - 10.0).abs() < 1e-9);
        assert!((model.intercept - 10.0).abs() < 1e-9);
        assert!((model.r_squared - 1.0).abs() < 1e-12);
        assert!(model.mse.abs() < 1e-12);
        assert_eq!(model.predicted.len(), 3);
        assert!((model.predicted[2] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_noisy_fit() {
        // y = 2x + 1 with residuals +1, -1, -1, +1
        let model = fit_trend(&samples(&[2.0, 2.0, 4.0, 8.0])).unwrap();
        assert!((model.slope - 2.0).abs() < 1e-9);
        assert!((model.intercept - 1.0).abs() < 1e-9);
        assert!((model.mse - 1.0).abs() < 1e-9);
        // ss_tot = 24, ss_res = 4
        assert!((model.r_squared - (1.0 - 4.0 / 24.0)).abs() < 1e-9);
    }

    #[test]
    fn test_too_few_samples() {
        assert_eq!(
            fit_trend(&[]).unwrap_err(),
            TrendError::InsufficientSamples { count: 0 }
        );
        assert_eq!(
            fit_trend(&samples(&[42.0])).unwrap_err(),
            TrendError::InsufficientSamples { count: 1 }
        );
    }

    #[test]
    fn test_constant_heights_leave_r_squared_undefined() {
        let model = fit_trend(&samples(&[55.0, 55.0, 55.0])).unwrap();
        assert_eq!(model.slope, 0.0);
        assert_eq!(model.intercept, 55.0);
        assert_eq!(model.mse, 0.0);
        assert!(model.r_squared.is_nan());
        assert!(!model.r_squared_defined());
    }

    #[test]
    fn test_identical_indices_fall_back_to_mean() {
        let data = [
            HeightSample { index: 3, height: 10.0 },
            HeightSample { index: 3, height: 20.0 },
        ];
        let model = fit_trend(&data).unwrap();
        assert_eq!(model.slope, 0.0);
        assert_eq!(model.intercept, 15.0);
        assert_eq!(model.r_squared, 0.0);
    }
}
