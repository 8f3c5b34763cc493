//! One-step forecast test over a filled window.
//!
//! The series is checked for stationarity with a Dickey-Fuller style unit
//! root test and differenced once when the test fails. An AR(1) model with
//! intercept is then fit by least squares on everything except the latest
//! observation, and the latest observation is compared against the model's
//! 95% interval.
//!
//! Every failure mode (short series, degenerate variance, non-finite
//! coefficients) surfaces as `None`; callers treat that as "no forecast
//! opinion", never as an anomaly.

/// 95% two-sided normal quantile.
const Z_95: f64 = 1.96;

/// 5% critical value for the Dickey-Fuller t-statistic (small samples).
const DF_CRITICAL_5PCT: f64 = -2.93;

/// Variance below this is treated as a degenerate series.
const DEGENERATE_VAR: f64 = 1e-12;

/// Residual std below this means the fit has no usable spread.
const DEGENERATE_STD: f64 = 1e-9;

/// AR(1)-with-intercept fit: `(intercept, slope, residual_std)`.
fn ar1_fit(series: &[f64]) -> Option<(f64, f64, f64)> {
    let n = series.len();
    if n < 4 {
        return None;
    }

    let xs = &series[..n - 1];
    let ys = &series[1..];
    let m = xs.len() as f64;

    let mean_x = xs.iter().sum::<f64>() / m;
    let mean_y = ys.iter().sum::<f64>() / m;

    let sxx: f64 = xs.iter().map(|x| (x - mean_x) * (x - mean_x)).sum();
    if sxx < DEGENERATE_VAR {
        return None;
    }
    let sxy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let dof = xs.len().checked_sub(2).filter(|&d| d > 0)? as f64;
    let sse: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| {
            let e = y - (intercept + slope * x);
            e * e
        })
        .sum();
    let residual_std = (sse / dof).sqrt();

    if !intercept.is_finite() || !slope.is_finite() || !residual_std.is_finite() {
        return None;
    }
    if residual_std < DEGENERATE_STD {
        return None;
    }

    Some((intercept, slope, residual_std))
}

/// Dickey-Fuller style stationarity test: regress the first difference on
/// the lagged level and compare the slope t-statistic against the 5%
/// critical value. Degenerate series count as stationary.
pub fn is_stationary(series: &[f64]) -> bool {
    let n = series.len();
    if n < 4 {
        return true;
    }

    let lagged = &series[..n - 1];
    let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let m = lagged.len() as f64;

    let mean_x = lagged.iter().sum::<f64>() / m;
    let mean_d = diffs.iter().sum::<f64>() / m;

    let sxx: f64 = lagged.iter().map(|x| (x - mean_x) * (x - mean_x)).sum();
    if sxx < DEGENERATE_VAR {
        return true;
    }
    let sxd: f64 = lagged
        .iter()
        .zip(&diffs)
        .map(|(x, d)| (x - mean_x) * (d - mean_d))
        .sum();

    let beta = sxd / sxx;
    let alpha = mean_d - beta * mean_x;

    let dof = match lagged.len().checked_sub(2).filter(|&d| d > 0) {
        Some(d) => d as f64,
        None => return true,
    };
    let sse: f64 = lagged
        .iter()
        .zip(&diffs)
        .map(|(x, d)| {
            let e = d - (alpha + beta * x);
            e * e
        })
        .sum();
    let se_beta = (sse / dof / sxx).sqrt();

    if se_beta < DEGENERATE_VAR {
        return beta < 0.0;
    }

    beta / se_beta <= DF_CRITICAL_5PCT
}

/// First difference of a series.
fn difference(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

/// One-step-ahead forecast with a 95% interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastBand {
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ForecastBand {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Fit on everything before the latest observation and band the next step.
pub fn forecast_band(history: &[f64]) -> Option<ForecastBand> {
    let last = *history.last()?;

    if is_stationary(history) {
        let (intercept, slope, residual_std) = ar1_fit(history)?;
        let point = intercept + slope * last;
        Some(ForecastBand {
            point,
            lower: point - Z_95 * residual_std,
            upper: point + Z_95 * residual_std,
        })
    } else {
        let diffs = difference(history);
        let (intercept, slope, residual_std) = ar1_fit(&diffs)?;
        // Forecast the next difference, then integrate back onto the level.
        let point = last + intercept + slope * diffs.last()?;
        Some(ForecastBand {
            point,
            lower: point - Z_95 * residual_std,
            upper: point + Z_95 * residual_std,
        })
    }
}

/// Whether the latest value of `values` falls outside the 95% interval of
/// a model fit on everything before it. `None` when no model could be fit.
pub fn forecast_outlier(values: &[f64]) -> Option<bool> {
    if values.len() < 5 {
        return None;
    }
    let (history, latest) = values.split_at(values.len() - 1);
    let band = forecast_band(history)?;
    Some(!band.contains(latest[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOISY_LEVEL: [f64; 9] = [50.0, 50.4, 49.7, 50.1, 49.9, 50.3, 49.8, 50.2, 50.0];

    #[test]
    fn mean_reverting_series_is_stationary() {
        assert!(is_stationary(&NOISY_LEVEL));
    }

    #[test]
    fn linear_trend_is_not_stationary() {
        let trend: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        assert!(!is_stationary(&trend));
    }

    #[test]
    fn drifting_walk_is_not_stationary() {
        let walk = [1.0, 2.1, 3.0, 4.2, 5.1, 6.3, 7.2, 8.4, 9.3, 10.5];
        assert!(!is_stationary(&walk));
    }

    #[test]
    fn constant_series_is_stationary() {
        assert!(is_stationary(&[75.0; 30]));
    }

    #[test]
    fn flags_value_far_outside_band() {
        let mut values = NOISY_LEVEL.to_vec();
        values.push(80.0);
        assert_eq!(forecast_outlier(&values), Some(true));
    }

    #[test]
    fn accepts_value_near_the_level() {
        let mut values = NOISY_LEVEL.to_vec();
        values.push(50.0);
        assert_eq!(forecast_outlier(&values), Some(false));
    }

    #[test]
    fn constant_series_fails_open() {
        // Zero variance: no model can be fit, so there is no opinion.
        assert_eq!(forecast_outlier(&[75.0; 30]), None);
    }

    #[test]
    fn short_series_fails_open() {
        assert_eq!(forecast_outlier(&[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn band_is_symmetric_around_point() {
        let band = forecast_band(&NOISY_LEVEL).unwrap();
        let half = band.upper - band.point;
        assert!((band.point - band.lower - half).abs() < 1e-12);
        assert!(half > 0.0);
    }
}
