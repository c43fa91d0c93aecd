use crate::error::{ProcessingError, Result};
use crate::models::StatusRecord;
use crate::processors::bucket_aggregator::round2;
use crate::utils::constants::{DEFAULT_RATE_FIELD, DEFAULT_RATE_WINDOW_MINUTES};
use chrono::{DateTime, Duration, FixedOffset};

/// Hourly rate of change of a status field over a trailing window, from a
/// least-squares fit.
pub struct ChangeRateEstimator {
    field: String,
    window: Duration,
    unit_scale: f64,
}

impl ChangeRateEstimator {
    pub fn new() -> Self {
        Self {
            field: DEFAULT_RATE_FIELD.to_string(),
            window: Duration::minutes(DEFAULT_RATE_WINDOW_MINUTES),
            unit_scale: 1.0,
        }
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = field.to_string();
        self
    }

    pub fn with_window_minutes(mut self, minutes: i64) -> Self {
        self.window = Duration::minutes(minutes);
        self
    }

    /// Multiplier applied to the per-hour slope (1000 turns V/h into mV/h)
    pub fn with_unit_scale(mut self, unit_scale: f64) -> Self {
        self.unit_scale = unit_scale;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Start of the history window for a sample taken at `newest`
    pub fn window_start(&self, newest: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        newest - self.window
    }

    /// Rate for `newest` given earlier `(timestamp, value)` samples.
    ///
    /// History outside `[newest - window, newest)` and non-finite values are
    /// ignored.
    pub fn estimate(
        &self,
        history: &[(DateTime<FixedOffset>, f64)],
        newest: (DateTime<FixedOffset>, f64),
    ) -> Result<f64> {
        let start = self.window_start(newest.0);

        let mut points: Vec<(DateTime<FixedOffset>, f64)> = history
            .iter()
            .filter(|(ts, _)| *ts >= start && *ts < newest.0)
            .copied()
            .collect();
        points.push(newest);
        points.retain(|(_, v)| v.is_finite());

        if points.len() < 2 {
            return Err(ProcessingError::RegressionInsufficientData {
                points: points.len(),
            });
        }

        let Some(oldest) = points.iter().map(|(ts, _)| *ts).min() else {
            return Err(ProcessingError::RegressionInsufficientData { points: 0 });
        };

        let xy: Vec<(f64, f64)> = points
            .iter()
            .map(|(ts, v)| ((*ts - oldest).num_milliseconds() as f64 / 60_000.0, *v))
            .collect();

        let slope = least_squares_slope(&xy).ok_or(ProcessingError::RegressionInsufficientData {
            points: points.len(),
        })?;

        Ok(round2(slope * 60.0 * self.unit_scale))
    }

    /// Rate for a status record against previously stored statuses.
    pub fn estimate_for(&self, history: &[StatusRecord], newest: &StatusRecord) -> Result<f64> {
        let value = newest.numeric_field(&self.field).ok_or(
            ProcessingError::RegressionInsufficientData { points: 0 },
        )?;

        let samples: Vec<(DateTime<FixedOffset>, f64)> = history
            .iter()
            .filter_map(|s| s.numeric_field(&self.field).map(|v| (s.timestamp, v)))
            .collect();

        self.estimate(&samples, (newest.timestamp, value))
    }
}

impl Default for ChangeRateEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordinary least-squares slope; `None` when x has no spread
fn least_squares_slope(points: &[(f64, f64)]) -> Option<f64> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }

    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in points {
        numerator += (x - mean_x) * (y - mean_y);
        denominator += (x - mean_x).powi(2);
    }

    if denominator.abs() < f64::EPSILON {
        return None;
    }

    Some(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minute: i64) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-12-06T12:00:00+01:00").unwrap() + Duration::minutes(minute)
    }

    #[test]
    fn test_increasing_series_gives_positive_rate() {
        // +0.01 V every 10 minutes -> 0.06 V/h
        let history = vec![(at(0), 4.00), (at(10), 4.01), (at(20), 4.02)];
        let rate = ChangeRateEstimator::new()
            .estimate(&history, (at(30), 4.03))
            .unwrap();
        assert_eq!(rate, 0.06);
    }

    #[test]
    fn test_unit_scale() {
        let history = vec![(at(0), 4.00), (at(30), 3.99)];
        let rate = ChangeRateEstimator::new()
            .with_unit_scale(1000.0)
            .estimate(&history, (at(60), 3.98))
            .unwrap();
        assert_eq!(rate, -20.0);
    }

    #[test]
    fn test_constant_series_is_zero() {
        let history = vec![(at(0), 3.9), (at(15), 3.9)];
        let rate = ChangeRateEstimator::new()
            .estimate(&history, (at(30), 3.9))
            .unwrap();
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn test_insufficient_data() {
        let estimator = ChangeRateEstimator::new();
        assert!(matches!(
            estimator.estimate(&[], (at(0), 4.0)),
            Err(ProcessingError::RegressionInsufficientData { points: 1 })
        ));

        // Outside the 90 minute window
        assert!(matches!(
            estimator.estimate(&[(at(-91), 4.2)], (at(0), 4.0)),
            Err(ProcessingError::RegressionInsufficientData { points: 1 })
        ));

        // Non-finite history is skipped
        assert!(matches!(
            estimator.estimate(&[(at(-5), f64::NAN)], (at(0), 4.0)),
            Err(ProcessingError::RegressionInsufficientData { points: 1 })
        ));
    }

    #[test]
    fn test_window_excludes_newest_timestamp_from_history() {
        // A stored copy of the newest sample must not count twice
        let rate = ChangeRateEstimator::new().estimate(&[(at(0), 4.0)], (at(0), 4.0));
        assert!(matches!(
            rate,
            Err(ProcessingError::RegressionInsufficientData { points: 1 })
        ));
    }

    #[test]
    fn test_estimate_for_status_records() {
        let mut older = StatusRecord::new("peter", at(-30));
        older.vbat_idle = Some(4.10);
        let mut no_reading = StatusRecord::new("peter", at(-20));
        no_reading.vbat_idle = None;
        let mut newest = StatusRecord::new("peter", at(0));
        newest.vbat_idle = Some(4.05);

        let rate = ChangeRateEstimator::new()
            .estimate_for(&[older, no_reading], &newest)
            .unwrap();
        assert_eq!(rate, -0.1);
    }
}
