use crate::error::{ProcessingError, Result};
use crate::models::{RawSamplePoint, SeriesId};
use crate::readers::WindLog;
use crate::utils::constants::{DEFAULT_DIRECTION_ADJUSTMENT, SECONDS_PER_DAY};
use chrono::{DateTime, Duration, FixedOffset, TimeZone};

/// Wind and direction points rebuilt from one line's compressed log
#[derive(Debug, Default)]
pub struct ReconstructedSeries {
    pub speeds: Vec<RawSamplePoint>,
    pub directions: Vec<RawSamplePoint>,
    /// Per-series pairing failures; the other series is still usable
    pub warnings: Vec<ProcessingError>,
}

impl ReconstructedSeries {
    pub fn points(&self, series: SeriesId) -> &[RawSamplePoint] {
        match series {
            SeriesId::WindSpeed => &self.speeds,
            SeriesId::WindDirection => &self.directions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.speeds.is_empty() && self.directions.is_empty()
    }
}

pub struct TimestampReconstructor {
    direction_adjustment: i64,
}

impl TimestampReconstructor {
    pub fn new() -> Self {
        Self {
            direction_adjustment: DEFAULT_DIRECTION_ADJUSTMENT,
        }
    }

    pub fn with_direction_adjustment(mut self, degrees: i64) -> Self {
        self.direction_adjustment = degrees;
        self
    }

    /// Expand `count` samples logged between `start_s` and `end_s` seconds
    /// after local midnight of `base` into absolute timestamps.
    ///
    /// Endpoints are inclusive and each offset is rounded to the nearest
    /// second (ties to even). Date and offset come from `base`; there is no
    /// day rollover.
    pub fn generate(
        base: DateTime<FixedOffset>,
        start_s: i64,
        end_s: i64,
        count: i64,
    ) -> Result<Vec<DateTime<FixedOffset>>> {
        if count < 1 {
            return Ok(Vec::new());
        }

        Self::check_range(start_s, end_s)?;

        let day_start = local_midnight(base)?;

        let offsets: Vec<i64> = if count == 1 {
            vec![start_s]
        } else {
            let step = (end_s - start_s) as f64 / (count - 1) as f64;
            (0..count)
                .map(|i| (start_s as f64 + i as f64 * step).round_ties_even() as i64)
                .collect()
        };

        Ok(offsets
            .into_iter()
            .map(|s| day_start + Duration::seconds(s))
            .collect())
    }

    fn check_range(start_s: i64, end_s: i64) -> Result<()> {
        if !(0 <= start_s && start_s <= end_s && end_s <= SECONDS_PER_DAY) {
            return Err(ProcessingError::Range { start_s, end_s });
        }
        Ok(())
    }

    /// Zip decoded values 1:1 with reconstructed timestamps
    pub fn pair(
        values: &[f64],
        timestamps: &[DateTime<FixedOffset>],
        station_id: &str,
        series: SeriesId,
    ) -> Result<Vec<RawSamplePoint>> {
        if values.len() != timestamps.len() {
            return Err(ProcessingError::LengthMismatch {
                series,
                values: values.len(),
                timestamps: timestamps.len(),
            });
        }

        Ok(values
            .iter()
            .zip(timestamps)
            .map(|(value, ts)| RawSamplePoint::new(*value, *ts, station_id, series))
            .collect())
    }

    /// Rebuild both wind series of a line. A range error aborts the
    /// reconstruction; a length mismatch only empties the affected series.
    pub fn reconstruct(
        &self,
        station_id: &str,
        base: DateTime<FixedOffset>,
        log: &WindLog,
    ) -> Result<ReconstructedSeries> {
        let mut series = ReconstructedSeries::default();

        // `len` comes straight off the wire; only expand it when at least
        // one series can use the timestamps
        let expected = u64::try_from(log.len).unwrap_or(0);
        let fits = |n: usize| n as u64 == expected;
        if !fits(log.speeds.len()) && !fits(log.directions.len()) {
            if log.len >= 1 {
                Self::check_range(log.log_first, log.log_last)?;
            }
            let timestamps = usize::try_from(expected).unwrap_or(usize::MAX);
            for (id, values) in [
                (SeriesId::WindSpeed, log.speeds.len()),
                (SeriesId::WindDirection, log.directions.len()),
            ] {
                series.warnings.push(ProcessingError::LengthMismatch {
                    series: id,
                    values,
                    timestamps,
                });
            }
            return Ok(series);
        }

        let timestamps = Self::generate(base, log.log_first, log.log_last, log.len)?;

        let speeds: Vec<f64> = log.speeds.iter().map(|v| *v as f64).collect();
        match Self::pair(&speeds, &timestamps, station_id, SeriesId::WindSpeed) {
            Ok(points) => series.speeds = points,
            Err(e) => series.warnings.push(e),
        }

        let directions: Vec<f64> = log
            .directions
            .iter()
            .map(|d| self.adjust_direction(*d) as f64)
            .collect();
        match Self::pair(&directions, &timestamps, station_id, SeriesId::WindDirection) {
            Ok(points) => series.directions = points,
            Err(e) => series.warnings.push(e),
        }

        Ok(series)
    }

    pub fn adjust_direction(&self, raw: i64) -> i64 {
        // Reduce both terms first so any decoded i64 stays in range
        (raw.rem_euclid(360) + self.direction_adjustment.rem_euclid(360)).rem_euclid(360)
    }
}

impl Default for TimestampReconstructor {
    fn default() -> Self {
        Self::new()
    }
}

/// Midnight of `ts`'s calendar day in its own offset
pub fn local_midnight(ts: DateTime<FixedOffset>) -> Result<DateTime<FixedOffset>> {
    let naive = ts
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("No midnight for {}", ts)))?;

    ts.offset()
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("No midnight for {}", ts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-01T13:45:10+01:00").unwrap()
    }

    fn times(ts: &[DateTime<FixedOffset>]) -> Vec<String> {
        ts.iter().map(|t| t.format("%H:%M:%S").to_string()).collect()
    }

    #[test]
    fn test_generate_even_spacing() {
        let ts = TimestampReconstructor::generate(base(), 0, 60, 3).unwrap();
        assert_eq!(times(&ts), vec!["00:00:00", "00:00:30", "00:01:00"]);
        assert_eq!(ts[0].date_naive(), base().date_naive());
        assert_eq!(ts[0].offset(), base().offset());
    }

    #[test]
    fn test_generate_rounds_half_to_even() {
        // step = 2.5s -> 0, 2.5, 5, 7.5 -> 0, 2, 5, 8
        let ts = TimestampReconstructor::generate(base(), 0, 10, 5).unwrap();
        assert_eq!(
            times(&ts),
            vec!["00:00:00", "00:00:02", "00:00:05", "00:00:08", "00:00:10"]
        );
    }

    #[test]
    fn test_generate_small_counts() {
        assert!(TimestampReconstructor::generate(base(), 10, 20, 0)
            .unwrap()
            .is_empty());
        assert!(TimestampReconstructor::generate(base(), 50, 20, -1)
            .unwrap()
            .is_empty());

        let single = TimestampReconstructor::generate(base(), 3600, 7200, 1).unwrap();
        assert_eq!(times(&single), vec!["01:00:00"]);
    }

    #[test]
    fn test_generate_range_errors() {
        for (start, end) in [(-1, 10), (20, 10), (0, 86401)] {
            assert!(matches!(
                TimestampReconstructor::generate(base(), start, end, 2),
                Err(ProcessingError::Range { .. })
            ));
        }
        assert!(TimestampReconstructor::generate(base(), 0, 86400, 2).is_ok());
    }

    #[test]
    fn test_pair_length_mismatch() {
        let ts = TimestampReconstructor::generate(base(), 0, 60, 3).unwrap();
        let result = TimestampReconstructor::pair(&[1.0, 2.0], &ts, "peter", SeriesId::WindSpeed);
        assert!(matches!(
            result,
            Err(ProcessingError::LengthMismatch {
                values: 2,
                timestamps: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_direction_adjustment_wraps() {
        let reconstructor = TimestampReconstructor::new();
        assert_eq!(reconstructor.adjust_direction(0), 345);
        assert_eq!(reconstructor.adjust_direction(90), 75);
        assert_eq!(reconstructor.adjust_direction(375), 0);
        assert_eq!(
            TimestampReconstructor::new()
                .with_direction_adjustment(0)
                .adjust_direction(359),
            359
        );
    }

    #[test]
    fn test_direction_adjustment_handles_extreme_values() {
        let reconstructor = TimestampReconstructor::new();
        assert_eq!(reconstructor.adjust_direction(i64::MIN), 337);
        assert_eq!(reconstructor.adjust_direction(i64::MAX), 352);
        assert_eq!(
            TimestampReconstructor::new()
                .with_direction_adjustment(i64::MAX)
                .adjust_direction(i64::MAX),
            14
        );
    }

    #[test]
    fn test_reconstruct_huge_len_is_a_mismatch() {
        let log = WindLog {
            log_first: 0,
            log_last: 60,
            len: 9_000_000_000_000_000_000,
            speeds: vec![1, 2],
            directions: vec![0, 0],
        };

        let series = TimestampReconstructor::new()
            .reconstruct("peter", base(), &log)
            .unwrap();

        assert!(series.is_empty());
        assert_eq!(series.warnings.len(), 2);
        assert!(series
            .warnings
            .iter()
            .all(|e| matches!(e, ProcessingError::LengthMismatch { values: 2, .. })));
    }

    #[test]
    fn test_reconstruct_range_error_wins_over_mismatch() {
        let log = WindLog {
            log_first: 50,
            log_last: 10,
            len: 5,
            speeds: vec![1, 2],
            directions: vec![0],
        };

        assert!(matches!(
            TimestampReconstructor::new().reconstruct("peter", base(), &log),
            Err(ProcessingError::Range { .. })
        ));
    }

    #[test]
    fn test_reconstruct_keeps_good_series_on_mismatch() {
        let log = WindLog {
            log_first: 0,
            log_last: 60,
            len: 3,
            speeds: vec![10, 20, 30],
            directions: vec![0, 90],
        };

        let series = TimestampReconstructor::new()
            .reconstruct("peter", base(), &log)
            .unwrap();

        assert_eq!(series.speeds.len(), 3);
        assert!(series.directions.is_empty());
        assert_eq!(series.warnings.len(), 1);
        assert_eq!(series.points(SeriesId::WindSpeed)[2].value, 30.0);
    }
}
