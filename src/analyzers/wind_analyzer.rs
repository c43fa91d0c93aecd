use crate::error::Result;
use crate::models::{CompassSector, SeriesId, Statistic};
use crate::processors::bucket_aggregator::round2;
use crate::store::TelemetryStore;
use crate::utils::constants::DEFAULT_SPEED_FACTOR;
use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;
use std::collections::HashMap;

/// Wind bucket joined with the direction bucket of the same key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedBucket {
    pub timestamp: DateTime<FixedOffset>,
    pub avg: Option<f64>,
    pub max: Option<f64>,
    /// Prevailing compass sector index
    pub dir: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindSample {
    pub timestamp: DateTime<FixedOffset>,
    /// m/s
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionSample {
    pub timestamp: DateTime<FixedOffset>,
    /// Degrees
    pub value: f64,
    pub sector: usize,
    pub name: &'static str,
    pub arrow: &'static str,
}

pub(crate) fn hours(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0) as i64)
}

/// Read-side wind queries. All results are newest first.
pub struct WindAnalyzer<'a> {
    store: &'a dyn TelemetryStore,
    speed_factor: f64,
}

impl<'a> WindAnalyzer<'a> {
    pub fn new(store: &'a dyn TelemetryStore) -> Self {
        Self {
            store,
            speed_factor: DEFAULT_SPEED_FACTOR,
        }
    }

    pub fn with_speed_factor(mut self, speed_factor: f64) -> Self {
        self.speed_factor = speed_factor;
        self
    }

    /// Buckets covering `duration_hours` before the newest wind bucket.
    ///
    /// The window follows the data rather than the clock so a station that
    /// stopped reporting still shows its last hours.
    pub fn bucketed(&self, station_id: &str, duration_hours: f64) -> Result<Vec<MergedBucket>> {
        let Some(latest) = self.store.latest_bucket(station_id, SeriesId::WindSpeed)? else {
            return Ok(Vec::new());
        };
        let start = latest.bucket_timestamp - hours(duration_hours);

        let winds = self
            .store
            .find_buckets(station_id, SeriesId::WindSpeed, Some(start))?;
        let dirs: HashMap<i64, Option<f64>> = self
            .store
            .find_buckets(station_id, SeriesId::WindDirection, Some(start))?
            .into_iter()
            .map(|d| (d.bucket_timestamp.timestamp_millis(), d.get(Statistic::Mode)))
            .collect();

        Ok(winds
            .iter()
            .rev()
            .map(|w| MergedBucket {
                timestamp: w.bucket_timestamp,
                avg: w.get(Statistic::Mean),
                max: w.get(Statistic::Max),
                dir: dirs
                    .get(&w.bucket_timestamp.timestamp_millis())
                    .copied()
                    .flatten(),
            })
            .collect())
    }

    /// Raw wind samples of the last `duration_hours`, converted to m/s
    pub fn raw_wind(
        &self,
        station_id: &str,
        duration_hours: f64,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<WindSample>> {
        let samples = self.store.find_samples(
            station_id,
            SeriesId::WindSpeed,
            now - hours(duration_hours),
            None,
        )?;

        Ok(samples
            .iter()
            .rev()
            .filter(|p| p.timestamp <= now)
            .map(|p| WindSample {
                timestamp: p.timestamp,
                value: round2(p.value * self.speed_factor),
            })
            .collect())
    }

    pub fn directions(
        &self,
        station_id: &str,
        duration_hours: f64,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<DirectionSample>> {
        let samples = self.store.find_samples(
            station_id,
            SeriesId::WindDirection,
            now - hours(duration_hours),
            None,
        )?;

        Ok(samples
            .iter()
            .rev()
            .filter(|p| p.timestamp <= now)
            .map(|p| {
                let sector = CompassSector::from_degrees(p.value);
                DirectionSample {
                    timestamp: p.timestamp,
                    value: p.value,
                    sector: sector.index(),
                    name: sector.abbreviation(),
                    arrow: sector.arrow(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BucketRecord, RawSamplePoint};
    use crate::store::InMemoryStore;
    use pretty_assertions::assert_eq;

    fn ts(hms: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(&format!("2024-01-01T{}+01:00", hms)).unwrap()
    }

    fn bucket(hms: &str, series: SeriesId, stats: &[(Statistic, f64)]) -> BucketRecord {
        BucketRecord {
            bucket_timestamp: ts(hms),
            station_id: "peter".to_string(),
            series_id: series,
            values: stats.iter().copied().collect(),
        }
    }

    #[test]
    fn test_bucketed_merges_direction_and_anchors_on_latest() -> Result<()> {
        let store = InMemoryStore::new();
        store.insert_buckets(&[
            bucket("01:00:00", SeriesId::WindSpeed, &[(Statistic::Mean, 9.0), (Statistic::Max, 9.5)]),
            bucket("10:00:00", SeriesId::WindSpeed, &[(Statistic::Mean, 1.0), (Statistic::Max, 2.0)]),
            bucket("10:15:00", SeriesId::WindSpeed, &[(Statistic::Mean, 1.5), (Statistic::Max, 3.0)]),
            bucket("10:15:00", SeriesId::WindDirection, &[(Statistic::Mode, 4.0)]),
        ])?;

        let merged = WindAnalyzer::new(&store).bucketed("peter", 6.0)?;
        assert_eq!(
            merged,
            vec![
                MergedBucket {
                    timestamp: ts("10:15:00"),
                    avg: Some(1.5),
                    max: Some(3.0),
                    dir: Some(4.0),
                },
                MergedBucket {
                    timestamp: ts("10:00:00"),
                    avg: Some(1.0),
                    max: Some(2.0),
                    dir: None,
                },
            ]
        );

        assert!(WindAnalyzer::new(&store).bucketed("paul", 6.0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_raw_queries_convert_and_sort_newest_first() -> Result<()> {
        let store = InMemoryStore::new();
        store.insert_samples(&[
            RawSamplePoint::new(36.0, ts("11:00:00"), "peter", SeriesId::WindSpeed),
            RawSamplePoint::new(72.0, ts("11:30:00"), "peter", SeriesId::WindSpeed),
            RawSamplePoint::new(90.0, ts("11:30:00"), "peter", SeriesId::WindDirection),
            RawSamplePoint::new(10.0, ts("02:00:00"), "peter", SeriesId::WindSpeed),
        ])?;

        let analyzer = WindAnalyzer::new(&store).with_speed_factor(0.1);
        let wind = analyzer.raw_wind("peter", 6.0, ts("12:00:00"))?;
        assert_eq!(
            wind,
            vec![
                WindSample { timestamp: ts("11:30:00"), value: 7.2 },
                WindSample { timestamp: ts("11:00:00"), value: 3.6 },
            ]
        );

        let dirs = analyzer.directions("peter", 6.0, ts("12:00:00"))?;
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].sector, 2);
        assert_eq!(dirs[0].name, "W");
        Ok(())
    }
}
