use crate::error::{ProcessingError, Result};
use crate::models::{BucketRecord, SeriesId, Statistic};
use crate::processors::timestamp_reconstructor::local_midnight;
use crate::utils::constants::DEFAULT_BUCKET_MINUTES;
use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Numeric point fed to the aggregator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedValue {
    pub timestamp: DateTime<FixedOffset>,
    pub value: f64,
}

impl TimedValue {
    pub fn new(timestamp: DateTime<FixedOffset>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Which timestamp an aggregation pass reports as the new watermark.
///
/// `BatchMinimum` re-scans every bucket of the batch on the next pass.
/// `LatestBucketStart` only re-scans the newest bucket but can miss late
/// points older than it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Minimum timestamp across every input point
    #[default]
    BatchMinimum,
    /// Earliest point of the newest bucket
    LatestBucketStart,
}

#[derive(Debug, Clone, Default)]
pub struct AggregationOutput {
    /// One record per bucket, sorted by bucket timestamp
    pub records: Vec<BucketRecord>,
    /// Next watermark; `None` when there was nothing to aggregate
    pub boundary: Option<DateTime<FixedOffset>>,
}

struct BucketAccumulator {
    values: Vec<f64>,
    earliest: DateTime<FixedOffset>,
    min: TimedValue,
    max: TimedValue,
}

impl BucketAccumulator {
    fn new(point: TimedValue) -> Self {
        Self {
            values: Vec::new(),
            earliest: point.timestamp,
            min: point,
            max: point,
        }
    }

    fn push(&mut self, point: TimedValue) {
        self.values.push(point.value);
        if point.timestamp < self.earliest {
            self.earliest = point.timestamp;
        }
        // Strict comparisons keep the first-seen point on ties
        if point.value < self.min.value {
            self.min = point;
        }
        if point.value > self.max.value {
            self.max = point;
        }
    }

    fn statistic(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Min => self.min.value,
            Statistic::Max => self.max.value,
            Statistic::Median => median(&self.values).unwrap_or(f64::NAN),
            Statistic::Mode => mode_value(&self.values).unwrap_or(f64::NAN),
            Statistic::Mean => mean(&self.values).unwrap_or(f64::NAN),
        }
    }
}

/// Downsamples a point stream into fixed windows.
///
/// Bucket labels sit on window midpoints anchored to local midnight of the
/// first point, so a given timestamp always lands in the same bucket no
/// matter where a pass starts.
///
/// Input order contract: callers must pass points in one consistent
/// chronological order. `min`, `max`, `mean` and `median` do not depend on
/// it, but `mode` breaks count ties in favour of the value that reached the
/// winning count first.
pub struct BucketAggregator {
    window_minutes: u32,
    statistics: Vec<Statistic>,
    boundary_policy: BoundaryPolicy,
}

impl BucketAggregator {
    pub fn new(window_minutes: u32, statistics: Vec<Statistic>) -> Self {
        Self {
            window_minutes,
            statistics,
            boundary_policy: BoundaryPolicy::default(),
        }
    }

    pub fn with_boundary_policy(mut self, boundary_policy: BoundaryPolicy) -> Self {
        self.boundary_policy = boundary_policy;
        self
    }

    pub fn window_minutes(&self) -> u32 {
        self.window_minutes
    }

    pub fn statistics(&self) -> &[Statistic] {
        &self.statistics
    }

    fn window_ms(&self) -> Result<i64> {
        if self.window_minutes == 0 {
            return Err(ProcessingError::Config(
                "Bucket window must be at least one minute".to_string(),
            ));
        }
        Ok(self.window_minutes as i64 * 60_000)
    }

    /// Bucket label (epoch ms) for a point at `x_ms`, given the shifted
    /// day anchor `day0_ms`
    pub fn bucket_key_ms(day0_ms: i64, x_ms: i64, window_ms: i64) -> i64 {
        day0_ms + (x_ms - day0_ms).div_euclid(window_ms) * window_ms + window_ms / 2
    }

    pub fn aggregate(
        &self,
        station_id: &str,
        series: SeriesId,
        points: &[TimedValue],
    ) -> Result<AggregationOutput> {
        let Some(first) = points.first() else {
            return Ok(AggregationOutput::default());
        };

        let window_ms = self.window_ms()?;
        let offset = *first.timestamp.offset();
        let day0_ms = local_midnight(first.timestamp)?.timestamp_millis() + window_ms / 2;

        let mut buckets: BTreeMap<i64, BucketAccumulator> = BTreeMap::new();
        for point in points {
            let key = Self::bucket_key_ms(day0_ms, point.timestamp.timestamp_millis(), window_ms);
            buckets
                .entry(key)
                .or_insert_with(|| BucketAccumulator::new(*point))
                .push(*point);
        }

        let mut records = Vec::with_capacity(buckets.len());
        for (key, bucket) in &buckets {
            let bucket_timestamp = offset.timestamp_millis_opt(*key).single().ok_or_else(|| {
                ProcessingError::InvalidFormat(format!("Bucket key {} out of range", key))
            })?;

            let values = self
                .statistics
                .iter()
                .map(|stat| (*stat, round2(bucket.statistic(*stat))))
                .collect();

            records.push(BucketRecord {
                bucket_timestamp,
                station_id: station_id.to_string(),
                series_id: series,
                values,
            });
        }

        let boundary = match self.boundary_policy {
            BoundaryPolicy::BatchMinimum => points.iter().map(|p| p.timestamp).min(),
            BoundaryPolicy::LatestBucketStart => buckets.values().next_back().map(|b| b.earliest),
        };

        Ok(AggregationOutput { records, boundary })
    }
}

impl Default for BucketAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_MINUTES, vec![Statistic::Mean, Statistic::Max])
    }
}

/// Two decimals, exact halves to even (0.125 -> 0.12, 0.375 -> 0.38)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Most frequent value; on equal counts the value that reached the count
/// first in `values` order wins.
pub fn mode_value(values: &[f64]) -> Option<f64> {
    let first = *values.first()?;
    let mut counts: HashMap<u64, usize> = HashMap::new();
    let mut best_value = first;
    let mut best_count = 0;

    for &value in values {
        // +0.0 folds -0.0 into the same bucket
        let count = counts.entry((value + 0.0).to_bits()).or_insert(0);
        *count += 1;
        if *count > best_count {
            best_count = *count;
            best_value = value;
        }
    }

    Some(best_value)
}
