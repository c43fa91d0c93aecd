use crate::error::Result;
use crate::models::{SeriesId, Statistic};
use crate::processors::bucket_aggregator::{BoundaryPolicy, BucketAggregator, TimedValue};
use crate::store::{TelemetryStore, WatermarkStore};
use crate::utils::constants::{
    DEFAULT_BUCKET_MINUTES, DEFAULT_SPEED_FACTOR, DEFAULT_WATERMARK_LOOKBACK_DAYS,
};
use chrono::{DateTime, Duration, FixedOffset};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// What one incremental pass did
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSummary {
    pub station_id: String,
    pub series: SeriesId,
    pub watermark: DateTime<FixedOffset>,
    pub points: usize,
    pub buckets: usize,
    pub next_watermark: Option<DateTime<FixedOffset>>,
}

/// Runs watermark read, raw query, aggregation, bucket replace and
/// watermark advance as one unit per (station, series).
///
/// Passes for the same key are serialized; different keys run freely.
pub struct AggregationRunner {
    window_minutes: u32,
    boundary_policy: BoundaryPolicy,
    speed_factor: f64,
    lookback: Duration,
    statistics: BTreeMap<SeriesId, Vec<Statistic>>,
    locks: Mutex<HashMap<(String, SeriesId), Arc<Mutex<()>>>>,
}

impl AggregationRunner {
    pub fn new(window_minutes: u32) -> Self {
        Self {
            window_minutes,
            boundary_policy: BoundaryPolicy::default(),
            speed_factor: DEFAULT_SPEED_FACTOR,
            lookback: Duration::days(DEFAULT_WATERMARK_LOOKBACK_DAYS),
            statistics: SeriesId::ALL
                .iter()
                .map(|s| (*s, s.default_statistics()))
                .collect(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_boundary_policy(mut self, boundary_policy: BoundaryPolicy) -> Self {
        self.boundary_policy = boundary_policy;
        self
    }

    pub fn with_speed_factor(mut self, speed_factor: f64) -> Self {
        self.speed_factor = speed_factor;
        self
    }

    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_statistics(mut self, series: SeriesId, statistics: Vec<Statistic>) -> Self {
        self.statistics.insert(series, statistics);
        self
    }

    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    fn key_lock(&self, station_id: &str, series: SeriesId) -> Arc<Mutex<()>> {
        // The guarded value is (), so a poisoned lock carries no bad state
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry((station_id.to_string(), series))
            .or_default()
            .clone()
    }

    /// Drop the key's entry once no other pass holds or waits on it, so
    /// the map only tracks keys that are in flight
    fn release_key_lock(&self, station_id: &str, series: SeriesId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let key = (station_id.to_string(), series);
        let idle = locks
            .get(&key)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(&key);
        }
        // Our handle must be gone before the map unlocks, or the next
        // releaser would still count it
        drop(lock);
        drop(locks);
    }

    /// One incremental pass. `now` only matters for stations without a
    /// stored watermark.
    pub fn run(
        &self,
        store: &dyn TelemetryStore,
        station_id: &str,
        series: SeriesId,
        now: DateTime<FixedOffset>,
    ) -> Result<AggregationSummary> {
        let lock = self.key_lock(station_id, series);
        let result = {
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            self.run_locked(store, station_id, series, now)
        };
        self.release_key_lock(station_id, series, lock);
        result
    }

    fn run_locked(
        &self,
        store: &dyn TelemetryStore,
        station_id: &str,
        series: SeriesId,
        now: DateTime<FixedOffset>,
    ) -> Result<AggregationSummary> {
        let watermarks = WatermarkStore::new(store).with_lookback(self.lookback);
        let watermark = watermarks.get_at(station_id, series, now)?;

        let samples = store.find_samples(station_id, series, watermark, None)?;
        let points: Vec<TimedValue> = samples
            .iter()
            .map(|p| TimedValue::new(p.timestamp, series.aggregation_value(p.value, self.speed_factor)))
            .collect();

        let statistics = self
            .statistics
            .get(&series)
            .cloned()
            .unwrap_or_else(|| series.default_statistics());
        let output = BucketAggregator::new(self.window_minutes, statistics)
            .with_boundary_policy(self.boundary_policy)
            .aggregate(station_id, series, &points)?;

        if !output.records.is_empty() {
            store.replace_buckets(station_id, series, &output.records)?;
        }
        if let Some(boundary) = output.boundary {
            watermarks.set(station_id, series, boundary)?;
        }

        tracing::info!(
            "Aggregated {}/{}: {} points since {} into {} buckets",
            station_id,
            series,
            points.len(),
            watermark,
            output.records.len()
        );

        Ok(AggregationSummary {
            station_id: station_id.to_string(),
            series,
            watermark,
            points: points.len(),
            buckets: output.records.len(),
            next_watermark: output.boundary,
        })
    }

    pub fn run_all(
        &self,
        store: &dyn TelemetryStore,
        station_id: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<AggregationSummary>> {
        SeriesId::ALL
            .iter()
            .map(|series| self.run(store, station_id, *series, now))
            .collect()
    }
}

impl Default for AggregationRunner {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_MINUTES)
    }
}
