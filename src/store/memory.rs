use crate::error::{ProcessingError, Result};
use crate::models::{BucketRecord, RawSamplePoint, SeriesId, StatusRecord, Watermark};
use crate::store::TelemetryStore;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type SeriesKey = (String, SeriesId);

#[derive(Default)]
struct StoreData {
    statuses: BTreeMap<String, Vec<StatusRecord>>,
    samples: BTreeMap<SeriesKey, Vec<RawSamplePoint>>,
    /// Keyed by bucket instant in epoch ms
    buckets: BTreeMap<SeriesKey, BTreeMap<i64, BucketRecord>>,
    watermarks: BTreeMap<SeriesKey, Watermark>,
}

/// On-disk form of the store
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    statuses: Vec<StatusRecord>,
    samples: Vec<RawSamplePoint>,
    buckets: Vec<BucketRecord>,
    watermarks: Vec<Watermark>,
}

/// Thread-safe in-process store, optionally persisted as a JSON snapshot
#[derive(Default)]
pub struct InMemoryStore {
    data: RwLock<StoreData>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot, or start empty when `path` does not exist yet
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No store snapshot at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let store = Self::new();
        store.insert_snapshot(snapshot)?;

        tracing::debug!("Loaded store snapshot from {}", path.display());
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = {
            let data = self.read()?;
            Snapshot {
                statuses: data.statuses.values().flatten().cloned().collect(),
                samples: data.samples.values().flatten().cloned().collect(),
                buckets: data
                    .buckets
                    .values()
                    .flat_map(|b| b.values())
                    .cloned()
                    .collect(),
                watermarks: data.watermarks.values().cloned().collect(),
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        serde_json::to_writer(BufWriter::new(File::create(path)?), &snapshot)?;

        tracing::debug!("Saved store snapshot to {}", path.display());
        Ok(())
    }

    fn insert_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        for status in &snapshot.statuses {
            self.insert_status(status)?;
        }
        self.insert_samples(&snapshot.samples)?;
        self.insert_buckets(&snapshot.buckets)?;
        for watermark in &snapshot.watermarks {
            self.upsert_watermark(watermark)?;
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreData>> {
        self.data
            .read()
            .map_err(|_| ProcessingError::StoreUnavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreData>> {
        self.data
            .write()
            .map_err(|_| ProcessingError::StoreUnavailable("store lock poisoned".to_string()))
    }
}

fn series_key(station_id: &str, series: SeriesId) -> SeriesKey {
    (station_id.to_string(), series)
}

fn in_range(
    ts: DateTime<FixedOffset>,
    since: DateTime<FixedOffset>,
    until: Option<DateTime<FixedOffset>>,
) -> bool {
    ts >= since && until.map_or(true, |u| ts < u)
}

impl TelemetryStore for InMemoryStore {
    fn insert_status(&self, status: &StatusRecord) -> Result<()> {
        self.write()?
            .statuses
            .entry(status.station_id.clone())
            .or_default()
            .push(status.clone());
        Ok(())
    }

    fn insert_samples(&self, samples: &[RawSamplePoint]) -> Result<()> {
        let mut data = self.write()?;
        for sample in samples {
            data.samples
                .entry(series_key(&sample.station_id, sample.series_id))
                .or_default()
                .push(sample.clone());
        }
        Ok(())
    }

    fn find_statuses(
        &self,
        station_id: &str,
        since: DateTime<FixedOffset>,
        until: Option<DateTime<FixedOffset>>,
    ) -> Result<Vec<StatusRecord>> {
        let data = self.read()?;
        let mut found: Vec<StatusRecord> = data
            .statuses
            .get(station_id)
            .into_iter()
            .flatten()
            .filter(|s| in_range(s.timestamp, since, until))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.timestamp);
        Ok(found)
    }

    fn latest_statuses(
        &self,
        station_id: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<StatusRecord>> {
        let data = self.read()?;
        let mut all: Vec<&StatusRecord> = data.statuses.get(station_id).into_iter().flatten().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(all.into_iter().skip(skip).take(limit).cloned().collect())
    }

    fn find_samples(
        &self,
        station_id: &str,
        series: SeriesId,
        since: DateTime<FixedOffset>,
        until: Option<DateTime<FixedOffset>>,
    ) -> Result<Vec<RawSamplePoint>> {
        let data = self.read()?;
        let mut found: Vec<RawSamplePoint> = data
            .samples
            .get(&series_key(station_id, series))
            .into_iter()
            .flatten()
            .filter(|p| in_range(p.timestamp, since, until))
            .cloned()
            .collect();
        // Stable, so duplicates keep insertion order
        found.sort_by_key(|p| p.timestamp);
        Ok(found)
    }

    fn find_buckets(
        &self,
        station_id: &str,
        series: SeriesId,
        since: Option<DateTime<FixedOffset>>,
    ) -> Result<Vec<BucketRecord>> {
        let data = self.read()?;
        let from = since.map_or(i64::MIN, |s| s.timestamp_millis());
        Ok(data
            .buckets
            .get(&series_key(station_id, series))
            .map(|b| b.range(from..).map(|(_, r)| r.clone()).collect())
            .unwrap_or_default())
    }

    fn latest_bucket(&self, station_id: &str, series: SeriesId) -> Result<Option<BucketRecord>> {
        let data = self.read()?;
        Ok(data
            .buckets
            .get(&series_key(station_id, series))
            .and_then(|b| b.values().next_back().cloned()))
    }

    fn delete_buckets(
        &self,
        station_id: &str,
        series: SeriesId,
        keys: &[DateTime<FixedOffset>],
    ) -> Result<usize> {
        let mut data = self.write()?;
        let Some(buckets) = data.buckets.get_mut(&series_key(station_id, series)) else {
            return Ok(0);
        };
        Ok(keys
            .iter()
            .filter(|k| buckets.remove(&k.timestamp_millis()).is_some())
            .count())
    }

    fn insert_buckets(&self, records: &[BucketRecord]) -> Result<()> {
        let mut data = self.write()?;
        for record in records {
            data.buckets
                .entry(series_key(&record.station_id, record.series_id))
                .or_default()
                .insert(record.bucket_timestamp.timestamp_millis(), record.clone());
        }
        Ok(())
    }

    /// Single write-lock section, so readers never see a half-replaced set
    fn replace_buckets(&self, station_id: &str, series: SeriesId, records: &[BucketRecord]) -> Result<()> {
        let mut data = self.write()?;
        let buckets = data.buckets.entry(series_key(station_id, series)).or_default();
        for record in records {
            buckets.insert(record.bucket_timestamp.timestamp_millis(), record.clone());
        }
        Ok(())
    }

    fn get_watermark(&self, station_id: &str, series: SeriesId) -> Result<Option<Watermark>> {
        Ok(self
            .read()?
            .watermarks
            .get(&series_key(station_id, series))
            .cloned())
    }

    fn upsert_watermark(&self, watermark: &Watermark) -> Result<()> {
        self.write()?.watermarks.insert(
            series_key(&watermark.station_id, watermark.series_name),
            watermark.clone(),
        );
        Ok(())
    }

    fn station_ids(&self) -> Result<Vec<String>> {
        let data = self.read()?;
        let ids: BTreeSet<String> = data
            .statuses
            .keys()
            .cloned()
            .chain(data.samples.keys().map(|(station, _)| station.clone()))
            .collect();
        Ok(ids.into_iter().collect())
    }
}
