pub mod memory;
pub mod watermark;

pub use memory::InMemoryStore;
pub use watermark::WatermarkStore;

use crate::error::Result;
use crate::models::{BucketRecord, RawSamplePoint, SeriesId, StatusRecord, Watermark};
use chrono::{DateTime, FixedOffset};

/// Persistence contract for statuses, raw samples, buckets and watermarks.
///
/// Range queries return records in ascending timestamp order. Any backend
/// failure surfaces as `ProcessingError::StoreUnavailable`.
pub trait TelemetryStore: Send + Sync {
    fn insert_status(&self, status: &StatusRecord) -> Result<()>;

    fn insert_samples(&self, samples: &[RawSamplePoint]) -> Result<()>;

    /// Statuses with `since <= timestamp`, and `timestamp < until` when given
    fn find_statuses(
        &self,
        station_id: &str,
        since: DateTime<FixedOffset>,
        until: Option<DateTime<FixedOffset>>,
    ) -> Result<Vec<StatusRecord>>;

    /// Newest statuses first, skipping `skip` of them
    fn latest_statuses(&self, station_id: &str, skip: usize, limit: usize)
        -> Result<Vec<StatusRecord>>;

    fn find_samples(
        &self,
        station_id: &str,
        series: SeriesId,
        since: DateTime<FixedOffset>,
        until: Option<DateTime<FixedOffset>>,
    ) -> Result<Vec<RawSamplePoint>>;

    fn find_buckets(
        &self,
        station_id: &str,
        series: SeriesId,
        since: Option<DateTime<FixedOffset>>,
    ) -> Result<Vec<BucketRecord>>;

    fn latest_bucket(&self, station_id: &str, series: SeriesId) -> Result<Option<BucketRecord>>;

    /// Delete buckets by key, returning how many existed
    fn delete_buckets(
        &self,
        station_id: &str,
        series: SeriesId,
        keys: &[DateTime<FixedOffset>],
    ) -> Result<usize>;

    fn insert_buckets(&self, records: &[BucketRecord]) -> Result<()>;

    /// Overwrite every bucket whose key appears in `records`.
    ///
    /// Backends that can do this in one operation should override it; the
    /// default deletes then inserts.
    fn replace_buckets(&self, station_id: &str, series: SeriesId, records: &[BucketRecord]) -> Result<()> {
        let keys: Vec<_> = records.iter().map(|r| r.bucket_timestamp).collect();
        self.delete_buckets(station_id, series, &keys)?;
        self.insert_buckets(records)
    }

    fn get_watermark(&self, station_id: &str, series: SeriesId) -> Result<Option<Watermark>>;

    fn upsert_watermark(&self, watermark: &Watermark) -> Result<()>;

    /// Stations that have stored at least one status or sample
    fn station_ids(&self) -> Result<Vec<String>>;
}
