use crate::error::Result;
use crate::models::{SeriesId, Watermark};
use crate::store::TelemetryStore;
use crate::utils::constants::DEFAULT_WATERMARK_LOOKBACK_DAYS;
use chrono::{DateTime, Duration, FixedOffset, Local};

/// Per (station, series) aggregation cursor on top of a `TelemetryStore`
pub struct WatermarkStore<'a> {
    store: &'a dyn TelemetryStore,
    lookback: Duration,
}

impl<'a> WatermarkStore<'a> {
    pub fn new(store: &'a dyn TelemetryStore) -> Self {
        Self {
            store,
            lookback: Duration::days(DEFAULT_WATERMARK_LOOKBACK_DAYS),
        }
    }

    /// Cursor used for stations that have never been aggregated
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn get(&self, station_id: &str, series: SeriesId) -> Result<DateTime<FixedOffset>> {
        self.get_at(station_id, series, Local::now().fixed_offset())
    }

    /// Stored boundary, or `now - lookback` when there is none
    pub fn get_at(
        &self,
        station_id: &str,
        series: SeriesId,
        now: DateTime<FixedOffset>,
    ) -> Result<DateTime<FixedOffset>> {
        Ok(match self.store.get_watermark(station_id, series)? {
            Some(watermark) => watermark.last_boundary,
            None => now - self.lookback,
        })
    }

    /// Last writer wins. Moving the cursor backwards is allowed; it only
    /// makes the next pass re-scan more raw data.
    pub fn set(
        &self,
        station_id: &str,
        series: SeriesId,
        boundary: DateTime<FixedOffset>,
    ) -> Result<()> {
        if let Some(previous) = self.store.get_watermark(station_id, series)? {
            if boundary < previous.last_boundary {
                tracing::warn!(
                    "Watermark for {}/{} moves back from {} to {}",
                    station_id,
                    series,
                    previous.last_boundary,
                    boundary
                );
            }
        }

        self.store
            .upsert_watermark(&Watermark::new(station_id, series, boundary))
    }
}
