use crate::analyzers::wind_analyzer::hours;
use crate::error::Result;
use crate::models::{ErrorCount, FieldValue, StatusRecord};
use crate::processors::bucket_aggregator::round2;
use crate::store::TelemetryStore;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldPoint {
    pub timestamp: DateTime<FixedOffset>,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorHistoryEntry {
    pub timestamp: DateTime<FixedOffset>,
    /// Gap to the previous status, which tells how long the station was
    /// trying to get a report out
    pub minutes_since_previous: f64,
    pub errors: Vec<ErrorCount>,
}

pub struct StatusAnalyzer<'a> {
    store: &'a dyn TelemetryStore,
}

impl<'a> StatusAnalyzer<'a> {
    pub fn new(store: &'a dyn TelemetryStore) -> Self {
        Self { store }
    }

    /// History of one status field (wire name), newest first. Statuses
    /// without the field are left out.
    pub fn status_values(
        &self,
        station_id: &str,
        key: &str,
        duration_hours: f64,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<FieldPoint>> {
        let statuses = self.window(station_id, duration_hours, now)?;
        Ok(statuses
            .iter()
            .rev()
            .filter_map(|s| {
                s.field(key).map(|value| FieldPoint {
                    timestamp: s.timestamp,
                    value,
                })
            })
            .collect())
    }

    /// One entry per status after the first in the window, newest first
    pub fn error_history(
        &self,
        station_id: &str,
        duration_hours: f64,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<ErrorHistoryEntry>> {
        let statuses = self.window(station_id, duration_hours, now)?;

        let mut entries: Vec<ErrorHistoryEntry> = statuses
            .windows(2)
            .map(|pair| {
                let gap = pair[1].timestamp - pair[0].timestamp;
                ErrorHistoryEntry {
                    timestamp: pair[1].timestamp,
                    minutes_since_previous: round2(gap.num_milliseconds() as f64 / 60_000.0),
                    errors: if pair[1].has_errors() {
                        pair[1].error_counts.clone()
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect();
        entries.reverse();
        Ok(entries)
    }

    pub fn last_statuses(&self, station_id: &str, n: usize, skip: usize) -> Result<Vec<StatusRecord>> {
        self.store.latest_statuses(station_id, skip, n)
    }

    fn window(
        &self,
        station_id: &str,
        duration_hours: f64,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<StatusRecord>> {
        let mut statuses = self
            .store
            .find_statuses(station_id, now - hours(duration_hours), None)?;
        statuses.retain(|s| s.timestamp <= now);
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use pretty_assertions::assert_eq;

    fn ts(hms: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(&format!("2024-01-01T{}+01:00", hms)).unwrap()
    }

    fn status(hms: &str, pairs: &[(&str, &str)]) -> StatusRecord {
        StatusRecord::from_fields(
            "peter",
            ts(hms),
            pairs.iter().map(|(k, v)| (k.to_string(), FieldValue::from(*v))),
        )
    }

    fn seeded() -> Result<InMemoryStore> {
        let store = InMemoryStore::new();
        store.insert_status(&status("09:00:00", &[("vbatIde", "4.1")]))?;
        store.insert_status(&status("09:10:00", &[("temp", "2.0")]))?;
        store.insert_status(&status("09:40:30", &[("vbatIde", "4.0"), ("errors", "9:2")]))?;
        Ok(store)
    }

    #[test]
    fn test_status_values_newest_first() -> Result<()> {
        let store = seeded()?;
        let values = StatusAnalyzer::new(&store).status_values("peter", "vbatIde", 6.0, ts("10:00:00"))?;

        assert_eq!(
            values,
            vec![
                FieldPoint { timestamp: ts("09:40:30"), value: FieldValue::Number(4.0) },
                FieldPoint { timestamp: ts("09:00:00"), value: FieldValue::Number(4.1) },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_error_history_gaps() -> Result<()> {
        let store = seeded()?;
        let history = StatusAnalyzer::new(&store).error_history("peter", 6.0, ts("10:00:00"))?;

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].timestamp, ts("09:40:30"));
        assert_eq!(history[0].minutes_since_previous, 30.5);
        assert_eq!(history[0].errors.len(), 1);
        assert_eq!(history[0].errors[0].count, 2);
        assert_eq!(history[1].minutes_since_previous, 10.0);
        assert!(history[1].errors.is_empty());
        Ok(())
    }

    #[test]
    fn test_last_statuses_with_skip() -> Result<()> {
        let store = seeded()?;
        let last = StatusAnalyzer::new(&store).last_statuses("peter", 1, 1)?;
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].timestamp, ts("09:10:00"));
        Ok(())
    }
}
