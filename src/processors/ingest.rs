use crate::error::{ProcessingError, Result};
use crate::models::{RawSamplePoint, SeriesId, StatusRecord};
use crate::processors::aggregation_runner::{AggregationRunner, AggregationSummary};
use crate::processors::change_rate::ChangeRateEstimator;
use crate::processors::timestamp_reconstructor::TimestampReconstructor;
use crate::readers::LineParser;
use crate::store::TelemetryStore;
use crate::writers::RawLogWriter;
use chrono::{DateTime, FixedOffset};
use validator::Validate;

/// Outcome of one accepted submission
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub status: StatusRecord,
    pub speed_points: usize,
    pub direction_points: usize,
    pub aggregations: Vec<AggregationSummary>,
    /// Recovered problems (skipped pairs, missing series, failed regression)
    pub warnings: Vec<String>,
}

/// Turns one raw station line into a stored status, raw samples and
/// refreshed buckets.
pub struct IngestPipeline {
    parser: LineParser,
    reconstructor: TimestampReconstructor,
    estimator: ChangeRateEstimator,
    runner: AggregationRunner,
    raw_log: Option<RawLogWriter>,
}

impl IngestPipeline {
    pub fn new(runner: AggregationRunner) -> Self {
        Self {
            parser: LineParser::new(),
            reconstructor: TimestampReconstructor::new(),
            estimator: ChangeRateEstimator::new(),
            runner,
            raw_log: None,
        }
    }

    pub fn with_reconstructor(mut self, reconstructor: TimestampReconstructor) -> Self {
        self.reconstructor = reconstructor;
        self
    }

    pub fn with_estimator(mut self, estimator: ChangeRateEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Archive every received line before it is parsed
    pub fn with_raw_log(mut self, raw_log: RawLogWriter) -> Self {
        self.raw_log = Some(raw_log);
        self
    }

    pub fn runner(&self) -> &AggregationRunner {
        &self.runner
    }

    pub fn ingest_line(
        &self,
        store: &dyn TelemetryStore,
        station_id: &str,
        line: &str,
        received_at: DateTime<FixedOffset>,
    ) -> Result<IngestReport> {
        if let Some(raw_log) = &self.raw_log {
            if let Err(e) = raw_log.append(station_id, received_at, line) {
                tracing::warn!("Could not archive line for {}: {}", station_id, e);
            }
        }
        self.process_line(store, station_id, line, received_at)
    }

    /// Same as `ingest_line` without archiving, for replaying archives
    pub fn process_line(
        &self,
        store: &dyn TelemetryStore,
        station_id: &str,
        line: &str,
        received_at: DateTime<FixedOffset>,
    ) -> Result<IngestReport> {
        let mut parsed = self.parser.parse(line);
        let mut warnings: Vec<String> = parsed.warnings.iter().map(|e| e.to_string()).collect();

        let wind_log = match parsed.take_wind_log() {
            Ok(log) => Some(log),
            Err(e) => {
                tracing::debug!("No wind series for {}: {}", station_id, e);
                warnings.push(e.to_string());
                None
            }
        };

        let mut status = StatusRecord::from_fields(station_id, received_at, parsed.fields);
        status.validate()?;

        let history = store.find_statuses(
            station_id,
            self.estimator.window_start(received_at),
            Some(received_at),
        )?;
        match self.estimator.estimate_for(&history, &status) {
            Ok(rate) => status.vbat_rate = Some(rate),
            Err(e @ ProcessingError::RegressionInsufficientData { .. }) => {
                tracing::debug!("Skipping {} rate for {}: {}", self.estimator.field(), station_id, e);
            }
            Err(e) => return Err(e),
        }

        let mut points: Vec<RawSamplePoint> = Vec::new();
        let (mut speed_points, mut direction_points) = (0, 0);
        if let Some(log) = &wind_log {
            match self.reconstructor.reconstruct(station_id, received_at, log) {
                Ok(series) => {
                    for e in &series.warnings {
                        tracing::warn!("Dropping series for {}: {}", station_id, e);
                        warnings.push(e.to_string());
                    }
                    speed_points = series.speeds.len();
                    direction_points = series.directions.len();
                    points.extend(series.speeds);
                    points.extend(series.directions);
                }
                Err(e) => {
                    tracing::warn!("Cannot reconstruct series for {}: {}", station_id, e);
                    warnings.push(e.to_string());
                }
            }
        }

        store.insert_status(&status)?;
        if !points.is_empty() {
            store.insert_samples(&points)?;
        }

        let mut aggregations = Vec::new();
        for (series, count) in [
            (SeriesId::WindSpeed, speed_points),
            (SeriesId::WindDirection, direction_points),
        ] {
            if count > 0 {
                aggregations.push(self.runner.run(store, station_id, series, received_at)?);
            }
        }

        tracing::debug!(
            "Saved status for {} with {} wind and {} direction points",
            station_id,
            speed_points,
            direction_points
        );

        Ok(IngestReport {
            status,
            speed_points,
            direction_points,
            aggregations,
            warnings,
        })
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(AggregationRunner::default())
    }
}

/// Plain-text reply to a station: the received length, plus the failure
/// when the submission could not be stored
pub fn response_text(payload: &str, result: &Result<IngestReport>) -> String {
    let mut response = format!("saved: {}\n", payload.len());
    if let Err(e) = result {
        response.push_str(&format!("error: {}\n", e));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Statistic;
    use crate::store::InMemoryStore;
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_line_produces_status_samples_and_buckets() -> Result<()> {
        let store = InMemoryStore::new();
        let pipeline = IngestPipeline::default();
        let line = "ver=v3;temp=1.4;vbatIde=4.0;logFirst=0;logLast=60;len=3;avg=10,20,30;dir=0,90,180";

        let report = pipeline.ingest_line(&store, "peter", line, ts("2024-01-01T00:00:00+01:00"))?;

        assert_eq!(report.speed_points, 3);
        assert_eq!(report.direction_points, 3);
        assert_eq!(report.aggregations.len(), 2);
        assert_eq!(report.status.temperature, Some(1.4));
        assert!(!report.status.extra.contains_key("logFirst"));

        let directions = store.find_samples(
            "peter",
            SeriesId::WindDirection,
            ts("2024-01-01T00:00:00+01:00"),
            None,
        )?;
        let degrees: Vec<f64> = directions.iter().map(|p| p.value).collect();
        assert_eq!(degrees, vec![345.0, 75.0, 165.0]);

        let buckets = store.find_buckets("peter", SeriesId::WindSpeed, None)?;
        assert_eq!(buckets.len(), 1);
        assert!(buckets[0].get(Statistic::Mean).is_some());
        Ok(())
    }

    #[test]
    fn test_status_saved_without_series() -> Result<()> {
        let store = InMemoryStore::new();
        let report = IngestPipeline::default().ingest_line(
            &store,
            "peter",
            "temp=2.0;bogus",
            ts("2024-01-01T08:00:00+01:00"),
        )?;

        assert_eq!(report.speed_points, 0);
        assert!(report.aggregations.is_empty());
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(store.latest_statuses("peter", 0, 10)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_range_error_still_saves_status() -> Result<()> {
        let store = InMemoryStore::new();
        let report = IngestPipeline::default().ingest_line(
            &store,
            "peter",
            "logFirst=100;logLast=50;len=2;avg=1,2;dir=0,0",
            ts("2024-01-01T08:00:00+01:00"),
        )?;

        assert_eq!(report.speed_points, 0);
        assert_eq!(store.latest_statuses("peter", 0, 10)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_oversized_len_is_recovered() -> Result<()> {
        let store = InMemoryStore::new();
        let report = IngestPipeline::default().ingest_line(
            &store,
            "peter",
            "logFirst=0;logLast=60;len=9000000000000000000;avg=1,2;dir=0,0",
            ts("2024-01-01T08:00:00+01:00"),
        )?;

        assert_eq!(report.speed_points, 0);
        assert_eq!(report.direction_points, 0);
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(store.latest_statuses("peter", 0, 10)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_extreme_direction_token_is_wrapped() -> Result<()> {
        let store = InMemoryStore::new();
        let report = IngestPipeline::default().ingest_line(
            &store,
            "peter",
            "logFirst=0;logLast=0;len=1;avg=1;dir=-9223372036854775808",
            ts("2024-01-01T08:00:00+01:00"),
        )?;

        assert_eq!(report.direction_points, 1);
        let dirs = store.find_samples(
            "peter",
            SeriesId::WindDirection,
            ts("2024-01-01T00:00:00+01:00"),
            None,
        )?;
        assert_eq!(dirs[0].value, 337.0);
        Ok(())
    }

    #[test]
    fn test_rate_attached_to_newest_status() -> Result<()> {
        let store = InMemoryStore::new();
        let pipeline = IngestPipeline::default();

        let first = pipeline.ingest_line(&store, "peter", "vbatIde=4.10", ts("2024-01-01T08:00:00+01:00"))?;
        assert_eq!(first.status.vbat_rate, None);

        let second = pipeline.ingest_line(&store, "peter", "vbatIde=4.05", ts("2024-01-01T08:30:00+01:00"))?;
        assert_eq!(second.status.vbat_rate, Some(-0.1));
        Ok(())
    }

    #[test]
    fn test_empty_station_is_rejected() {
        let store = InMemoryStore::new();
        let payload = "temp=1.0";
        let result = IngestPipeline::default().ingest_line(&store, "", payload, ts("2024-01-01T08:00:00+01:00"));

        assert!(matches!(result, Err(ProcessingError::Validation(_))));
        let text = response_text(payload, &result);
        assert!(text.starts_with("saved: 8\nerror: "));
    }

    #[test]
    fn test_response_text_success() -> Result<()> {
        let store = InMemoryStore::new();
        let payload = "temp=1.0";
        let result = IngestPipeline::default().ingest_line(&store, "peter", payload, ts("2024-01-01T08:00:00+01:00"));
        assert_eq!(response_text(payload, &result), "saved: 8\n");
        Ok(())
    }
}
