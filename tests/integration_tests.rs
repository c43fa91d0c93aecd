use chrono::{DateTime, FixedOffset};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use windlog_processor::analyzers::{StatusAnalyzer, WindAnalyzer};
use windlog_processor::models::{SeriesId, Statistic};
use windlog_processor::processors::{
    response_text, AggregationRunner, BoundaryPolicy, IngestPipeline, ReplayProcessor,
};
use windlog_processor::readers::LogReader;
use windlog_processor::store::{InMemoryStore, TelemetryStore};
use windlog_processor::writers::{ParquetWriter, RawLogWriter};
use windlog_processor::Result;

const LINE: &str = "logFirst=0;logLast=60;len=3;avg=10,20,30;dir=0,90,180";

fn ts(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

fn clock(ts: &[DateTime<FixedOffset>]) -> Vec<String> {
    ts.iter().map(|t| t.format("%H:%M:%S").to_string()).collect()
}

#[test]
fn test_line_to_points_end_to_end() -> Result<()> {
    let store = InMemoryStore::new();
    let received = ts("2024-01-01T00:00:00+01:00");

    let report = IngestPipeline::default().ingest_line(&store, "peter", LINE, received)?;
    assert!(report.warnings.is_empty());

    let winds = store.find_samples("peter", SeriesId::WindSpeed, received, None)?;
    let dirs = store.find_samples("peter", SeriesId::WindDirection, received, None)?;

    let wind_values: Vec<f64> = winds.iter().map(|p| p.value).collect();
    let dir_values: Vec<f64> = dirs.iter().map(|p| p.value).collect();
    assert_eq!(wind_values, vec![10.0, 20.0, 30.0]);
    assert_eq!(dir_values, vec![345.0, 75.0, 165.0]);

    let wind_times: Vec<_> = winds.iter().map(|p| p.timestamp).collect();
    assert_eq!(clock(&wind_times), vec!["00:00:00", "00:00:30", "00:01:00"]);
    assert!(winds.iter().all(|p| p.timestamp.offset() == received.offset()));
    Ok(())
}

#[test]
fn test_reaggregation_without_new_points_is_idempotent() -> Result<()> {
    let store = InMemoryStore::new();
    let pipeline = IngestPipeline::default();
    pipeline.ingest_line(&store, "peter", LINE, ts("2024-01-01T10:00:00+01:00"))?;
    pipeline.ingest_line(
        &store,
        "peter",
        "logFirst=37800;logLast=37860;len=2;avg=40,50;dir=270,270",
        ts("2024-01-01T10:31:00+01:00"),
    )?;

    let before_wind = store.find_buckets("peter", SeriesId::WindSpeed, None)?;
    let before_dir = store.find_buckets("peter", SeriesId::WindDirection, None)?;

    let runner = AggregationRunner::default();
    runner.run_all(&store, "peter", ts("2024-01-01T12:00:00+01:00"))?;

    assert_eq!(store.find_buckets("peter", SeriesId::WindSpeed, None)?, before_wind);
    assert_eq!(store.find_buckets("peter", SeriesId::WindDirection, None)?, before_dir);
    Ok(())
}

#[test]
fn test_watermark_advances_and_buckets_are_overwritten() -> Result<()> {
    let store = InMemoryStore::new();
    let pipeline = IngestPipeline::default();

    // 10:01 and 10:02, both in the 10:00 bucket
    pipeline.ingest_line(
        &store,
        "peter",
        "logFirst=36060;logLast=36120;len=2;avg=36,36;dir=15,15",
        ts("2024-01-01T10:03:00+01:00"),
    )?;
    let watermark = store.get_watermark("peter", SeriesId::WindSpeed)?;
    assert_eq!(
        watermark.map(|w| w.last_boundary),
        Some(ts("2024-01-01T10:01:00+01:00"))
    );

    // 10:05 joins the same bucket; the bucket is recomputed, not duplicated
    pipeline.ingest_line(
        &store,
        "peter",
        "logFirst=36300;logLast=36300;len=1;avg=72;dir=15",
        ts("2024-01-01T10:06:00+01:00"),
    )?;

    let buckets = store.find_buckets("peter", SeriesId::WindSpeed, None)?;
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].bucket_timestamp, ts("2024-01-01T10:00:00+01:00"));
    // (36 + 36 + 72) / 3 rpm * 0.33 / 3.6
    assert_eq!(buckets[0].get(Statistic::Mean), Some(4.4));
    assert_eq!(buckets[0].get(Statistic::Max), Some(6.6));
    Ok(())
}

#[test]
fn test_latest_bucket_start_policy_rescans_only_newest_bucket() -> Result<()> {
    let store = InMemoryStore::new();
    let runner = AggregationRunner::default().with_boundary_policy(BoundaryPolicy::LatestBucketStart);
    let pipeline = IngestPipeline::new(runner);

    pipeline.ingest_line(
        &store,
        "peter",
        "logFirst=36000;logLast=37800;len=3;avg=10,20,30;dir=0,0,0",
        ts("2024-01-01T10:31:00+01:00"),
    )?;

    // Newest point 10:30 sits in the 10:30 bucket
    let watermark = store.get_watermark("peter", SeriesId::WindSpeed)?;
    assert_eq!(
        watermark.map(|w| w.last_boundary),
        Some(ts("2024-01-01T10:30:00+01:00"))
    );
    assert_eq!(store.find_buckets("peter", SeriesId::WindSpeed, None)?.len(), 3);
    Ok(())
}

#[test]
fn test_archive_replay_rebuilds_same_state() -> Result<()> {
    let dir = TempDir::new()?;
    let logs = dir.path().join("logs");
    let live = InMemoryStore::new();
    let pipeline = IngestPipeline::default().with_raw_log(RawLogWriter::new(&logs));

    let lines = [
        ("2024-01-01T10:03:00+01:00", "ver=v3;vbatIde=4.10;logFirst=36060;logLast=36120;len=2;avg=36,36;dir=15,15"),
        ("2024-01-01T10:33:00+01:00", "ver=v3;vbatIde=4.05;errors=9:1;logFirst=37860;logLast=37920;len=2;avg=72,0;dir=200,210"),
    ];
    for (received, line) in lines {
        let result = pipeline.ingest_line(&live, "peter", line, ts(received));
        assert_eq!(response_text(line, &result), format!("saved: {}\n", line.len()));
    }

    let replayed = InMemoryStore::new();
    let processor = ReplayProcessor::new(2, LogReader::new(FixedOffset::east_opt(3600).unwrap()));
    let summary = processor.replay_dir(&replayed, &IngestPipeline::default(), &logs, None)?;
    assert_eq!(summary.total_saved(), 2);

    for series in SeriesId::ALL {
        assert_eq!(
            replayed.find_buckets("peter", series, None)?,
            live.find_buckets("peter", series, None)?
        );
    }
    let newest = replayed.latest_statuses("peter", 0, 1)?;
    assert_eq!(newest[0].vbat_rate, Some(-0.1));
    Ok(())
}

#[test]
fn test_read_side_and_export() -> Result<()> {
    let dir = TempDir::new()?;
    let store = InMemoryStore::new();
    let pipeline = IngestPipeline::default();
    pipeline.ingest_line(&store, "peter", "errors=9:2;temp=3.5;", ts("2024-01-01T09:50:00+01:00"))?;
    pipeline.ingest_line(
        &store,
        "peter",
        "ver=v2;errors=15:1;temp=4.0;logFirst=36060;logLast=36120;len=2;avg=36,72;dir=100,100",
        ts("2024-01-01T10:03:00+01:00"),
    )?;

    let merged = WindAnalyzer::new(&store).bucketed("peter", 6.0)?;
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].avg, Some(4.95));
    assert_eq!(merged[0].max, Some(6.6));
    // 85 degrees after the vane offset falls in sector 2
    assert_eq!(merged[0].dir, Some(2.0));

    let now = ts("2024-01-01T11:00:00+01:00");
    let errors = StatusAnalyzer::new(&store).error_history("peter", 24.0, now)?;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].minutes_since_previous, 13.0);
    assert_eq!(errors[0].errors[0].name, "ERR_POWERON_RESET");

    let temps = StatusAnalyzer::new(&store).status_values("peter", "temp", 6.0, now)?;
    assert_eq!(temps.len(), 2);

    let snapshot = dir.path().join("store.json");
    store.save(&snapshot)?;
    let reloaded = InMemoryStore::load(&snapshot)?;

    let mut records = Vec::new();
    for series in SeriesId::ALL {
        records.extend(reloaded.find_buckets("peter", series, None)?);
    }
    let output = dir.path().join("buckets.parquet");
    let writer = ParquetWriter::new();
    writer.write_buckets(&records, &output)?;
    assert_eq!(writer.get_file_info(&output)?.total_rows, 2);
    assert_eq!(writer.read_buckets(&output, 10)?, records);
    Ok(())
}

#[test]
fn test_snapshot_reloads_after_unparseable_status_field() -> Result<()> {
    let dir = TempDir::new()?;
    let store = InMemoryStore::new();
    IngestPipeline::default().ingest_line(
        &store,
        "peter",
        "signal=n/a;temp=1.0",
        ts("2024-01-01T10:00:00+01:00"),
    )?;

    let snapshot = dir.path().join("store.json");
    store.save(&snapshot)?;
    let reloaded = InMemoryStore::load(&snapshot)?;

    let statuses = reloaded.latest_statuses("peter", 0, 1)?;
    assert_eq!(statuses, store.latest_statuses("peter", 0, 1)?);
    assert_eq!(statuses[0].signal, None);
    assert_eq!(statuses[0].temperature, Some(1.0));
    Ok(())
}
