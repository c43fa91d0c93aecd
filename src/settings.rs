use crate::error::{ProcessingError, Result};
use crate::processors::{
    AggregationRunner, BoundaryPolicy, ChangeRateEstimator, IngestPipeline, TimestampReconstructor,
};
use crate::readers::LogReader;
use crate::utils::constants::*;
use crate::writers::RawLogWriter;
use chrono::{DateTime, Duration, FixedOffset, Local, Utc};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

/// Runtime settings: built-in defaults, then an optional config file, then
/// `WINDLOG_*` environment variables
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    pub store_path: PathBuf,

    /// Raw line archive directory; archiving is off when unset
    pub raw_log_dir: Option<PathBuf>,

    #[validate(range(min = 1, max = 1440), custom(function = "divides_day"))]
    pub bucket_minutes: u32,

    pub boundary_policy: BoundaryPolicy,

    #[validate(range(min = -359, max = 359))]
    pub direction_adjustment: i64,

    #[validate(range(min = 0.0))]
    pub speed_factor: f64,

    #[validate(range(min = 1))]
    pub watermark_lookback_days: i64,

    #[validate(length(min = 1))]
    pub rate_field: String,

    #[validate(range(min = 1))]
    pub rate_window_minutes: i64,

    pub rate_unit_scale: f64,

    /// Offset stamped on received lines; system local offset when unset
    #[validate(range(min = -1439, max = 1439))]
    pub utc_offset_minutes: Option<i32>,

    #[validate(range(min = 1))]
    pub max_workers: usize,
}

/// Bucket keys only stay stable across passes that start on different
/// days when the window tiles a day exactly
fn divides_day(minutes: u32) -> std::result::Result<(), ValidationError> {
    if minutes == 0 || 1440 % minutes != 0 {
        return Err(ValidationError::new("bucket_minutes_must_divide_a_day"));
    }
    Ok(())
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("store_path", "windlog-store.json")?
            .set_default("bucket_minutes", DEFAULT_BUCKET_MINUTES as i64)?
            .set_default("boundary_policy", "batch_minimum")?
            .set_default("direction_adjustment", DEFAULT_DIRECTION_ADJUSTMENT)?
            .set_default("speed_factor", DEFAULT_SPEED_FACTOR)?
            .set_default("watermark_lookback_days", DEFAULT_WATERMARK_LOOKBACK_DAYS)?
            .set_default("rate_field", DEFAULT_RATE_FIELD)?
            .set_default("rate_window_minutes", DEFAULT_RATE_WINDOW_MINUTES)?
            .set_default("rate_unit_scale", 1.0)?
            .set_default("max_workers", num_cpus::get() as i64)?;

        if let Some(path) = path {
            if !path.exists() {
                return Err(ProcessingError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix("WINDLOG").try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        tracing::debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    pub fn offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(|m| FixedOffset::east_opt(m * 60))
            .unwrap_or_else(|| *Local::now().fixed_offset().offset())
    }

    /// Current time in the configured offset
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset())
    }

    pub fn aggregation_runner(&self) -> AggregationRunner {
        AggregationRunner::new(self.bucket_minutes)
            .with_boundary_policy(self.boundary_policy)
            .with_speed_factor(self.speed_factor)
            .with_lookback(Duration::days(self.watermark_lookback_days))
    }

    pub fn ingest_pipeline(&self) -> IngestPipeline {
        let pipeline = IngestPipeline::new(self.aggregation_runner())
            .with_reconstructor(
                TimestampReconstructor::new().with_direction_adjustment(self.direction_adjustment),
            )
            .with_estimator(
                ChangeRateEstimator::new()
                    .with_field(&self.rate_field)
                    .with_window_minutes(self.rate_window_minutes)
                    .with_unit_scale(self.rate_unit_scale),
            );

        match &self.raw_log_dir {
            Some(dir) => pipeline.with_raw_log(RawLogWriter::new(dir)),
            None => pipeline,
        }
    }

    pub fn log_reader(&self) -> LogReader {
        LogReader::new(self.offset())
    }
}
