use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ProcessingError;
use crate::models::SeriesId;

/// Statistic computed per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Min,
    Max,
    Median,
    Mode,
    #[serde(alias = "avg")]
    Mean,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Median => "median",
            Statistic::Mode => "mode",
            Statistic::Mean => "mean",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            "median" => Ok(Statistic::Median),
            "mode" => Ok(Statistic::Mode),
            "mean" | "avg" => Ok(Statistic::Mean),
            other => Err(ProcessingError::InvalidFormat(format!(
                "Unknown statistic: '{}'",
                other
            ))),
        }
    }
}

/// One downsampled window of a station's series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRecord {
    pub bucket_timestamp: DateTime<FixedOffset>,
    pub station_id: String,
    pub series_id: SeriesId,
    pub values: BTreeMap<Statistic, f64>,
}

impl BucketRecord {
    pub fn get(&self, statistic: Statistic) -> Option<f64> {
        self.values.get(&statistic).copied()
    }

    /// Identity used by the overwrite policy
    pub fn key(&self) -> (&str, SeriesId, DateTime<FixedOffset>) {
        (&self.station_id, self.series_id, self.bucket_timestamp)
    }
}

/// Per (station, series) aggregation cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub station_id: String,
    pub series_name: SeriesId,
    pub last_boundary: DateTime<FixedOffset>,
}

impl Watermark {
    pub fn new(station_id: &str, series_name: SeriesId, last_boundary: DateTime<FixedOffset>) -> Self {
        Self {
            station_id: station_id.to_string(),
            series_name,
            last_boundary,
        }
    }
}
