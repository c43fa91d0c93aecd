use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProcessingError;
use crate::models::Statistic;

/// Named stream of homogeneous raw points for one station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesId {
    WindSpeed,
    WindDirection,
}

impl SeriesId {
    pub const ALL: [SeriesId; 2] = [SeriesId::WindSpeed, SeriesId::WindDirection];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesId::WindSpeed => "wind-speed",
            SeriesId::WindDirection => "wind-direction",
        }
    }

    /// Statistics written to bucket records for this series by default
    pub fn default_statistics(&self) -> Vec<Statistic> {
        match self {
            SeriesId::WindSpeed => vec![Statistic::Mean, Statistic::Max],
            SeriesId::WindDirection => vec![Statistic::Mode],
        }
    }

    /// Value fed to the aggregator for a stored raw sample.
    ///
    /// Wind speed is stored in device units (rotor RPM) and converted here;
    /// direction is reduced to its compass sector index so that `mode`
    /// picks the prevailing sector rather than an exact angle.
    pub fn aggregation_value(&self, raw: f64, speed_factor: f64) -> f64 {
        match self {
            SeriesId::WindSpeed => raw * speed_factor,
            SeriesId::WindDirection => CompassSector::from_degrees(raw).index() as f64,
        }
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SeriesId {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wind-speed" | "wind" | "winds" => Ok(SeriesId::WindSpeed),
            "wind-direction" | "dir" | "dirs" => Ok(SeriesId::WindDirection),
            _ => Err(ProcessingError::InvalidFormat(format!(
                "Unknown series: '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSamplePoint {
    pub value: f64,
    pub timestamp: DateTime<FixedOffset>,
    pub station_id: String,
    pub series_id: SeriesId,
}

impl RawSamplePoint {
    pub fn new(
        value: f64,
        timestamp: DateTime<FixedOffset>,
        station_id: &str,
        series_id: SeriesId,
    ) -> Self {
        Self {
            value,
            timestamp,
            station_id: station_id.to_string(),
            series_id,
        }
    }
}

/// Eight 45° sectors, indexed the way the station display numbers them
/// (counter-clockwise from north).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompassSector {
    North,
    NorthWest,
    West,
    SouthWest,
    South,
    SouthEast,
    East,
    NorthEast,
}

impl CompassSector {
    const ORDER: [CompassSector; 8] = [
        CompassSector::North,
        CompassSector::NorthWest,
        CompassSector::West,
        CompassSector::SouthWest,
        CompassSector::South,
        CompassSector::SouthEast,
        CompassSector::East,
        CompassSector::NorthEast,
    ];

    pub fn from_degrees(degrees: f64) -> Self {
        let angle = degrees.rem_euclid(360.0);
        let index = ((angle + 22.5) / 45.0).floor() as usize % 8;
        Self::ORDER[index]
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ORDER.get(index).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            CompassSector::North => "N",
            CompassSector::NorthWest => "NW",
            CompassSector::West => "W",
            CompassSector::SouthWest => "SW",
            CompassSector::South => "S",
            CompassSector::SouthEast => "SE",
            CompassSector::East => "E",
            CompassSector::NorthEast => "NE",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            CompassSector::North => "↑",
            CompassSector::NorthWest => "↖",
            CompassSector::West => "←",
            CompassSector::SouthWest => "↙",
            CompassSector::South => "↓",
            CompassSector::SouthEast => "↘",
            CompassSector::East => "→",
            CompassSector::NorthEast => "↗",
        }
    }
}
