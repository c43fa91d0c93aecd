pub mod status_analyzer;
pub mod wind_analyzer;

pub use status_analyzer::{ErrorHistoryEntry, FieldPoint, StatusAnalyzer};
pub use wind_analyzer::{DirectionSample, MergedBucket, WindAnalyzer, WindSample};
