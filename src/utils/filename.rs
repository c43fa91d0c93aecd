use chrono::{DateTime, Datelike, FixedOffset};
use std::path::PathBuf;

/// Default export path: `output/windlog-buckets[-{station}]-{YYMMDD}.parquet`
pub fn default_export_filename(station_id: Option<&str>, now: DateTime<FixedOffset>) -> PathBuf {
    let date = format!("{:02}{:02}{:02}", now.year() % 100, now.month(), now.day());

    let filename = match station_id {
        Some(station) => format!("windlog-buckets-{}-{}.parquet", station, date),
        None => format!("windlog-buckets-{}.parquet", date),
    };
    PathBuf::from("output").join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_export_filename() {
        let now = DateTime::parse_from_rfc3339("2025-03-07T10:00:00+01:00").unwrap();

        assert_eq!(
            default_export_filename(None, now),
            PathBuf::from("output").join("windlog-buckets-250307.parquet")
        );
        assert_eq!(
            default_export_filename(Some("peter"), now),
            PathBuf::from("output").join("windlog-buckets-peter-250307.parquet")
        );
    }
}
