use crate::error::{ProcessingError, Result};
use crate::utils::constants::{RAW_LOG_EXTENSION, RAW_LOG_SEPARATOR};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One archived submission: receive time plus the raw line
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedLine {
    pub received_at: DateTime<FixedOffset>,
    pub line: String,
}

/// Reads the per-station raw line archive (`<timestamp>- <line>` per row)
pub struct LogReader {
    /// Offset applied to archive timestamps written without one
    fallback_offset: FixedOffset,
}

impl LogReader {
    pub fn new(fallback_offset: FixedOffset) -> Self {
        Self { fallback_offset }
    }

    /// Station id for an archive file (`logs/<station>.txt` -> `station`)
    pub fn station_id_from_path(path: &Path) -> Result<String> {
        path.file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ProcessingError::InvalidFormat(format!(
                    "Cannot derive station id from {}",
                    path.display()
                ))
            })
    }

    /// Archive files in a directory, sorted by name
    pub fn list_archives(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == RAW_LOG_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn read_file(&self, path: &Path) -> Result<Vec<LoggedLine>> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = Vec::new();

        for (index, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match self.parse_line(&line) {
                Ok(Some(logged)) => lines.push(logged),
                Ok(None) => {
                    tracing::debug!("{}:{} has no timestamp separator", path.display(), index + 1)
                }
                Err(e) => tracing::warn!("{}:{} skipped: {}", path.display(), index + 1, e),
            }
        }

        Ok(lines)
    }

    /// Split an archive row at the first `"- "`. Rows without the
    /// separator are not archive rows and yield `None`.
    pub fn parse_line(&self, row: &str) -> Result<Option<LoggedLine>> {
        let Some(split) = row.find(RAW_LOG_SEPARATOR) else {
            return Ok(None);
        };

        let timestamp = row[..split].trim();
        let line = row[split + RAW_LOG_SEPARATOR.len()..].trim();

        Ok(Some(LoggedLine {
            received_at: self.parse_timestamp(timestamp)?,
            line: line.to_string(),
        }))
    }

    fn parse_timestamp(&self, timestamp: &str) -> Result<DateTime<FixedOffset>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(timestamp) {
            return Ok(ts);
        }

        // Older archives were written without an offset
        let naive = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S%.f"))?;

        self.fallback_offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| {
                ProcessingError::InvalidFormat(format!("Ambiguous timestamp: '{}'", timestamp))
            })
    }
}
