use crate::error::Result;
use crate::utils::constants::{RAW_LOG_EXTENSION, RAW_LOG_SEPARATOR};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only per-station archive of received lines, one
/// `<timestamp>- <line>` row per submission
pub struct RawLogWriter {
    dir: PathBuf,
}

impl RawLogWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, station_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", station_id, RAW_LOG_EXTENSION))
    }

    pub fn append(
        &self,
        station_id: &str,
        received_at: DateTime<FixedOffset>,
        line: &str,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(station_id))?;

        writeln!(
            file,
            "{}{}{}",
            received_at.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            RAW_LOG_SEPARATOR,
            clean_data(line)
        )?;
        Ok(())
    }
}

/// Replace everything except printable ASCII with `<code point>` so each
/// submission stays on one archive row
pub fn clean_data(data: &str) -> String {
    let mut cleaned = String::with_capacity(data.len());
    for c in data.chars() {
        if c.is_ascii_graphic() || c == ' ' {
            cleaned.push(c);
        } else {
            cleaned.push_str(&format!("<{}>", c as u32));
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::LogReader;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_clean_data_escapes_invisible_chars() {
        assert_eq!(clean_data("temp=1.4;hum=80"), "temp=1.4;hum=80");
        assert_eq!(clean_data("a=1\r\n"), "a=1<13><10>");
        assert_eq!(clean_data("t=\t5°"), "t=<9>5<176>");
    }

    #[test]
    fn test_append_is_readable_by_log_reader() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = RawLogWriter::new(dir.path().join("logs"));
        let received = DateTime::parse_from_rfc3339("2025-12-06T23:30:00.25+01:00").unwrap();

        writer.append("peter", received, "ver=v3;temp=1.4")?;
        writer.append("peter", received, "broken\nline")?;

        let reader = LogReader::new(*received.offset());
        let lines = reader.read_file(&writer.path_for("peter"))?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].received_at, received);
        assert_eq!(lines[0].line, "ver=v3;temp=1.4");
        assert_eq!(lines[1].line, "broken<10>line");
        Ok(())
    }
}
