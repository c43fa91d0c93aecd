use crate::error::{ProcessingError, Result};
use crate::processors::ingest::IngestPipeline;
use crate::readers::LogReader;
use crate::store::TelemetryStore;
use crate::utils::progress::ProgressReporter;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileReplay {
    pub station_id: String,
    pub lines: usize,
    pub saved: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub files: Vec<FileReplay>,
}

impl ReplaySummary {
    pub fn total_lines(&self) -> usize {
        self.files.iter().map(|f| f.lines).sum()
    }

    pub fn total_saved(&self) -> usize {
        self.files.iter().map(|f| f.saved).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.files.iter().map(|f| f.failed).sum()
    }
}

/// Re-ingests archived raw line logs, one station file per worker.
///
/// Lines within a file are replayed in order so watermarks and battery
/// rates see the same history they saw live.
pub struct ReplayProcessor {
    max_workers: usize,
    reader: LogReader,
}

impl ReplayProcessor {
    pub fn new(max_workers: usize, reader: LogReader) -> Self {
        Self {
            max_workers: max_workers.max(1),
            reader,
        }
    }

    pub fn replay_dir(
        &self,
        store: &dyn TelemetryStore,
        pipeline: &IngestPipeline,
        dir: &Path,
        progress: Option<&ProgressReporter>,
    ) -> Result<ReplaySummary> {
        let files = LogReader::list_archives(dir)?;
        self.replay_files(store, pipeline, &files, progress)
    }

    pub fn replay_files(
        &self,
        store: &dyn TelemetryStore,
        pipeline: &IngestPipeline,
        files: &[PathBuf],
        progress: Option<&ProgressReporter>,
    ) -> Result<ReplaySummary> {
        let processed_count = AtomicUsize::new(0);

        if let Some(p) = progress {
            p.set_message(&format!("Replaying {} station logs...", files.len()));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        let results: Result<Vec<FileReplay>> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let result = self.replay_file(store, pipeline, path);

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(p) = progress {
                        p.update(count as u64);
                    }

                    result
                })
                .collect()
        });

        let mut files = results?;
        files.sort_by(|a, b| a.station_id.cmp(&b.station_id));
        let summary = ReplaySummary { files };

        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Replayed {} lines from {} stations",
                summary.total_lines(),
                summary.files.len()
            ));
        }

        Ok(summary)
    }

    /// Replay one archive. Bad lines are counted and skipped; a store
    /// failure stops the file.
    pub fn replay_file(
        &self,
        store: &dyn TelemetryStore,
        pipeline: &IngestPipeline,
        path: &Path,
    ) -> Result<FileReplay> {
        let station_id = LogReader::station_id_from_path(path)?;
        let lines = self.reader.read_file(path)?;

        let mut replay = FileReplay {
            station_id: station_id.clone(),
            lines: lines.len(),
            ..Default::default()
        };

        for logged in &lines {
            match pipeline.process_line(store, &station_id, &logged.line, logged.received_at) {
                Ok(_) => replay.saved += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("{} line at {} rejected: {}", station_id, logged.received_at, e);
                    replay.failed += 1;
                }
            }
        }

        tracing::info!(
            "Replayed {}: {} saved, {} rejected",
            station_id,
            replay.saved,
            replay.failed
        );
        Ok(replay)
    }
}

impl Default for ReplayProcessor {
    fn default() -> Self {
        Self::new(
            num_cpus::get(),
            LogReader::new(*chrono::Local::now().fixed_offset().offset()),
        )
    }
}
