use crate::analyzers::{StatusAnalyzer, WindAnalyzer};
use crate::cli::args::{Cli, Commands};
use crate::settings::Settings;
use crate::error::Result;
use crate::models::SeriesId;
use crate::processors::{response_text, ReplayProcessor};
use crate::readers::LogReader;
use crate::store::{InMemoryStore, TelemetryStore};
use crate::utils::filename::default_export_filename;
use crate::utils::progress::ProgressReporter;
use crate::writers::ParquetWriter;
use chrono::DateTime;
use serde::Serialize;
use std::io::Read;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(store_path) = cli.store {
        settings.store_path = store_path;
    }

    let store = InMemoryStore::load(&settings.store_path)?;

    match cli.command {
        Commands::Ingest {
            station,
            line,
            received_at,
        } => {
            let line = match line {
                Some(line) => line,
                None => {
                    let mut input = String::new();
                    std::io::stdin().read_to_string(&mut input)?;
                    input.trim_end_matches(['\r', '\n']).to_string()
                }
            };
            let received_at = match received_at {
                Some(ts) => DateTime::parse_from_rfc3339(&ts)?,
                None => settings.now(),
            };

            let pipeline = settings.ingest_pipeline();
            let result = pipeline.ingest_line(&store, &station, &line, received_at);
            print!("{}", response_text(&line, &result));

            let report = result?;
            for warning in &report.warnings {
                tracing::warn!("{}", warning);
            }
            store.save(&settings.store_path)?;
        }

        Commands::Replay {
            input_dir,
            station,
            max_workers,
        } => {
            println!("Replaying raw logs from {}", input_dir.display());

            let mut files = LogReader::list_archives(&input_dir)?;
            if let Some(station) = &station {
                files.retain(|path| {
                    LogReader::station_id_from_path(path).is_ok_and(|id| &id == station)
                });
            }
            if files.is_empty() {
                println!("No archives to replay");
                return Ok(());
            }

            let workers = max_workers.unwrap_or(settings.max_workers);
            let progress = ProgressReporter::new(files.len() as u64, "Replaying...", false);
            let processor = ReplayProcessor::new(workers, settings.log_reader());
            let summary =
                processor.replay_files(&store, &settings.ingest_pipeline(), &files, Some(&progress))?;

            for file in &summary.files {
                println!(
                    "{}: {} lines, {} saved, {} rejected",
                    file.station_id, file.lines, file.saved, file.failed
                );
            }
            println!(
                "Replayed {} lines ({} rejected)",
                summary.total_lines(),
                summary.total_failed()
            );
            store.save(&settings.store_path)?;
        }

        Commands::Aggregate { station, series } => {
            let stations = match station {
                Some(station) => vec![station],
                None => store.station_ids()?,
            };
            let series_list: Vec<SeriesId> = match series {
                Some(series) => vec![series],
                None => SeriesId::ALL.to_vec(),
            };

            let runner = settings.aggregation_runner();
            let now = settings.now();
            for station in &stations {
                for series in &series_list {
                    let summary = runner.run(&store, station, *series, now)?;
                    println!(
                        "{}/{}: {} points -> {} buckets",
                        summary.station_id, summary.series, summary.points, summary.buckets
                    );
                }
            }
            store.save(&settings.store_path)?;
        }

        Commands::Wind {
            station,
            hours,
            raw,
        } => {
            let analyzer = WindAnalyzer::new(&store).with_speed_factor(settings.speed_factor);
            if raw {
                let now = settings.now();
                print_json(&serde_json::json!({
                    "wind": analyzer.raw_wind(&station, hours, now)?,
                    "directions": analyzer.directions(&station, hours, now)?,
                }))?;
            } else {
                print_json(&analyzer.bucketed(&station, hours)?)?;
            }
        }

        Commands::Status {
            station,
            field,
            hours,
            last,
            skip,
        } => {
            let analyzer = StatusAnalyzer::new(&store);
            match field {
                Some(field) => {
                    print_json(&analyzer.status_values(&station, &field, hours, settings.now())?)?
                }
                None => print_json(&analyzer.last_statuses(&station, last, skip)?)?,
            }
        }

        Commands::Errors { station, hours } => {
            let analyzer = StatusAnalyzer::new(&store);
            print_json(&analyzer.error_history(&station, hours, settings.now())?)?;
        }

        Commands::Export {
            output_file,
            station,
            series,
            compression,
        } => {
            let output_file = output_file
                .unwrap_or_else(|| default_export_filename(station.as_deref(), settings.now()));
            let stations = match station {
                Some(station) => vec![station],
                None => store.station_ids()?,
            };
            let series_list: Vec<SeriesId> = match series {
                Some(series) => vec![series],
                None => SeriesId::ALL.to_vec(),
            };

            let mut records = Vec::new();
            for station in &stations {
                for series in &series_list {
                    records.extend(store.find_buckets(station, *series, None)?);
                }
            }

            if records.is_empty() {
                println!("No records to write");
                return Ok(());
            }

            println!("Writing {} bucket records to Parquet file...", records.len());
            let writer = ParquetWriter::new().with_compression(&compression)?;
            if let Some(parent) = output_file.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            writer.write_buckets(&records, &output_file)?;

            let file_info = writer.get_file_info(&output_file)?;
            println!("\n{}", file_info.summary());
        }
    }

    Ok(())
}

