use crate::models::SeriesId;
use crate::utils::constants::{DEFAULT_ERROR_QUERY_HOURS, DEFAULT_QUERY_HOURS};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "windlog")]
#[command(about = "Weather station telemetry decoder and wind aggregation engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Settings file (TOML, JSON or YAML)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Store snapshot path [overrides settings]")]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest one telemetry line for a station
    Ingest {
        #[arg(short, long)]
        station: String,

        #[arg(help = "Telemetry line [default: read from stdin]")]
        line: Option<String>,

        #[arg(long, help = "Receive time as RFC 3339 [default: now]")]
        received_at: Option<String>,
    },

    /// Re-ingest archived raw line logs (one <station>.txt per station)
    Replay {
        #[arg(short, long, help = "Directory of raw line archives")]
        input_dir: PathBuf,

        #[arg(short, long, help = "Only replay this station")]
        station: Option<String>,

        #[arg(long, help = "Worker threads [default: from settings]")]
        max_workers: Option<usize>,
    },

    /// Run an incremental aggregation pass
    Aggregate {
        #[arg(short, long, help = "Station [default: every stored station]")]
        station: Option<String>,

        #[arg(long, help = "wind-speed or wind-direction [default: both]")]
        series: Option<SeriesId>,
    },

    /// Show wind buckets, or raw samples with --raw
    Wind {
        #[arg(short, long)]
        station: String,

        #[arg(long, default_value_t = DEFAULT_QUERY_HOURS)]
        hours: f64,

        #[arg(long, default_value = "false")]
        raw: bool,
    },

    /// Show a status field history, or the latest statuses
    Status {
        #[arg(short, long)]
        station: String,

        #[arg(short, long, help = "Field wire name, e.g. vbatIde or temp")]
        field: Option<String>,

        #[arg(long, default_value_t = DEFAULT_QUERY_HOURS)]
        hours: f64,

        #[arg(short = 'n', long, default_value = "1")]
        last: usize,

        #[arg(long, default_value = "0")]
        skip: usize,
    },

    /// Show reporting gaps and firmware error counts
    Errors {
        #[arg(short, long)]
        station: String,

        #[arg(long, default_value_t = DEFAULT_ERROR_QUERY_HOURS)]
        hours: f64,
    },

    /// Export bucket records to Parquet
    Export {
        #[arg(
            short,
            long,
            help = "Output Parquet file path [default: output/windlog-buckets-{YYMMDD}.parquet]"
        )]
        output_file: Option<PathBuf>,

        #[arg(short, long)]
        station: Option<String>,

        #[arg(long)]
        series: Option<SeriesId>,

        #[arg(long, default_value = "snappy")]
        compression: String,
    },
}
