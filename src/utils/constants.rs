/// Line format
pub const PAIR_SEPARATOR: char = ';';
pub const KEY_VALUE_SEPARATOR: char = '=';
pub const ARRAY_SEPARATOR: char = ',';

/// Keys decoded as integer arrays (`avg`, `dir` plus legacy firmware names)
pub const ARRAY_KEYS: &[&str] = &["avg", "dir", "max", "dirs", "windTimes", "dirTimes"];

/// Keys that must all be present before a wind series is reconstructed
pub const REQUIRED_SERIES_KEYS: &[&str] = &["logFirst", "logLast", "len", "avg", "dir"];

pub const KEY_LOG_FIRST: &str = "logFirst";
pub const KEY_LOG_LAST: &str = "logLast";
pub const KEY_LEN: &str = "len";
pub const KEY_WIND_AVG: &str = "avg";
pub const KEY_WIND_DIR: &str = "dir";

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Vane mounting offset in degrees applied to every direction sample
pub const DEFAULT_DIRECTION_ADJUSTMENT: i64 = -15;

/// Anemometer RPM to m/s
pub const DEFAULT_SPEED_FACTOR: f64 = 0.33 / 3.6;

/// Aggregation defaults
pub const DEFAULT_BUCKET_MINUTES: u32 = 15;
pub const DEFAULT_WATERMARK_LOOKBACK_DAYS: i64 = 4;

/// Battery rate estimation defaults
pub const DEFAULT_RATE_WINDOW_MINUTES: i64 = 90;
pub const DEFAULT_RATE_FIELD: &str = "vbatIde";

/// Read-side defaults (hours)
pub const DEFAULT_QUERY_HOURS: f64 = 6.0;
pub const DEFAULT_ERROR_QUERY_HOURS: f64 = 24.0;

/// Raw log archive
pub const RAW_LOG_SEPARATOR: &str = "- ";
pub const RAW_LOG_EXTENSION: &str = "txt";

/// Parquet export
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
