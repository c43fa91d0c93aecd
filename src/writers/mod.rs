pub mod parquet_writer;
pub mod raw_log;

pub use parquet_writer::{ParquetFileInfo, ParquetWriter};
pub use raw_log::{clean_data, RawLogWriter};
