use crate::error::{ProcessingError, Result};
use crate::models::{BucketRecord, SeriesId, Statistic};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_ROW_GROUP_SIZE,
};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{FixedOffset, TimeZone};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Statistic columns, in file order
const STATISTIC_COLUMNS: [Statistic; 5] = [
    Statistic::Min,
    Statistic::Max,
    Statistic::Median,
    Statistic::Mode,
    Statistic::Mean,
];

pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(parquet::basic::ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(ProcessingError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Write bucket records to a Parquet file; nothing is written for an
    /// empty slice
    pub fn write_buckets(&self, records: &[BucketRecord], path: &Path) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let schema = self.create_schema();
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        for chunk in records.chunks(self.row_group_size.max(1)) {
            let batch = self.buckets_to_batch(chunk, schema.clone())?;
            writer.write(&batch)?;
        }
        writer.close()?;

        tracing::debug!("Wrote {} bucket records to {}", records.len(), path.display());
        Ok(())
    }

    /// Bucket timestamps are stored as UTC instants with the original
    /// offset alongside, so local bucket labels can be restored
    fn create_schema(&self) -> Arc<Schema> {
        let mut fields = vec![
            Field::new("station_id", DataType::Utf8, false),
            Field::new("series_id", DataType::Utf8, false),
            Field::new(
                "bucket_timestamp",
                DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
                false,
            ),
            Field::new("utc_offset_seconds", DataType::Int32, false),
        ];
        for stat in STATISTIC_COLUMNS {
            fields.push(Field::new(stat.as_str(), DataType::Float64, true));
        }

        Arc::new(Schema::new(fields))
    }

    fn buckets_to_batch(&self, records: &[BucketRecord], schema: Arc<Schema>) -> Result<RecordBatch> {
        let station_ids: Vec<&str> = records.iter().map(|r| r.station_id.as_str()).collect();
        let series_ids: Vec<&str> = records.iter().map(|r| r.series_id.as_str()).collect();
        let timestamps: Vec<i64> = records
            .iter()
            .map(|r| r.bucket_timestamp.timestamp_millis())
            .collect();
        let offsets: Vec<i32> = records
            .iter()
            .map(|r| r.bucket_timestamp.offset().local_minus_utc())
            .collect();

        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(station_ids)),
            Arc::new(StringArray::from(series_ids)),
            Arc::new(TimestampMillisecondArray::from(timestamps).with_timezone("UTC")),
            Arc::new(Int32Array::from(offsets)),
        ];
        for stat in STATISTIC_COLUMNS {
            let values: Vec<Option<f64>> = records.iter().map(|r| r.get(stat)).collect();
            columns.push(Arc::new(Float64Array::from(values)));
        }

        Ok(RecordBatch::try_new(schema, columns)?)
    }

    /// Read up to `limit` bucket records back from a file written by
    /// `write_buckets`
    pub fn read_buckets(&self, path: &Path, limit: usize) -> Result<Vec<BucketRecord>> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = File::open(path)?;
        let parquet_reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(limit.clamp(1, 8192))
            .build()?;

        let mut records = Vec::new();
        for batch_result in parquet_reader {
            let batch = batch_result?;

            let station_ids = column::<StringArray>(&batch, 0, "station_id")?;
            let series_ids = column::<StringArray>(&batch, 1, "series_id")?;
            let timestamps = column::<TimestampMillisecondArray>(&batch, 2, "bucket_timestamp")?;
            let offsets = column::<Int32Array>(&batch, 3, "utc_offset_seconds")?;
            let stat_columns = STATISTIC_COLUMNS
                .iter()
                .enumerate()
                .map(|(i, stat)| Ok((*stat, column::<Float64Array>(&batch, 4 + i, stat.as_str())?)))
                .collect::<Result<Vec<_>>>()?;

            for row in 0..batch.num_rows() {
                if records.len() >= limit {
                    return Ok(records);
                }

                let offset = FixedOffset::east_opt(offsets.value(row)).ok_or_else(|| {
                    ProcessingError::InvalidFormat(format!("Invalid offset {}", offsets.value(row)))
                })?;
                let bucket_timestamp = offset
                    .timestamp_millis_opt(timestamps.value(row))
                    .single()
                    .ok_or_else(|| {
                        ProcessingError::InvalidFormat(format!(
                            "Invalid bucket timestamp {}",
                            timestamps.value(row)
                        ))
                    })?;

                let mut values = BTreeMap::new();
                for (stat, array) in &stat_columns {
                    if array.is_valid(row) {
                        values.insert(*stat, array.value(row));
                    }
                }

                records.push(BucketRecord {
                    bucket_timestamp,
                    station_id: station_ids.value(row).to_string(),
                    series_id: series_ids.value(row).parse::<SeriesId>()?,
                    values,
                });
            }
        }

        Ok(records)
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let row_groups = metadata.num_row_groups();
        let row_group_sizes = (0..row_groups)
            .map(|i| metadata.row_group(i).num_rows())
            .collect();

        Ok(ParquetFileInfo {
            total_rows: metadata.file_metadata().num_rows(),
            row_groups: row_groups as i32,
            row_group_sizes,
            file_size: std::fs::metadata(path)?.len(),
            compression: self.compression,
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, index: usize, name: &str) -> Result<&'a T> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ProcessingError::Config(format!("Invalid {} column type", name)))
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Parquet File Summary:\n\
            - Total rows: {}\n\
            - Row groups: {}\n\
            - File size: {:.2} MB\n\
            - Compression: {:?}\n\
            - Avg rows per group: {:.0}",
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1_048_576.0,
            self.compression,
            self.total_rows as f64 / self.row_groups.max(1) as f64
        )
    }
}
