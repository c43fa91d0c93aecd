pub mod bucket;
pub mod error_code;
pub mod sample;
pub mod status;

pub use bucket::{BucketRecord, Statistic, Watermark};
pub use error_code::{ErrorCodeTable, ErrorCount};
pub use sample::{CompassSector, RawSamplePoint, SeriesId};
pub use status::{FieldValue, StatusRecord};
