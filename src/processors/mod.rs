pub mod aggregation_runner;
pub mod bucket_aggregator;
pub mod change_rate;
pub mod ingest;
pub mod replay_processor;
pub mod timestamp_reconstructor;

pub use aggregation_runner::{AggregationRunner, AggregationSummary};
pub use bucket_aggregator::{AggregationOutput, BoundaryPolicy, BucketAggregator, TimedValue};
pub use change_rate::ChangeRateEstimator;
pub use ingest::{response_text, IngestPipeline, IngestReport};
pub use replay_processor::{FileReplay, ReplayProcessor, ReplaySummary};
pub use timestamp_reconstructor::{local_midnight, ReconstructedSeries, TimestampReconstructor};
