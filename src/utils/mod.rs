pub mod constants;
pub mod filename;
pub mod progress;

pub use constants::*;
pub use filename::default_export_filename;
pub use progress::ProgressReporter;
