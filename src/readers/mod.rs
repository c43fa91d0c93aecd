pub mod line_parser;
pub mod log_reader;

pub use line_parser::{decode_array, LineParser, ParsedLine, WindLog};
pub use log_reader::{LogReader, LoggedLine};
