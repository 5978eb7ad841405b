pub mod fields;
pub mod procedures;
pub mod shapes;
pub mod splitter;

pub use fields::{extract_record, Extraction};
pub use splitter::split_records;
