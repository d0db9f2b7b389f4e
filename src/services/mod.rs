pub mod catalog;
pub mod etl;
pub mod recommendations;
pub mod source;

pub use source::{CsvDatasetSource, DatasetSource};
