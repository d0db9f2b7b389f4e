pub mod cache;
pub mod dataset;

pub use cache::{read_cache, write_cache, CACHE_FILE};
pub use dataset::Dataset;
