//! Dataset source abstraction
//!
//! The server only needs "give me the cleaned dataset"; where it comes from
//! (raw CSV files, the processed cache, a fixture in tests) is up to the source.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::{
    db::{read_cache, write_cache, Dataset, CACHE_FILE},
    error::{AppError, AppResult},
    services::etl,
};

pub const BOOKS_FILE: &str = "Books.csv";
pub const RATINGS_FILE: &str = "Ratings.csv";

/// Trait for dataset sources
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DatasetSource: Send + Sync {
    /// Loads the cleaned, joined dataset
    ///
    /// With `force_refresh` the source must rebuild from its raw inputs
    /// instead of reusing any processed copy.
    async fn load(&self, force_refresh: bool) -> AppResult<Dataset>;

    /// Source name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Reads Books.csv and Ratings.csv from a directory and caches the result
pub struct CsvDatasetSource {
    datasets_dir: PathBuf,
}

impl CsvDatasetSource {
    pub fn new(datasets_dir: impl Into<PathBuf>) -> Self {
        Self {
            datasets_dir: datasets_dir.into(),
        }
    }

    fn load_blocking(datasets_dir: &Path, force_refresh: bool) -> AppResult<Dataset> {
        let cache_path = datasets_dir.join(CACHE_FILE);

        if !force_refresh {
            if let Some(records) = read_cache(&cache_path)? {
                return Ok(Dataset::new(records));
            }
            tracing::info!(path = %cache_path.display(), "No processed dataset, building from CSV");
        }

        let books = open_input(&datasets_dir.join(BOOKS_FILE))?;
        let ratings = open_input(&datasets_dir.join(RATINGS_FILE))?;
        let records = etl::build_records(books, ratings)?;

        write_cache(&cache_path, &records)?;
        Ok(Dataset::new(records))
    }
}

fn open_input(path: &Path) -> AppResult<BufReader<File>> {
    File::open(path).map(BufReader::new).map_err(|e| {
        AppError::Internal(format!(
            "Cannot open {} ({}); place the raw dataset files in the datasets directory",
            path.display(),
            e
        ))
    })
}

#[async_trait::async_trait]
impl DatasetSource for CsvDatasetSource {
    async fn load(&self, force_refresh: bool) -> AppResult<Dataset> {
        let datasets_dir = self.datasets_dir.clone();
        tracing::info!(
            dir = %datasets_dir.display(),
            force_refresh,
            "Loading dataset"
        );

        tokio::task::spawn_blocking(move || Self::load_blocking(&datasets_dir, force_refresh))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}
