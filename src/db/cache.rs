use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use crate::{error::AppResult, models::RatingRecord};

/// File name of the processed dataset inside the datasets directory
pub const CACHE_FILE: &str = "dataset.json";

/// Reads the processed records written by a previous run
///
/// Returns `Ok(None)` when no cache file exists yet.
pub fn read_cache(path: &Path) -> AppResult<Option<Vec<RatingRecord>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let records: Vec<RatingRecord> = serde_json::from_reader(BufReader::new(file))?;
    tracing::debug!(path = %path.display(), records = records.len(), "Cache hit");
    Ok(Some(records))
}

/// Persists processed records so the next start can skip cleaning
pub fn write_cache(path: &Path, records: &[RatingRecord]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, records)?;
    writer.flush()?;

    tracing::info!(path = %path.display(), records = records.len(), "Processed dataset cached");
    Ok(())
}
