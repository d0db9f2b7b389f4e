use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::RatingRecord;

/// In-memory store of the cleaned, joined ratings table
///
/// Built once at startup and never mutated afterwards, so it can be shared
/// behind an `Arc` by every request without locking. Titles and authors are
/// held in lowercase; all lookups are case-insensitive substring matches.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<RatingRecord>,
    books: Vec<String>,
    authors: Vec<String>,
    loaded_at: DateTime<Utc>,
}

impl Dataset {
    pub fn new(records: Vec<RatingRecord>) -> Self {
        let records: Vec<RatingRecord> = records
            .into_iter()
            .map(|mut record| {
                record.title = record.title.to_lowercase();
                record.author = record.author.to_lowercase();
                record
            })
            .collect();

        let books = distinct_in_order(records.iter().map(|r| r.title.as_str()));
        let authors = distinct_in_order(records.iter().map(|r| r.author.as_str()));

        Self {
            records,
            books,
            authors,
            loaded_at: Utc::now(),
        }
    }

    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Distinct titles in first-occurrence order
    pub fn list_books(&self) -> &[String] {
        &self.books
    }

    /// Distinct authors in first-occurrence order
    pub fn list_authors(&self) -> &[String] {
        &self.authors
    }

    /// Distinct titles containing `query`, in first-occurrence order
    pub fn titles_containing(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        self.books
            .iter()
            .filter(|title| title.contains(&query))
            .map(String::as_str)
            .collect()
    }

    /// Distinct authors containing `query`, in first-occurrence order
    pub fn authors_containing(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        self.authors
            .iter()
            .filter(|author| author.contains(&query))
            .map(String::as_str)
            .collect()
    }

    /// Rows satisfying `predicate`, in dataset order
    pub fn rows_where<P>(&self, predicate: P) -> Vec<&RatingRecord>
    where
        P: Fn(&RatingRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).collect()
    }
}

fn distinct_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}
