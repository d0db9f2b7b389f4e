use std::collections::{HashMap, HashSet};
use std::io::Read;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::{error::AppResult, models::RatingRecord};

/// Row of Books.csv; image URLs, year and publisher are ignored
#[derive(Debug, Clone, Deserialize)]
pub struct RawBook {
    #[serde(rename = "ISBN")]
    pub isbn: Option<String>,
    #[serde(rename = "Book-Title")]
    pub title: Option<String>,
    #[serde(rename = "Book-Author")]
    pub author: Option<String>,
}

/// Row of Ratings.csv
#[derive(Debug, Clone, Deserialize)]
pub struct RawRating {
    #[serde(rename = "User-ID")]
    pub user_id: u32,
    #[serde(rename = "ISBN")]
    pub isbn: String,
    #[serde(rename = "Book-Rating")]
    pub rating: i64,
}

/// Book metadata that survived cleaning
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub isbn: String,
    pub title: String,
    pub author: String,
}

pub fn read_books<R: Read>(reader: R) -> AppResult<Vec<RawBook>> {
    read_rows(reader, "books")
}

pub fn read_ratings<R: Read>(reader: R) -> AppResult<Vec<RawRating>> {
    read_rows(reader, "ratings")
}

/// Deserializes every well-formed row, skipping lines that do not parse
fn read_rows<R: Read, T: DeserializeOwned>(reader: R, kind: &'static str) -> AppResult<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        // Extra fields mean a shifted line (e.g. an unquoted comma in a title)
        if matches!(&record, Ok(r) if r.len() > headers.len()) {
            skipped += 1;
            continue;
        }
        match record.and_then(|r| r.deserialize::<T>(Some(&headers))) {
            Ok(row) => rows.push(row),
            Err(e) => {
                tracing::debug!(kind, error = %e, "Skipping malformed row");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(kind, skipped, parsed = rows.len(), "Malformed rows skipped");
    }

    Ok(rows)
}

/// ISBN-10 style checksum over a string of digits and `X`
///
/// Each character is weighted 10, 9, 8, ... by position and `X` stands for 10.
/// The weighted sum must be divisible by 11.
pub fn validate_isbn(isbn: &str) -> bool {
    if isbn.is_empty() || !isbn.bytes().all(|b| b.is_ascii_digit() || b == b'X') {
        return false;
    }

    let sum: i64 = isbn
        .bytes()
        .enumerate()
        .map(|(idx, b)| {
            let value = if b == b'X' { 10 } else { i64::from(b - b'0') };
            value * (10 - idx as i64)
        })
        .sum();

    sum % 11 == 0
}

/// Repairs UTF-8 text that was decoded as latin-1 (e.g. "CafÃ©" -> "Café")
///
/// Strings that are not representable in latin-1, or whose bytes are not
/// valid UTF-8, are returned unchanged.
pub fn fix_encoding(s: &str) -> String {
    let latin1: Option<Vec<u8>> = s.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect();
    latin1
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| s.to_string())
}

/// Normalizes, deduplicates and validates book metadata
///
/// Titles are repaired and lowercased, authors lowercased. Only the first row
/// of each title is kept; rows without an author, title or valid ISBN are
/// dropped afterwards.
pub fn clean_books(raw: Vec<RawBook>) -> Vec<Book> {
    let total = raw.len();
    let mut seen_titles: HashSet<Option<String>> = HashSet::new();

    let books: Vec<Book> = raw
        .into_iter()
        .map(|book| RawBook {
            isbn: book.isbn,
            title: book.title.map(|title| fix_encoding(&title).to_lowercase()),
            author: book.author.map(|author| author.to_lowercase()),
        })
        .filter(|book| seen_titles.insert(book.title.clone()))
        .filter_map(|book| match (book.isbn, book.title, book.author) {
            (Some(isbn), Some(title), Some(author)) if validate_isbn(&isbn) => {
                Some(Book { isbn, title, author })
            }
            _ => None,
        })
        .collect();

    tracing::info!(raw = total, kept = books.len(), "Books cleaned");
    books
}

/// Drops repeated (ISBN, user) pairs, implicit zero ratings and invalid ISBNs
pub fn clean_ratings(raw: Vec<RawRating>) -> Vec<RawRating> {
    let total = raw.len();
    let mut seen: HashSet<(String, u32)> = HashSet::new();

    let ratings: Vec<RawRating> = raw
        .into_iter()
        .filter(|rating| seen.insert((rating.isbn.clone(), rating.user_id)))
        .filter(|rating| (1..=10).contains(&rating.rating))
        .filter(|rating| validate_isbn(&rating.isbn))
        .collect();

    tracing::info!(raw = total, kept = ratings.len(), "Ratings cleaned");
    ratings
}

/// Inner join of ratings with books on ISBN, in ratings order
pub fn join(ratings: Vec<RawRating>, books: &[Book]) -> Vec<RatingRecord> {
    let mut by_isbn: HashMap<&str, &Book> = HashMap::with_capacity(books.len());
    for book in books {
        by_isbn.entry(book.isbn.as_str()).or_insert(book);
    }

    ratings
        .into_iter()
        .filter_map(|rating| {
            let book = by_isbn.get(rating.isbn.as_str())?;
            let score = u8::try_from(rating.rating).ok()?;
            Some(RatingRecord::new(
                rating.isbn,
                rating.user_id,
                score,
                book.title.clone(),
                book.author.clone(),
            ))
        })
        .collect()
}

/// Full cleaning pass from raw CSV readers to joined records
pub fn build_records<B: Read, R: Read>(books: B, ratings: R) -> AppResult<Vec<RatingRecord>> {
    let ratings = clean_ratings(read_ratings(ratings)?);
    let books = clean_books(read_books(books)?);
    let records = join(ratings, &books);

    tracing::info!(records = records.len(), "Dataset joined");
    Ok(records)
}
