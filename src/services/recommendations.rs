use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use crate::{
    db::Dataset,
    error::{AppError, AppResult},
    models::{RatingRecord, Recommendation},
};

/// Minimum number of peer ratings a title needs to be compared
pub const RATINGS_NUMBER_THRESHOLD: usize = 8;

/// Number of recommendations returned when the caller does not ask otherwise
pub const DEFAULT_NUM_OF_RESULTS: usize = 10;

/// User x title matrix of mean ratings
///
/// Stored column-wise (`title -> user_id -> rating`). Columns keep the order in
/// which titles first appear in the peer corpus so that ties in correlation are
/// broken deterministically. Absent cells mean "not rated", never zero.
#[derive(Debug, Default)]
struct RatingMatrix<'a> {
    columns: Vec<&'a str>,
    cells: HashMap<&'a str, BTreeMap<u32, f64>>,
}

impl<'a> RatingMatrix<'a> {
    /// Averages ratings per `(user_id, title)` and pivots them into columns
    fn pivot(rows: &[&'a RatingRecord]) -> Self {
        let mut columns = Vec::new();
        let mut sums: HashMap<&'a str, BTreeMap<u32, (f64, u32)>> = HashMap::new();

        for row in rows {
            let column = sums.entry(row.title.as_str()).or_insert_with(|| {
                columns.push(row.title.as_str());
                BTreeMap::new()
            });
            let (sum, count) = column.entry(row.user_id).or_insert((0.0, 0));
            *sum += f64::from(row.rating);
            *count += 1;
        }

        let cells = sums
            .into_iter()
            .map(|(title, users)| {
                let means = users
                    .into_iter()
                    .map(|(user_id, (sum, count))| (user_id, sum / f64::from(count)))
                    .collect();
                (title, means)
            })
            .collect();

        Self { columns, cells }
    }

    fn column(&self, title: &str) -> Option<&BTreeMap<u32, f64>> {
        self.cells.get(title)
    }
}

/// Recommends books correlated with `input_book` among readers who rated it
///
/// The peer group is every user with at least one rating whose title contains
/// `input_book` and whose author contains `input_author`. Their ratings of
/// titles with enough support are pivoted into a user x title matrix and every
/// other title is ranked by its pairwise Pearson correlation with the
/// `input_book` column. `input_book` must name a title exactly for that column
/// to exist.
///
/// Fails with [`AppError::NotFound`] when the book or author matches nothing,
/// or when the matrix has no column for `input_book`.
pub fn recommend(
    dataset: &Dataset,
    input_book: &str,
    input_author: &str,
    num_of_results: usize,
) -> AppResult<Vec<Recommendation>> {
    let start = Instant::now();
    let input_book = input_book.to_lowercase();
    let input_author = input_author.to_lowercase();

    if dataset.titles_containing(&input_book).is_empty() {
        return Err(AppError::NotFound(format!(
            "Book {} not found in the dataset",
            input_book
        )));
    }
    if dataset.authors_containing(&input_author).is_empty() {
        return Err(AppError::NotFound(format!(
            "Author {} not found in the dataset",
            input_author
        )));
    }

    // 1. Similar readers: both conditions must hold on the same row
    let similar_readers: BTreeSet<u32> = dataset
        .rows_where(|r| r.title.contains(&input_book) && r.author.contains(&input_author))
        .into_iter()
        .map(|r| r.user_id)
        .collect();

    // 2. Everything those readers rated
    let books_of_similar_readers = dataset.rows_where(|r| similar_readers.contains(&r.user_id));

    // 3. Keep titles with enough ratings
    let title_groups = group_by_title(&books_of_similar_readers);
    let ratings_data_raw: Vec<&RatingRecord> = books_of_similar_readers
        .into_iter()
        .filter(|r| title_groups[r.title.as_str()].1 as usize >= RATINGS_NUMBER_THRESHOLD)
        .collect();

    // 4-5. Mean per user and title, pivoted
    let matrix = RatingMatrix::pivot(&ratings_data_raw);

    tracing::debug!(
        similar_readers = similar_readers.len(),
        compared_books = matrix.columns.len(),
        "Rating matrix built"
    );

    let target = matrix.column(&input_book).ok_or_else(|| {
        AppError::NotFound(format!("No matching books found for {}", input_book))
    })?;

    // 6-7. Correlation and average rating per candidate
    let mut candidates: Vec<Recommendation> = matrix
        .columns
        .iter()
        .filter(|title| **title != input_book)
        .filter_map(|title| {
            let other = matrix.column(title)?;
            let corr = pearson(target, other)?;
            let avg_rating = min_of_grouped_means(&title_groups, title)?;
            Some(Recommendation {
                book: title.to_string(),
                corr,
                avg_rating,
            })
        })
        .collect();

    // 8. Stable sort keeps first-seen order among equal correlations
    candidates.sort_by(|a, b| b.corr.total_cmp(&a.corr));
    candidates.truncate(num_of_results);

    tracing::info!(
        book = %input_book,
        author = %input_author,
        similar_readers = similar_readers.len(),
        results = candidates.len(),
        processing_time_ms = start.elapsed().as_millis(),
        "Recommendations computed"
    );

    Ok(candidates)
}

/// Pearson correlation over the users present in both columns
///
/// Returns `None` with fewer than two shared users or when either side has no
/// variance over the overlap.
fn pearson(x: &BTreeMap<u32, f64>, y: &BTreeMap<u32, f64>) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .filter_map(|(user_id, xv)| y.get(user_id).map(|yv| (*xv, *yv)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(xv, _)| xv).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, yv)| yv).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (xv, yv) in &pairs {
        let dx = xv - mean_x;
        let dy = yv - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }

    let corr = sxy / (sxx * syy).sqrt();
    if corr.is_nan() {
        return None;
    }
    Some(corr.clamp(-1.0, 1.0))
}

/// Sum and count of raw ratings per title
///
/// Every row of a title that passes the support filter is kept, so these
/// totals equal the ones over the filtered pre-pivot rows.
fn group_by_title<'a>(rows: &[&'a RatingRecord]) -> HashMap<&'a str, (f64, u32)> {
    let mut groups: HashMap<&'a str, (f64, u32)> = HashMap::new();
    for row in rows.iter().copied() {
        let (sum, count) = groups.entry(row.title.as_str()).or_insert((0.0, 0));
        *sum += f64::from(row.rating);
        *count += 1;
    }
    groups
}

/// Mean raw rating of the groups keyed by `title`, then the smallest of those
/// means
fn min_of_grouped_means(groups: &HashMap<&str, (f64, u32)>, title: &str) -> Option<f64> {
    groups
        .get(title)
        .into_iter()
        .map(|(sum, count)| sum / f64::from(*count))
        .fold(None, |min: Option<f64>, mean| {
            Some(min.map_or(mean, |m| m.min(mean)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATINGS: [u8; 8] = [8, 7, 9, 6, 10, 5, 7, 8];

    fn record(user_id: u32, title: &str, author: &str, rating: u8) -> RatingRecord {
        RatingRecord::new(format!("isbn-{}", title), user_id, rating, title, author)
    }

    fn rate_all(records: &mut Vec<RatingRecord>, title: &str, author: &str, ratings: &[u8]) {
        for (i, rating) in ratings.iter().enumerate() {
            records.push(record(i as u32 + 1, title, author, *rating));
        }
    }

    /// Eight readers of "book a" by tolkien plus a few other titles
    fn fixture() -> Dataset {
        let mut records = Vec::new();
        rate_all(&mut records, "book a", "tolkien", &RATINGS);
        // Identical pattern
        rate_all(&mut records, "book b", "lewis", &RATINGS);
        // Mirrored pattern
        let mirrored: Vec<u8> = RATINGS.iter().map(|r| 11 - r).collect();
        rate_all(&mut records, "book c", "pratchett", &mirrored);
        // Too few ratings even though they follow the same pattern
        rate_all(&mut records, "book d", "lewis", &RATINGS[..3]);
        // No variance
        rate_all(&mut records, "book e", "austen", &[5; 8]);
        // Plenty of ratings but only from readers outside the peer group
        for user_id in 100..120 {
            records.push(record(user_id, "book f", "austen", 9));
        }
        Dataset::new(records)
    }

    #[test]
    fn test_identical_and_mirrored_patterns() {
        let result = recommend(&fixture(), "book a", "tolkien", 10).unwrap();

        let books: Vec<&str> = result.iter().map(|r| r.book.as_str()).collect();
        assert_eq!(books, vec!["book b", "book c"]);
        assert!((result[0].corr - 1.0).abs() < 1e-9);
        assert!((result[1].corr + 1.0).abs() < 1e-9);
        assert!((result[0].avg_rating - 7.5).abs() < 1e-9);
        assert!((result[1].avg_rating - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_results_are_sorted_bounded_and_exclude_input() {
        let result = recommend(&fixture(), "book a", "tolkien", 10).unwrap();

        assert!(result.len() <= 10);
        assert!(result.windows(2).all(|w| w[0].corr >= w[1].corr));
        assert!(result.iter().all(|r| r.book != "book a"));
        assert!(result.iter().all(|r| (-1.0..=1.0).contains(&r.corr)));
    }

    #[test]
    fn test_titles_below_threshold_never_appear() {
        let result = recommend(&fixture(), "book a", "tolkien", 10).unwrap();
        assert!(result.iter().all(|r| r.book != "book d"));
        assert!(result.iter().all(|r| r.book != "book f"));
    }

    #[test]
    fn test_zero_variance_candidate_is_dropped() {
        let result = recommend(&fixture(), "book a", "tolkien", 10).unwrap();
        assert!(result.iter().all(|r| r.book != "book e"));
    }

    #[test]
    fn test_num_of_results_truncates() {
        let result = recommend(&fixture(), "book a", "tolkien", 1).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].book, "book b");

        let result = recommend(&fixture(), "book a", "tolkien", 0).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_query_is_case_insensitive() {
        let dataset = fixture();
        let lower = recommend(&dataset, "book a", "tolkien", 10).unwrap();
        let mixed = recommend(&dataset, "Book A", "TOLKIEN", 10).unwrap();
        assert_eq!(lower, mixed);
    }

    #[test]
    fn test_recommend_is_idempotent() {
        let dataset = fixture();
        let first = recommend(&dataset, "book a", "tolkien", 10).unwrap();
        let second = recommend(&dataset, "book a", "tolkien", 10).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ties_follow_first_appearance() {
        let mut records = Vec::new();
        rate_all(&mut records, "book a", "tolkien", &RATINGS);
        rate_all(&mut records, "zeta", "lewis", &RATINGS);
        rate_all(&mut records, "alpha", "lewis", &RATINGS);
        let dataset = Dataset::new(records);

        let result = recommend(&dataset, "book a", "tolkien", 10).unwrap();
        let books: Vec<&str> = result.iter().map(|r| r.book.as_str()).collect();
        assert_eq!(books, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_support_counts_rows_and_averages_per_reader() {
        // Three readers reach the threshold through several editions each
        let editions: [(u32, &[u8], &[u8]); 3] = [
            (1, &[2, 4, 6], &[2, 4, 6, 4]),
            (2, &[5, 5, 5], &[5, 5, 5]),
            (3, &[9, 9, 6], &[9, 9, 6]),
        ];
        let mut records = Vec::new();
        for (user_id, book_a, book_b) in editions {
            for (edition, rating) in book_a.iter().enumerate() {
                records.push(RatingRecord::new(format!("a-{}", edition), user_id, *rating, "book a", "tolkien"));
            }
            for (edition, rating) in book_b.iter().enumerate() {
                records.push(RatingRecord::new(format!("b-{}", edition), user_id, *rating, "book b", "lewis"));
            }
        }
        let dataset = Dataset::new(records);

        let result = recommend(&dataset, "book a", "tolkien", 10).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].book, "book b");
        // Per-reader means are 4, 5 and 8 for both books
        assert!((result[0].corr - 1.0).abs() < 1e-9);
        // Raw rows: 55 / 10, not the mean of reader means (17 / 3)
        assert!((result[0].avg_rating - 5.5).abs() < 1e-9);

        let mixed = recommend(&dataset, "BOOK A", "Tolkien", 10).unwrap();
        assert_eq!(result, mixed);
    }

    #[test]
    fn test_unknown_book_is_not_found() {
        let err = recommend(&fixture(), "the silmarillion", "tolkien", 10).unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("Book")));
    }

    #[test]
    fn test_unknown_author_is_not_found() {
        let err = recommend(&fixture(), "book a", "herbert", 10).unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("Author")));
    }

    #[test]
    fn test_book_and_author_must_match_on_the_same_row() {
        // Both match individually, but no row has book a by lewis
        let err = recommend(&fixture(), "book a", "lewis", 10).unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("No matching books")));
    }

    #[test]
    fn test_partial_title_has_no_column() {
        // "book" selects the peers but there is no column named exactly "book"
        let err = recommend(&fixture(), "book", "tolkien", 10).unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("No matching books")));
    }

    #[test]
    fn test_peer_corpus_includes_books_by_other_authors() {
        // Peers are found through tolkien, candidates come from any author
        let result = recommend(&fixture(), "book a", "tolk", 10).unwrap();
        assert!(result.iter().any(|r| r.book == "book b"));
    }

    #[test]
    fn test_pearson_uses_pairwise_complete_observations() {
        let x: BTreeMap<u32, f64> = [(1, 1.0), (2, 2.0), (3, 3.0), (4, 5.0)].into_iter().collect();
        let y: BTreeMap<u32, f64> = [(1, 2.0), (2, 4.0), (3, 6.0), (5, 1.0)].into_iter().collect();
        let corr = pearson(&x, &y).unwrap();
        assert!((corr - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_undefined_cases() {
        let x: BTreeMap<u32, f64> = [(1, 1.0), (2, 2.0)].into_iter().collect();
        let single: BTreeMap<u32, f64> = [(1, 4.0)].into_iter().collect();
        let flat: BTreeMap<u32, f64> = [(1, 4.0), (2, 4.0)].into_iter().collect();
        let disjoint: BTreeMap<u32, f64> = [(7, 4.0), (8, 5.0)].into_iter().collect();

        assert_eq!(pearson(&x, &single), None);
        assert_eq!(pearson(&x, &flat), None);
        assert_eq!(pearson(&x, &disjoint), None);
    }

    #[test]
    fn test_pivot_averages_duplicate_user_ratings() {
        let rows = vec![
            record(1, "book a", "tolkien", 4),
            record(1, "book a", "tolkien", 8),
            record(2, "book b", "lewis", 5),
        ];
        let refs: Vec<&RatingRecord> = rows.iter().collect();
        let matrix = RatingMatrix::pivot(&refs);

        assert_eq!(matrix.columns, vec!["book a", "book b"]);
        assert_eq!(matrix.column("book a").unwrap().get(&1), Some(&6.0));
        assert_eq!(matrix.column("book a").unwrap().get(&2), None);
    }

    #[test]
    fn test_min_of_grouped_means() {
        let rows = vec![
            record(1, "book a", "tolkien", 4),
            record(2, "book a", "tolkien", 9),
            record(3, "book b", "lewis", 1),
        ];
        let refs: Vec<&RatingRecord> = rows.iter().collect();
        let groups = group_by_title(&refs);

        assert_eq!(groups["book a"], (13.0, 2));
        assert_eq!(min_of_grouped_means(&groups, "book a"), Some(6.5));
        assert_eq!(min_of_grouped_means(&groups, "book z"), None);
    }
}
