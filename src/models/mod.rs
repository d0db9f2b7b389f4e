use serde::{Deserialize, Serialize};

/// One row of the joined books/ratings dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    #[serde(rename = "ISBN")]
    pub isbn: String,
    #[serde(rename = "User-ID")]
    pub user_id: u32,
    /// Explicit rating in 1..=10
    #[serde(rename = "Book-Rating")]
    pub rating: u8,
    #[serde(rename = "Book-Title")]
    pub title: String,
    #[serde(rename = "Book-Author")]
    pub author: String,
}

impl RatingRecord {
    pub fn new(
        isbn: impl Into<String>,
        user_id: u32,
        rating: u8,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            isbn: isbn.into(),
            user_id,
            rating,
            title: title.into(),
            author: author.into(),
        }
    }
}

/// A single recommended book returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub book: String,
    /// Pearson correlation with the queried book, in [-1, 1]
    pub corr: f64,
    pub avg_rating: f64,
}

/// Query parameters for the recommendation endpoint
#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub entry_book: String,
    pub entry_author: String,
    #[serde(default = "default_num_of_results")]
    pub num_of_results: usize,
}

fn default_num_of_results() -> usize {
    crate::services::recommendations::DEFAULT_NUM_OF_RESULTS
}

/// Query parameters for paginated listings
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    10
}

/// One page of a listing
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub items: Vec<T>,
}
