use crate::{
    error::{AppError, AppResult},
    models::Page,
};

pub const MAX_PAGE_SIZE: usize = 50;

/// Slices one page out of an ordered listing
///
/// Pages are 1-based. Asking past the end yields an empty page that still
/// reports the full `total`.
pub fn paginate(items: &[String], page: usize, page_size: usize) -> AppResult<Page<String>> {
    if page < 1 {
        return Err(AppError::InvalidInput("page must be >= 1".to_string()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(AppError::InvalidInput(format!(
            "page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let start = (page - 1).saturating_mul(page_size);
    let page_items = items
        .iter()
        .skip(start)
        .take(page_size)
        .cloned()
        .collect();

    Ok(Page {
        page,
        page_size,
        total: items.len(),
        items: page_items,
    })
}
