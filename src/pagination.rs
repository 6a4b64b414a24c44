use serde::{Deserialize, Serialize};

use crate::domain::TVError;

/// Rows per page. Only 5, 10 and 25 are offered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum PageSize {
    Five,
    #[default]
    Ten,
    TwentyFive,
}

impl PageSize {
    pub const ALLOWED: [PageSize; 3] = [PageSize::Five, PageSize::Ten, PageSize::TwentyFive];

    pub fn rows(&self) -> usize {
        match self {
            PageSize::Five => 5,
            PageSize::Ten => 10,
            PageSize::TwentyFive => 25,
        }
    }

    pub fn next(&self) -> PageSize {
        match self {
            PageSize::Five => PageSize::Ten,
            PageSize::Ten => PageSize::TwentyFive,
            PageSize::TwentyFive => PageSize::Five,
        }
    }
}

impl TryFrom<usize> for PageSize {
    type Error = TVError;

    fn try_from(rows: usize) -> Result<Self, Self::Error> {
        PageSize::ALLOWED
            .into_iter()
            .find(|s| s.rows() == rows)
            .ok_or(TVError::InvalidPageSize(rows))
    }
}

impl From<PageSize> for usize {
    fn from(size: PageSize) -> Self {
        size.rows()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageState {
    pub index: usize,
    pub size: PageSize,
}

impl PageState {
    pub fn first(size: PageSize) -> Self {
        PageState { index: 0, size }
    }
}

/// Number of pages needed for `total` rows. Zero rows still have one (empty) page.
pub fn page_count(total: usize, size: PageSize) -> usize {
    total.div_ceil(size.rows()).max(1)
}

/// Rows of the current page; an index past the end gives an empty slice.
pub fn paginate<'a, T>(rows: &'a [T], page: &PageState) -> &'a [T] {
    let size = page.size.rows();
    let begin = page.index.saturating_mul(size).min(rows.len());
    let end = begin.saturating_add(size).min(rows.len());
    &rows[begin..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_is_min_of_size_and_len() {
        let rows: Vec<usize> = (0..12).collect();
        for size in PageSize::ALLOWED {
            let page = paginate(&rows, &PageState::first(size));
            assert_eq!(page.len(), size.rows().min(rows.len()));
            assert_eq!(page[0], 0);
        }
    }

    #[test]
    fn last_page_is_clamped() {
        let rows: Vec<usize> = (0..12).collect();
        let page = paginate(&rows, &PageState { index: 2, size: PageSize::Five });
        assert_eq!(page, &[10, 11]);
    }

    #[test]
    fn out_of_range_is_empty() {
        let rows: Vec<usize> = (0..12).collect();
        assert!(paginate(&rows, &PageState { index: 3, size: PageSize::Five }).is_empty());
        assert!(paginate(&rows, &PageState { index: usize::MAX, size: PageSize::TwentyFive }).is_empty());
        assert!(paginate::<usize>(&[], &PageState::default()).is_empty());
    }

    #[test]
    fn page_sizes() {
        assert_eq!(PageSize::try_from(25).unwrap(), PageSize::TwentyFive);
        assert!(matches!(PageSize::try_from(7), Err(TVError::InvalidPageSize(7))));
        assert_eq!(PageSize::Ten.next().next().next(), PageSize::Ten);
        assert_eq!(serde_json::to_string(&PageSize::Five).unwrap(), "5");
        assert!(serde_json::from_str::<PageSize>("11").is_err());
    }

    #[test]
    fn counts() {
        assert_eq!(page_count(0, PageSize::Ten), 1);
        assert_eq!(page_count(10, PageSize::Ten), 1);
        assert_eq!(page_count(11, PageSize::Ten), 2);
    }
}
