//! Offset pagination
//!
//! Produces one window of an ordered, already-filtered sequence without
//! materializing the whole sequence. Filtering and ordering belong to the
//! [`PageSource`]; this module only counts and slices.
//!
//! The count and the slice are two independent reads. A page computed while
//! the source is being written to may report `has_next` with nothing left to
//! fetch, or miss a row that appeared in between. Listings accept that in
//! exchange for a cheap read path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An ordered, filtered sequence that can be counted and sliced
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    /// Number of rows matching the source's filter
    async fn count(&self) -> Result<u64>;

    /// Rows `[offset, offset + limit)` in the source's order
    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<T>>;
}

#[async_trait]
impl<T> PageSource<T> for Vec<T>
where
    T: Clone + Send + Sync,
{
    async fn count(&self) -> Result<u64> {
        Ok(self.len() as u64)
    }

    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<T>> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.len());
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(self.iter().skip(start).take(limit).cloned().collect())
    }
}

/// Number of rows per page, always at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PageSize(u32);

impl PageSize {
    pub const DEFAULT: PageSize = PageSize(3);

    pub fn new(size: u32) -> Option<Self> {
        (size >= 1).then_some(PageSize(size))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for PageSize {
    type Error = String;

    fn try_from(size: u32) -> std::result::Result<Self, Self::Error> {
        PageSize::new(size).ok_or_else(|| "page size must be at least 1".to_string())
    }
}

impl From<PageSize> for u32 {
    fn from(size: PageSize) -> Self {
        size.0
    }
}

/// Requested page index; anything missing or below 1 means the first page
pub fn normalize_page_index(requested: Option<i64>) -> u64 {
    match requested {
        Some(index) if index >= 1 => index as u64,
        _ => 1,
    }
}

/// `ceil(total_count / page_size)`
pub fn total_pages(total_count: u64, page_size: PageSize) -> u64 {
    total_count.div_ceil(u64::from(page_size.get()))
}

/// One window of a larger sequence plus its position in the whole
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    items: Vec<T>,
    page_index: u64,
    total_pages: u64,
    total_count: u64,
    has_previous: bool,
    has_next: bool,
}

impl<T> Page<T> {
    /// Count the source, then fetch the rows belonging to `page_index`.
    ///
    /// An index past the last page yields an empty page with the paging
    /// metadata still derived from the count.
    pub async fn create<S>(source: &S, page_index: Option<i64>, page_size: PageSize) -> Result<Self>
    where
        S: PageSource<T> + ?Sized,
    {
        let page_index = normalize_page_index(page_index);
        let total_count = source.count().await?;
        let total_pages = total_pages(total_count, page_size);

        let items = if page_index > total_pages {
            Vec::new()
        } else {
            let size = u64::from(page_size.get());
            let offset = (page_index - 1).saturating_mul(size);
            source.slice(offset, size).await?
        };

        tracing::debug!(
            page_index = page_index,
            total_pages = total_pages,
            rows = items.len(),
            "Built page"
        );

        Ok(Self::from_parts(items, total_count, page_index, page_size))
    }

    /// Assemble a page from rows that were already fetched
    pub fn from_parts(items: Vec<T>, total_count: u64, page_index: u64, page_size: PageSize) -> Self {
        let page_index = page_index.max(1);
        let total_pages = total_pages(total_count, page_size);
        Self {
            items,
            page_index,
            total_pages,
            total_count,
            has_previous: page_index > 1 && total_pages > 0,
            has_next: page_index < total_pages,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn page_index(&self) -> u64 {
        self.page_index
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Drives the "previous" link
    pub fn has_previous(&self) -> bool {
        self.has_previous
    }

    /// Drives the "next" link
    pub fn has_next(&self) -> bool {
        self.has_next
    }

    /// Convert the rows while keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page_index: self.page_index,
            total_pages: self.total_pages,
            total_count: self.total_count,
            has_previous: self.has_previous,
            has_next: self.has_next,
        }
    }
}
