use crate::error::SourceError;
use futures::stream::{self, Stream, TryStreamExt};
use std::future::Future;

/// How a paginated endpoint signals its last page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTermination {
    /// A page shorter than `per_page` is the last one
    ShortPage { per_page: usize },
    /// The server reports the number of pages with each page
    PageCount,
}

/// One fetched page
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total page count, when the endpoint reports one
    pub page_count: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            page_count: None,
        }
    }

    pub fn with_page_count(mut self, page_count: Option<u32>) -> Self {
        self.page_count = page_count;
        self
    }
}

impl PageTermination {
    fn is_last<T>(&self, page: u32, fetched: &Page<T>) -> bool {
        match self {
            PageTermination::ShortPage { per_page } => fetched.items.len() < *per_page,
            // A missing count means the endpoint had a single page
            PageTermination::PageCount => page >= fetched.page_count.unwrap_or(1),
        }
    }
}

/// Lazily fetch pages starting at 1 until `termination` says stop.
///
/// Nothing is requested until the stream is polled, and dropping the stream
/// early stops fetching.
pub fn paginate_pages<'a, T, F, Fut>(
    termination: PageTermination,
    fetch_page: F,
) -> impl Stream<Item = Result<Vec<T>, SourceError>> + 'a
where
    T: 'a,
    F: FnMut(u32) -> Fut + 'a,
    Fut: Future<Output = Result<Page<T>, SourceError>> + 'a,
{
    stream::try_unfold((fetch_page, Some(1u32)), move |(mut fetch_page, next)| async move {
        let Some(page) = next else {
            return Ok(None);
        };

        let fetched = fetch_page(page).await?;
        let next = if termination.is_last(page, &fetched) {
            None
        } else {
            Some(page + 1)
        };

        Ok(Some((fetched.items, (fetch_page, next))))
    })
}

/// Like [`paginate_pages`], flattened to single items
pub fn paginate<'a, T, F, Fut>(
    termination: PageTermination,
    fetch_page: F,
) -> impl Stream<Item = Result<T, SourceError>> + 'a
where
    T: 'a,
    F: FnMut(u32) -> Fut + 'a,
    Fut: Future<Output = Result<Page<T>, SourceError>> + 'a,
{
    paginate_pages(termination, fetch_page)
        .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
        .try_flatten()
}
