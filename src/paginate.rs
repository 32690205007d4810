//! Walking every page of a paginated resource.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::Result;

/// Whether the forum served a page or refused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageStatus {
    /// The page was served.
    Ok,
    /// The forum answered with `status: error`.
    Error,
}

/// One page of a paginated resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult<T> {
    status: PageStatus,
    items: Vec<T>,
    pages_count: Option<u32>,
}

impl<T> PageResult<T> {
    /// A served page with its items in top-to-bottom order.
    pub fn ok(items: Vec<T>, pages_count: Option<u32>) -> Self {
        Self {
            status: PageStatus::Ok,
            items,
            pages_count,
        }
    }

    /// A refused page.
    pub fn error() -> Self {
        Self {
            status: PageStatus::Error,
            items: Vec::new(),
            pages_count: None,
        }
    }

    /// Returns the page status.
    pub fn status(&self) -> PageStatus {
        self.status
    }

    /// Returns the items found on the page.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consumes the page, returning its items.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Returns the page count shown by the pager, if it could be read.
    pub fn pages_count(&self) -> Option<u32> {
        self.pages_count
    }

    /// Returns the items of a served page, `None` for a refused one.
    pub fn into_option(self) -> Option<Vec<T>> {
        match self.status {
            PageStatus::Ok => Some(self.items),
            PageStatus::Error => None,
        }
    }
}

/// Fetches single pages of a resource.
#[async_trait]
pub trait PageFetcher: Sync {
    /// The kind of item a page lists.
    type Item: Send;

    /// Fetches page `page` (1-based) of `resource_id`.
    async fn fetch_page(&self, resource_id: u64, page: u32) -> Result<PageResult<Self::Item>>;
}

/// All items of a resource, first page to last, top to bottom.
///
/// Items are not de-duplicated: if the resource changes between two page
/// requests, an item may show up twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedCollection<T> {
    items: Vec<T>,
    pages_fetched: u32,
}

impl<T> AggregatedCollection<T> {
    /// Returns how many pages were requested, including the one that ended
    /// the walk.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Consumes the collection, returning its items.
    pub fn into_inner(self) -> Vec<T> {
        self.items
    }
}

impl<T> std::ops::Deref for AggregatedCollection<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

/// Collects every page of `resource_id`, starting at page 1.
///
/// The walk stops at the first page that is refused or empty, or once the
/// page count shown on page 1 has been reached. A missing or unreadable page
/// count on page 1 counts as a single page. Items gathered before the walk
/// stopped are always returned.
///
/// # Errors
///
/// A transport failure from `fetcher` ends the walk and is returned as-is;
/// it is not retried.
pub async fn collect_all_pages<F>(
    resource_id: u64,
    fetcher: &F,
) -> Result<AggregatedCollection<F::Item>>
where
    F: PageFetcher + ?Sized,
{
    let mut items = Vec::new();
    let mut total = 1;
    let mut page = 1;

    loop {
        let result = fetcher.fetch_page(resource_id, page).await?;
        if result.status() == PageStatus::Error {
            log::debug!("page {page} of {resource_id} refused, stopping");
            break;
        }
        if page == 1 {
            total = result.pages_count().unwrap_or_else(|| {
                log::debug!("no page count on {resource_id}, assuming a single page");
                1
            });
        }
        if result.items().is_empty() {
            log::debug!("page {page} of {resource_id} is empty, stopping");
            break;
        }
        items.extend(result.into_items());

        if page >= total {
            break;
        }
        page += 1;
    }

    Ok(AggregatedCollection {
        items,
        pages_fetched: page,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use pretty_assertions::assert_eq;

    /// Serves pre-baked pages and remembers which ones were asked for.
    struct Pages {
        pages: Vec<PageResult<u64>>,
        requested: Mutex<Vec<u32>>,
    }

    impl Pages {
        fn new(pages: Vec<PageResult<u64>>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for Pages {
        type Item = u64;

        async fn fetch_page(&self, _resource_id: u64, page: u32) -> Result<PageResult<u64>> {
            self.requested.lock().unwrap().push(page);
            Ok(self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_else(PageResult::error))
        }
    }

    #[tokio::test]
    async fn three_pages_then_error() {
        let pages = Pages::new(vec![
            PageResult::ok(vec![1, 2], Some(4)),
            PageResult::ok(vec![3, 4], None),
            PageResult::ok(vec![5, 6], None),
            PageResult::error(),
        ]);

        let all = collect_all_pages(10, &pages).await.unwrap();

        assert_eq!(*all, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(pages.requested(), vec![1, 2, 3, 4]);
        assert_eq!(all.pages_fetched(), 4);
    }

    #[tokio::test]
    async fn empty_page_ends_walk() {
        let pages = Pages::new(vec![
            PageResult::ok(vec![1], Some(5)),
            PageResult::ok(vec![2], None),
            PageResult::ok(vec![], None),
            PageResult::ok(vec![9], None),
        ]);

        let all = collect_all_pages(1, &pages).await.unwrap();

        assert_eq!(*all, vec![1, 2]);
        assert_eq!(pages.requested(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn stops_at_page_count() {
        let pages = Pages::new(vec![
            PageResult::ok(vec![1, 2], Some(2)),
            PageResult::ok(vec![3], Some(7)),
            PageResult::ok(vec![4], None),
        ]);

        let all = collect_all_pages(1, &pages).await.unwrap();

        assert_eq!(*all, vec![1, 2, 3]);
        assert_eq!(pages.requested(), vec![1, 2]);
    }

    #[tokio::test]
    async fn missing_page_count_means_one_page() {
        let pages = Pages::new(vec![
            PageResult::ok(vec![1, 2], None),
            PageResult::ok(vec![3, 4], None),
        ]);

        let all = collect_all_pages(1, &pages).await.unwrap();

        assert_eq!(*all, vec![1, 2]);
        assert_eq!(pages.requested(), vec![1]);
    }

    #[tokio::test]
    async fn first_page_refused() {
        let pages = Pages::new(vec![PageResult::error()]);
        let all = collect_all_pages(1, &pages).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn duplicates_are_kept() {
        let pages = Pages::new(vec![
            PageResult::ok(vec![1, 2], Some(2)),
            PageResult::ok(vec![2, 3], None),
        ]);
        let all = collect_all_pages(1, &pages).await.unwrap();
        assert_eq!(all.into_inner(), vec![1, 2, 2, 3]);
    }
}
