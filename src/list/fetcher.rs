use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::ListPage;

/// Source of pages for a list controller.
///
/// Failures carry a message suitable for showing next to the table.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch_page(&self, page: u32, search: &str) -> Result<ListPage<T>, ApiError>;
}

/// Adapter turning an async closure `(page, search) -> ListPage<T>` into a fetcher
pub struct FnFetcher<F>(F);

#[async_trait]
impl<T, F, Fut> PageFetcher<T> for FnFetcher<F>
where
    T: Send + 'static,
    F: Fn(u32, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ListPage<T>, ApiError>> + Send,
{
    async fn fetch_page(&self, page: u32, search: &str) -> Result<ListPage<T>, ApiError> {
        (self.0)(page, search.to_string()).await
    }
}

pub fn fetch_fn<T, F, Fut>(f: F) -> Arc<dyn PageFetcher<T>>
where
    T: Send + 'static,
    F: Fn(u32, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ListPage<T>, ApiError>> + Send + 'static,
{
    Arc::new(FnFetcher(f))
}
