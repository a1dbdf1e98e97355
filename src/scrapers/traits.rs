use crate::error::FetchError;
use async_trait::async_trait;

/// One rendered search-results page, by 1-based page index.
///
/// Implementations must wait for dynamically rendered content before
/// returning. Retrying is deliberately left to the pagination driver so a
/// transient failure never loses pagination state.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<String, FetchError>;
}
