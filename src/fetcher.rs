use async_trait::async_trait;

use crate::{
    models::{
        listing::ListingPage,
        thread::{MessageBatch, ThreadPage},
    },
    result::Result,
};

/// One logical fetch per URL against the remote forum.
///
/// Implementations never retry; a failure is reported as the matching
/// [`Error`](crate::error::Error) variant and the caller decides what to do.
///
/// # Errors
///
/// Every method fails with the variant describing what the remote answered:
/// [`SessionExpired`](crate::error::Error::SessionExpired),
/// [`AccessDenied`](crate::error::Error::AccessDenied),
/// [`Archived`](crate::error::Error::Archived), or a transport failure.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches one thread page. `archived` is set when `url` points at the archive host.
    async fn fetch_thread_page(&self, url: &str, archived: bool) -> Result<ThreadPage>;

    /// Fetches a run of messages from the batch endpoint.
    async fn fetch_batch(&self, thread_id: &str, url: &str) -> Result<MessageBatch>;

    /// Fetches a topic listing page.
    async fn fetch_listing(&self, url: &str) -> Result<ListingPage>;
}
