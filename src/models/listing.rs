use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;

/// The threads matching one listing query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    query: String,
    threads: Vec<ThreadListing>,
}

impl Listing {
    pub(crate) fn new(query: &str, threads: Vec<ThreadListing>) -> Self {
        Listing {
            query: query.to_string(),
            threads,
        }
    }

    /// Returns the query this listing answers.
    pub fn query(&self) -> &str {
        &self.query
    }
}

impl std::ops::Deref for Listing {
    type Target = Vec<ThreadListing>;

    fn deref(&self) -> &Self::Target {
        &self.threads
    }
}

/// A row of a topic listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadListing {
    /// Thread ID.
    pub id: String,
    /// Thread title.
    pub title: String,
    /// Name of the thread starter, `Anonymous` when hidden.
    pub author: String,
    /// ID of the thread starter, `-1` when hidden.
    pub author_id: String,
    /// Last activity, as shown by the remote.
    pub date: String,
    /// Number of messages in the thread.
    pub post_count: u32,
    /// Messages posted since the caller last read the thread.
    pub unread_posts: u32,
    /// Tags, in display order.
    pub tags: Vec<String>,
    /// True for pinned threads.
    pub sticky: bool,
    /// True if replies are closed.
    pub closed: bool,
}

/// Everything one listing page yields.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// The listing rows.
    pub threads: Vec<ThreadListing>,
    /// The user's bookmark sidebar, embedded in every listing page.
    pub bookmarks: Vec<Bookmark>,
}
