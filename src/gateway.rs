//! Range-based thread retrieval over the remote forum.
//!
//! A [`Gateway::get`] call walks these stages:
//!
//! 1. resolve the effective [`Range`] from the request,
//! 2. look the thread up in the [`ThreadCache`], fetching its header when cold,
//! 3. plan the fetch: the whole thread when nothing is cached, otherwise only
//!    the messages between what is cached and the end of the range,
//! 4. run the plan page by page, re-planning once against the archive if the
//!    live board reports the thread as archived,
//! 5. append what arrived, run the policy gate, commit without waiting,
//! 6. filter and slice the merged thread into a [`ThreadView`].
//!
//! Any fetch error aborts the request before the cache is touched.

use std::collections::HashSet;

use crate::{
    cache::{BookmarkCache, CacheEntry, ThreadCache},
    config::Config,
    error::Error,
    fetcher::Fetcher,
    models::{
        bookmark::Bookmark,
        listing::Listing,
        thread::{Message, ThreadState, ThreadView},
        Format,
    },
    range::{first_index_on, pages_for, urls_for, ContinuationToken, Range, DEFAULT_RANGE, PAGE_SIZE},
    result::Result,
    site::Site,
};

/// A request for part of a thread.
#[derive(Debug, Clone, Default)]
pub struct GetRequest {
    /// Thread to read.
    pub thread_id: String,
    /// Explicit window, if any.
    pub range: Option<Range>,
    /// Continuation token from a previous response, if any.
    pub token: Option<String>,
    /// Only return messages by this author ID.
    pub filter: Option<String>,
    /// Body format of the returned messages.
    pub format: Format,
}

impl GetRequest {
    /// Requests the default window of `thread_id`.
    pub fn new(thread_id: impl Into<String>) -> Self {
        GetRequest {
            thread_id: thread_id.into(),
            ..GetRequest::default()
        }
    }

    /// Sets an explicit window.
    #[must_use]
    pub fn range(mut self, start: i64, end: i64) -> Self {
        self.range = Some(Range::new(start, end));
        self
    }

    /// Resumes after a previous response.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Keeps only messages by `author_id`.
    #[must_use]
    pub fn filter(mut self, author_id: impl Into<String>) -> Self {
        self.filter = Some(author_id.into());
        self
    }

    /// Renders bodies in `format`.
    #[must_use]
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// The window this request asks for.
    ///
    /// An explicit range must be valid. A parsable token then takes precedence
    /// over it; an unparsable one is ignored.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] for an invalid explicit range, or for a token
    /// whose next window does not fit in an `i64`.
    pub fn effective_range(&self) -> Result<Range> {
        let mut range = match self.range {
            Some(range) => range.validate()?,
            None => DEFAULT_RANGE,
        };
        if let Some(token) = self.token.as_deref().filter(|t| !t.trim().is_empty()) {
            match token.parse::<ContinuationToken>() {
                Ok(token) => range = token.range()?,
                Err(_) => log::debug!("ignoring unparsable token {token:?}"),
            }
        }
        Ok(range)
    }
}

/// What has to be fetched to serve a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    /// The cache already covers the range.
    Nothing,
    /// Nothing is cached; fetch the whole thread.
    Full { archived: bool },
    /// Fetch messages `old + 1 ..= new`.
    Extend { old: usize, new: i64, archived: bool },
}

impl Plan {
    fn for_state(state: &ThreadState, range: Range) -> Self {
        let archived = state.archived();
        let known = state.len();
        if known == 0 {
            Plan::Full { archived }
        } else if range.end > i64::try_from(known).unwrap_or(i64::MAX) {
            Plan::Extend {
                old: known,
                new: range.end,
                archived,
            }
        } else {
            Plan::Nothing
        }
    }
}

/// Serves thread, listing and bookmark requests against one remote forum.
#[derive(Debug)]
pub struct Gateway<F> {
    fetcher: F,
    site: Site,
    threads: ThreadCache,
    bookmarks: BookmarkCache,
    fallback_query: String,
}

impl<F: Fetcher> Gateway<F> {
    /// Builds a gateway and its caches from `config`.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if the configured thread cache cannot be set up.
    pub fn new(fetcher: F, config: &Config) -> Result<Self> {
        Ok(Self::with_caches(
            fetcher,
            config.site.clone(),
            ThreadCache::from_config(&config.cache)?,
            BookmarkCache::from_config(&config.bookmarks),
            &config.bookmarks.fallback_query,
        ))
    }

    /// Builds a gateway around caches constructed by the caller.
    pub fn with_caches(
        fetcher: F,
        site: Site,
        threads: ThreadCache,
        bookmarks: BookmarkCache,
        fallback_query: &str,
    ) -> Self {
        Gateway {
            fetcher,
            site,
            threads,
            bookmarks,
            fallback_query: fallback_query.to_string(),
        }
    }

    /// Returns the thread cache.
    pub fn threads(&self) -> &ThreadCache {
        &self.threads
    }

    /// Returns the bookmark cache.
    pub fn bookmarks(&self) -> &BookmarkCache {
        &self.bookmarks
    }

    /// Returns the fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Reads part of a thread.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] before any fetch for a bad explicit range;
    /// otherwise whatever the fetcher reported. Nothing is cached on error.
    pub async fn get(&self, req: &GetRequest) -> Result<ThreadView> {
        let id = req.thread_id.as_str();
        let range = req.effective_range()?;

        let guard = self.threads.lock(id).await;
        let mut state = match self.threads.get(id).await {
            Some(state) => state,
            None => self.fetch_header(id).await?,
        };

        let mut plan = Plan::for_state(&state, range);
        let mut replanned = false;
        let incoming = loop {
            log::debug!("thread {id}: {plan:?} for {range}");
            let outcome = self.run(&state, plan).await;
            match outcome {
                Ok(incoming) => break incoming,
                Err(Error::Archived(_)) if !replanned => {
                    log::info!("thread {id} moved to the archive, re-planning");
                    replanned = true;
                    state.mark_archived();
                    plan = Plan::for_state(&state, range);
                }
                Err(e) => return Err(e),
            }
        };

        let added = merge(&mut state, incoming);
        if matches!(plan, Plan::Full { .. }) {
            state.recount();
        }
        let entry = CacheEntry::assess(state);
        let view = respond(&entry.state, req, range);
        // a re-plan flipped the thread to archived; keep that even with nothing new
        if added > 0 || replanned {
            self.threads.commit(entry, guard).await;
        }
        Ok(view)
    }

    /// Lists threads matching `query` and refreshes `username`'s bookmarks from
    /// the same page.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the listing has no rows, or any fetch error.
    pub async fn list(&self, username: &str, query: &str) -> Result<Listing> {
        let page = self
            .fetcher
            .fetch_listing(&self.site.topics_url(query))
            .await?;
        self.remember(username, &page.bookmarks);

        if page.threads.is_empty() {
            return Err(Error::NotFound(format!("no results: {query}")));
        }
        Ok(Listing::new(query, page.threads))
    }

    /// Returns `username`'s bookmarks, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Any fetch error on a cache miss.
    pub async fn bookmark_list(&self, username: &str) -> Result<Vec<Bookmark>> {
        if let Some(bookmarks) = self.bookmarks.get(username) {
            return Ok(bookmarks);
        }
        let page = self
            .fetcher
            .fetch_listing(&self.site.topics_url(&self.fallback_query))
            .await?;
        self.remember(username, &page.bookmarks);
        Ok(page.bookmarks)
    }

    fn remember(&self, username: &str, bookmarks: &[Bookmark]) {
        if !bookmarks.is_empty() {
            self.bookmarks.set(username, bookmarks.to_vec());
        }
    }

    async fn fetch_header(&self, id: &str) -> Result<ThreadState> {
        let url = self.site.thread_page_url(id, 1, false);
        let page = self.fetcher.fetch_thread_page(&url, false).await?;
        Ok(ThreadState::new(id, page.meta))
    }

    async fn run(&self, state: &ThreadState, plan: Plan) -> Result<Vec<Message>> {
        let id = state.id();
        match plan {
            Plan::Nothing => Ok(Vec::new()),
            Plan::Full { archived: false } => self.batch(id, 0, Range::ALL.end).await,
            Plan::Full { archived: true } => {
                let end = if state.pages() > 0 {
                    state.pages() * PAGE_SIZE
                } else {
                    Range::ALL.end
                };
                self.archive_pages(id, Range::new(1, end)).await
            }
            Plan::Extend {
                old,
                new,
                archived: false,
            } => self.batch(id, old, new).await,
            Plan::Extend {
                old,
                new,
                archived: true,
            } => {
                let old = i64::try_from(old).unwrap_or(i64::MAX);
                self.archive_pages(id, Range::new(old.saturating_add(1), new)).await
            }
        }
    }

    async fn batch(&self, id: &str, old: usize, new: i64) -> Result<Vec<Message>> {
        let url = self.site.batch_url(id, old, new);
        let mut messages = self.fetcher.fetch_batch(id, &url).await?.messages;
        let wanted = Range::new(i64::try_from(old).unwrap_or(i64::MAX).saturating_add(1), new).len();
        messages.truncate(wanted);
        Ok(messages)
    }

    /// Messages `range.start ..= range.end` from the archive, stopping at the
    /// first short page.
    async fn archive_pages(&self, id: &str, range: Range) -> Result<Vec<Message>> {
        let urls = urls_for(&self.site, id, range, true)?;
        let (first_page, _) = pages_for(range);
        let mut messages = Vec::new();

        for (page, url) in (first_page..).zip(&urls) {
            let fetched = self.fetcher.fetch_thread_page(url, true).await?.messages;
            let short = i64::try_from(fetched.len()).is_ok_and(|n| n < PAGE_SIZE);
            messages.extend(
                (first_index_on(page)..)
                    .zip(fetched)
                    .filter(|(index, _)| *index >= range.start && *index <= range.end)
                    .map(|(_, msg)| msg),
            );
            if short {
                break;
            }
        }
        Ok(messages)
    }
}

/// Appends messages not already held. Returns how many were added.
fn merge(state: &mut ThreadState, incoming: Vec<Message>) -> usize {
    let fresh: Vec<Message> = {
        let seen: HashSet<&str> = state
            .iter()
            .map(Message::id)
            .filter(|id| !id.is_empty())
            .collect();
        incoming
            .into_iter()
            .filter(|m| m.id().is_empty() || !seen.contains(m.id()))
            .collect()
    };
    let added = fresh.len();
    if added > 0 {
        state.append(fresh);
    }
    added
}

fn respond(state: &ThreadState, req: &GetRequest, range: Range) -> ThreadView {
    let filtered: Vec<&Message> = match req.filter.as_deref() {
        Some(author) => state.iter().filter(|m| m.author_id() == author).collect(),
        None => state.iter().collect(),
    };
    let len = filtered.len();
    let (start, stop) = range.slice_bounds(len);
    let start = start.min(stop);

    let delivered = match (i64::try_from(start), i64::try_from(stop)) {
        (Ok(first), Ok(last)) if start < stop => Range::new(first + 1, last),
        _ => range,
    };

    ThreadView {
        id: state.id().to_string(),
        title: state.title().to_string(),
        tags: state.tags().to_vec(),
        closed: state.closed(),
        total: state.total(),
        messages: filtered[start..stop]
            .iter()
            .map(|m| m.render(req.format))
            .collect(),
        range: delivered,
        more: stop < len,
        next_token: ContinuationToken(stop).to_string(),
        filter: req.filter.clone(),
        format: req.format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::thread::ThreadMeta;

    fn thread(n: usize) -> ThreadState {
        let mut state = ThreadState::new(
            "1",
            ThreadMeta {
                title: String::from("t"),
                pages: 1,
                ..ThreadMeta::default()
            },
        );
        merge(
            &mut state,
            (1..=n)
                .map(|i| Message::new(i.to_string(), "a", (i % 2).to_string(), "", "b"))
                .collect(),
        );
        state
    }

    #[test]
    fn explicit_range_checked_before_token() {
        let req = GetRequest::new("1").range(5, 2).token("50");
        assert!(matches!(req.effective_range(), Err(Error::InvalidRange { .. })));
    }

    #[test]
    fn token_overrides_range() {
        let req = GetRequest::new("1").range(1, 10).token("50");
        assert_eq!(req.effective_range().unwrap(), Range::new(51, 100));

        let req = GetRequest::new("1").range(1, 10).token("garbage");
        assert_eq!(req.effective_range().unwrap(), Range::new(1, 10));

        assert_eq!(GetRequest::new("1").effective_range().unwrap(), DEFAULT_RANGE);
    }

    #[test]
    fn oversized_token_is_an_invalid_range() {
        for token in [i64::MAX.to_string(), (i64::MAX - 10).to_string()] {
            let req = GetRequest::new("1").token(token);
            assert!(matches!(req.effective_range(), Err(Error::InvalidRange { .. })));
        }
    }

    #[test]
    fn plans() {
        assert_eq!(
            Plan::for_state(&thread(0), DEFAULT_RANGE),
            Plan::Full { archived: false }
        );
        assert_eq!(
            Plan::for_state(&thread(50), Range::new(1, 100)),
            Plan::Extend {
                old: 50,
                new: 100,
                archived: false
            }
        );
        assert_eq!(Plan::for_state(&thread(50), Range::new(10, 50)), Plan::Nothing);
    }

    #[test]
    fn merge_skips_known_ids() {
        let mut state = thread(3);
        let added = merge(
            &mut state,
            vec![
                Message::new("3", "a", "1", "", "dup"),
                Message::new("4", "a", "1", "", "new"),
            ],
        );
        assert_eq!(added, 1);
        assert_eq!(state.total(), 4);
        assert_eq!(state[3].id(), "4");
    }

    #[test]
    fn slice_past_the_end() {
        let view = respond(&thread(40), &GetRequest::new("1"), Range::new(1000, 1050));
        assert!(view.messages.is_empty());
        assert!(!view.more);
        assert_eq!(view.next_token, "40");
    }

    #[test]
    fn slice_middle() {
        let view = respond(&thread(120), &GetRequest::new("1"), Range::new(51, 100));
        assert_eq!(view.messages.len(), 50);
        assert_eq!(view.messages[0].id(), "51");
        assert_eq!(view.range, Range::new(51, 100));
        assert!(view.more);
        assert_eq!(view.next_token, "100");
    }

    #[test]
    fn empty_thread_has_no_more() {
        let view = respond(&thread(0), &GetRequest::new("1"), DEFAULT_RANGE);
        assert!(view.messages.is_empty());
        assert!(!view.more);
        assert_eq!(view.next_token, "0");
    }

    #[test]
    fn filter_before_slice() {
        // odd ids have author "1": 30 of 60
        let req = GetRequest::new("1").filter("1");
        let view = respond(&thread(60), &req, Range::new(21, 40));
        assert_eq!(view.messages.len(), 10);
        assert_eq!(view.messages[0].id(), "41");
        assert!(!view.more);
        assert_eq!(view.next_token, "30");
        assert_eq!(view.total, 60);
    }
}
