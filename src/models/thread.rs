use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    extract::html_to_text,
    models::{macros::str_opt_ref, Format},
    range::{Range, PAGE_SIZE},
};

/// Author name used when the remote hides the poster.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// Author ID used when the remote hides the poster.
pub const ANONYMOUS_ID: &str = "-1";

/// Everything known about one remote thread.
///
/// `messages` is always a prefix of the thread as the remote holds it: merges
/// only ever append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadState {
    id: String,
    title: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    closed: bool,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    pages: i64,
    total: usize,
    messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated: Option<DateTime<Utc>>,
}

impl ThreadState {
    /// Starts an empty state from a freshly fetched thread page.
    ///
    /// `total` is only an estimate (`pages * 50`) until messages are merged.
    pub fn new(id: &str, meta: ThreadMeta) -> Self {
        let pages = meta.pages.max(0);
        ThreadState {
            id: id.to_string(),
            title: meta.title,
            tags: meta.tags,
            closed: meta.closed || meta.archived,
            archived: meta.archived,
            pages,
            total: usize::try_from(pages * PAGE_SIZE).unwrap_or(0),
            messages: Vec::new(),
            updated: None,
        }
    }

    /// Returns the thread ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the thread title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the tags in display order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns whether replies are closed.
    pub fn closed(&self) -> bool {
        self.closed
    }

    /// Returns whether the thread lives in the archive.
    pub fn archived(&self) -> bool {
        self.archived
    }

    /// Returns the last page number reported when the thread was first seen.
    pub fn pages(&self) -> i64 {
        self.pages
    }

    /// Returns how many messages are known.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns when messages were last merged in.
    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.updated
    }

    pub(crate) fn mark_archived(&mut self) {
        self.archived = true;
        self.closed = true;
    }

    /// Drops the page-count estimate once the whole thread has been read.
    pub(crate) fn recount(&mut self) {
        self.total = self.messages.len();
    }

    /// Appends newly fetched messages and recounts.
    pub(crate) fn append(&mut self, incoming: Vec<Message>) {
        self.messages.extend(incoming);
        self.total = self.messages.len();
        self.updated = Some(Utc::now());
    }
}

impl std::ops::Deref for ThreadState {
    type Target = Vec<Message>;

    fn deref(&self) -> &Self::Target {
        &self.messages
    }
}

/// One post in a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    author: String,
    author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar: Option<String>,
    date: String,
    body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(default)]
    mod_note: bool,
}

impl Message {
    /// Creates a message with no signature, title or avatar.
    pub fn new(
        id: impl Into<String>,
        author: impl Into<String>,
        author_id: impl Into<String>,
        date: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Message {
            id: id.into(),
            author: author.into(),
            author_id: author_id.into(),
            author_title: None,
            avatar: None,
            date: date.into(),
            body: body.into(),
            signature: None,
            mod_note: false,
        }
    }

    /// Sets the signature.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Sets the author's user title.
    #[must_use]
    pub fn with_author_title(mut self, title: impl Into<String>) -> Self {
        self.author_title = Some(title.into());
        self
    }

    /// Sets the avatar thumbnail URL.
    #[must_use]
    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar = Some(url.into());
        self
    }

    /// Marks the message as carrying a moderator note.
    #[must_use]
    pub fn with_mod_note(mut self) -> Self {
        self.mod_note = true;
        self
    }

    /// Returns the message ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the author's name.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Returns the author's ID.
    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    /// Returns the author's user title (if present).
    pub fn author_title(&self) -> Option<&str> {
        str_opt_ref!(self.author_title)
    }

    /// Returns the avatar thumbnail URL (if present).
    pub fn avatar(&self) -> Option<&str> {
        str_opt_ref!(self.avatar)
    }

    /// Returns the post date as the remote formats it.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Returns the body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the signature (if present).
    pub fn signature(&self) -> Option<&str> {
        str_opt_ref!(self.signature)
    }

    /// Returns whether a moderator note was attached.
    pub fn mod_note(&self) -> bool {
        self.mod_note
    }

    /// Returns whether the poster was hidden.
    pub fn is_anonymous(&self) -> bool {
        self.author_id == ANONYMOUS_ID || self.author_id.starts_with('-')
    }

    /// Copy of this message with body and signature in `format`.
    pub fn render(&self, format: Format) -> Message {
        match format {
            Format::Html => self.clone(),
            Format::Text => Message {
                body: html_to_text(&self.body),
                signature: self.signature.as_deref().map(html_to_text),
                ..self.clone()
            },
        }
    }
}

/// Thread attributes shown above the first message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadMeta {
    /// Thread title.
    pub title: String,
    /// Tags, in display order.
    pub tags: Vec<String>,
    /// True if replies are closed.
    pub closed: bool,
    /// True if the thread was moved to the archive.
    pub archived: bool,
    /// Number of the last page.
    pub pages: i64,
}

/// One fetched page of a thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadPage {
    /// Attributes from the page header.
    pub meta: ThreadMeta,
    /// The messages on this page, in order.
    pub messages: Vec<Message>,
}

/// Messages returned by the batch endpoint.
#[derive(Debug, Clone, Default)]
pub struct MessageBatch {
    /// The messages, in order.
    pub messages: Vec<Message>,
}

/// The slice of a thread handed back to a caller.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadView {
    /// Thread ID.
    pub id: String,
    /// Thread title.
    pub title: String,
    /// Tags, in display order.
    pub tags: Vec<String>,
    /// True if replies are closed.
    pub closed: bool,
    /// Messages known for the thread before filtering.
    pub total: usize,
    /// The delivered messages.
    pub messages: Vec<Message>,
    /// Window actually delivered, 1-based inclusive.
    pub range: Range,
    /// True if messages remain past this window.
    pub more: bool,
    /// Token resuming after this window.
    pub next_token: String,
    /// Author ID the messages were filtered by.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Body format of `messages`.
    pub format: Format,
}
