//! Message ranges, continuation tokens and the mapping from ranges onto the
//! remote site's fixed-size pages.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::Error, result::Result, site::Site};

/// Number of messages the remote shows per page.
pub const PAGE_SIZE: i64 = 50;

/// Largest page span a single request may enumerate.
///
/// Threads are capped at 500 pages (501 on occasion), so 555 is a safe bet.
pub const MAX_PAGE_SPAN: i64 = 555;

/// Range used when the caller supplies neither a range nor a token.
pub const DEFAULT_RANGE: Range = Range { start: 1, end: 50 };

/// A 1-based, inclusive window over a thread's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// First message index, starting at 1.
    pub start: i64,
    /// Last message index, inclusive.
    pub end: i64,
}

impl Range {
    /// Sentinel meaning "every message the thread has".
    pub const ALL: Range = Range {
        start: 1,
        end: (MAX_PAGE_SPAN + 1) * PAGE_SIZE,
    };

    /// Builds a range without validating it.
    pub const fn new(start: i64, end: i64) -> Self {
        Range { start, end }
    }

    /// Returns true if the range starts at 1 or later and does not run backwards.
    pub fn is_valid(&self) -> bool {
        self.start >= 1 && self.end >= self.start
    }

    /// Returns the range itself, or [`Error::InvalidRange`].
    ///
    /// # Errors
    ///
    /// Fails when [`Range::is_valid`] is false.
    pub fn validate(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(self.invalid())
        }
    }

    /// Number of messages the range covers.
    pub fn len(&self) -> usize {
        usize::try_from(self.end - self.start + 1).unwrap_or(0)
    }

    /// Returns true if the range covers nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-based, half-open slice bounds of this range clamped to `len` items.
    ///
    /// The start may exceed the end when the range lies past `len`.
    pub fn slice_bounds(&self, len: usize) -> (usize, usize) {
        let start = usize::try_from(self.start - 1).unwrap_or(0);
        let end = usize::try_from(self.end).unwrap_or(0).min(len);
        (start, end)
    }

    fn invalid(self) -> Error {
        Error::InvalidRange {
            start: self.start,
            end: self.end,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// The last message index a caller has already consumed.
///
/// Serializes as a decimal integer; the transport treats it as an opaque string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContinuationToken(pub usize);

impl ContinuationToken {
    /// The next window after this token, one default range long.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRange`] when the window would run past `i64::MAX`.
    pub fn range(self) -> Result<Range> {
        let last = i64::try_from(self.0).unwrap_or(i64::MAX);
        match (last.checked_add(1), last.checked_add(DEFAULT_RANGE.end)) {
            (Some(start), Some(end)) => Ok(Range::new(start, end)),
            _ => Err(Range::new(last.saturating_add(1), last.saturating_add(DEFAULT_RANGE.end)).invalid()),
        }
    }
}

impl FromStr for ContinuationToken {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(ContinuationToken)
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Page number holding the message at 1-based `index`.
pub fn page_of(index: i64) -> i64 {
    (index - 1).div_euclid(PAGE_SIZE) + 1
}

/// First and last remote page touched by `range`.
pub fn pages_for(range: Range) -> (i64, i64) {
    (page_of(range.start), page_of(range.end))
}

/// Global 1-based index of the first message on `page`.
pub fn first_index_on(page: i64) -> i64 {
    (page - 1) * PAGE_SIZE + 1
}

/// Page URLs covering `range`, in page order.
///
/// # Errors
///
/// Returns [`Error::InvalidRange`] if the range is invalid or spans more than
/// [`MAX_PAGE_SPAN`] pages.
pub fn urls_for(site: &Site, thread_id: &str, range: Range, archived: bool) -> Result<Vec<String>> {
    let range = range.validate()?;
    let (start_page, end_page) = pages_for(range);
    if start_page > end_page || end_page - start_page > MAX_PAGE_SPAN {
        return Err(range.invalid());
    }

    Ok((start_page..=end_page)
        .map(|page| site.thread_page_url(thread_id, page, archived))
        .collect())
}
