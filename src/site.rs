//! Remote URL layout.

use serde::Deserialize;

/// Where the remote forum lives and how it identifies its login page.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Site {
    boards: String,
    archives: String,
    login_title: String,
    user_agent: String,
}

impl Default for Site {
    fn default() -> Self {
        Site {
            boards: String::from("http://boards.endoftheinter.net"),
            archives: String::from("http://archives.endoftheinter.net"),
            login_title: String::from("Das Ende des Internets"),
            user_agent: String::from("EtiRelay/0.1"),
        }
    }
}

impl Site {
    /// Builds a site rooted at the given live and archive hosts.
    pub fn new(boards: impl Into<String>, archives: impl Into<String>) -> Self {
        Site {
            boards: boards.into(),
            archives: archives.into(),
            ..Site::default()
        }
    }

    /// Base URL of the live boards.
    pub fn boards(&self) -> &str {
        self.boards.trim_end_matches('/')
    }

    /// Base URL of the archive.
    pub fn archives(&self) -> &str {
        self.archives.trim_end_matches('/')
    }

    /// Title of the page served in place of content once a session lapses.
    pub fn login_title(&self) -> &str {
        &self.login_title
    }

    /// `User-Agent` sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// One page of a thread, on the archive host when `archived`.
    pub fn thread_page_url(&self, thread_id: &str, page: i64, archived: bool) -> String {
        let host = if archived {
            self.archives()
        } else {
            self.boards()
        };
        format!("{host}/showmessages.php?topic={thread_id}&page={page}")
    }

    /// The message batch endpoint. `old=1, new=3` yields messages 2 and 3.
    pub fn batch_url(&self, thread_id: &str, old: usize, new: i64) -> String {
        format!(
            "{}/moremessages.php?topic={thread_id}&old={old}&new={new}&filter=0",
            self.boards()
        )
    }

    /// A topic listing for `query`.
    pub fn topics_url(&self, query: &str) -> String {
        format!("{}/topics/{}", self.boards(), query.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls() {
        let site = Site::new("http://boards.test/", "http://archives.test");
        assert_eq!(
            site.thread_page_url("99", 2, false),
            "http://boards.test/showmessages.php?topic=99&page=2"
        );
        assert_eq!(
            site.thread_page_url("99", 1, true),
            "http://archives.test/showmessages.php?topic=99&page=1"
        );
        assert_eq!(
            site.batch_url("99", 50, 100),
            "http://boards.test/moremessages.php?topic=99&old=50&new=100&filter=0"
        );
        assert_eq!(site.topics_url("LUE"), "http://boards.test/topics/LUE");
    }
}
