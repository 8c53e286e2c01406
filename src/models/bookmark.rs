use serde::{Deserialize, Serialize};

/// A saved listing query from a user's bookmark sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    name: String,
    query: String,
}

impl Bookmark {
    /// Creates a bookmark named `name` pointing at listing `query`.
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Bookmark {
            name: name.into(),
            query: query.into(),
        }
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the listing query, e.g. `LUE-Anonymous`.
    pub fn query(&self) -> &str {
        &self.query
    }
}
