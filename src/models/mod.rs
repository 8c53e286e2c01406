/// Saved listing queries.
pub mod bookmark;
/// Topic listings.
pub mod listing;
/// Thread state, messages and views.
pub mod thread;

use serde::{Deserialize, Serialize};

/// Body format a caller wants messages rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Markup as the remote served it.
    #[default]
    Html,
    /// Markup stripped down to its text content.
    Text,
}

pub(crate) mod macros {
    macro_rules! str_opt_ref {
        ($x:expr) => {
            $x.as_ref().map(|x| x.as_ref())
        };
    }

    pub(crate) use str_opt_ref;
}
