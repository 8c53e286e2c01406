//! Decides whether a merged thread may be written to a shared store.

use std::fmt;

use crate::models::thread::ThreadState;

/// Tags on boards only some users may read.
pub const DANGER_TAGS: [&str; 3] = ["TCF", "TCF Lite", "Moderations"];

/// Suffix marking invite-only social tags.
pub const SOCIAL_SUFFIX: &str = "(social)";

/// Why a thread must not be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Danger {
    /// A restricted tag.
    Tag(String),
    /// A message carrying a moderator note.
    ModNote(String),
}

impl fmt::Display for Danger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Danger::Tag(tag) => write!(f, "restricted tag {tag}"),
            Danger::ModNote(id) => write!(f, "moderator note on message {id}"),
        }
    }
}

/// Returns true for tags that limit who may read a thread.
pub fn restricted_tag(tag: &str) -> bool {
    DANGER_TAGS.contains(&tag) || tag.ends_with(SOCIAL_SUFFIX)
}

/// First reason `state` is unsafe to store, if any.
pub fn assess(state: &ThreadState) -> Option<Danger> {
    if let Some(tag) = state.tags().iter().find(|t| restricted_tag(t)) {
        return Some(Danger::Tag(tag.clone()));
    }
    state
        .iter()
        .find(|m| m.mod_note())
        .map(|m| Danger::ModNote(m.id().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::thread::{Message, ThreadMeta};

    fn state(tags: &[&str]) -> ThreadState {
        ThreadState::new(
            "1",
            ThreadMeta {
                tags: tags.iter().map(ToString::to_string).collect(),
                pages: 1,
                ..ThreadMeta::default()
            },
        )
    }

    #[test]
    fn restricted_tags() {
        assert!(restricted_tag("TCF"));
        assert!(restricted_tag("TCF Lite"));
        assert!(restricted_tag("Moderations"));
        assert!(restricted_tag("Book Club (social)"));
        assert!(!restricted_tag("LUE"));
        assert!(!restricted_tag("tcf"));
        assert!(!restricted_tag("(social) club"));
    }

    #[test]
    fn clean_thread_is_safe() {
        let mut s = state(&["LUE", "Games"]);
        s.append(vec![Message::new("1", "a", "1", "", "hi")]);
        assert_eq!(assess(&s), None);
    }

    #[test]
    fn tag_or_note_is_dangerous() {
        assert_eq!(
            assess(&state(&["LUE", "Moderations"])),
            Some(Danger::Tag(String::from("Moderations")))
        );

        let mut s = state(&["LUE"]);
        s.append(vec![
            Message::new("1", "a", "1", "", "hi"),
            Message::new("2", "m", "2", "", "note").with_mod_note(),
        ]);
        assert_eq!(assess(&s), Some(Danger::ModNote(String::from("2"))));
    }
}
