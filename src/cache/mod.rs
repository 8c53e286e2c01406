pub mod bookmark;
pub mod policy;
pub mod thread;

pub use bookmark::BookmarkCache;
pub use thread::{CacheEntry, FileStore, MemoryStore, NoStore, ThreadCache, ThreadStore};
