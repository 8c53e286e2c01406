//! Thread state storage and the commit path into it.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    cache::policy::{self, Danger},
    config::{Backend, CacheConfig, CommitMode},
    error::Error,
    models::thread::ThreadState,
    result::Result,
};

/// Backing store for merged thread states.
///
/// `put` is an upsert keyed by thread ID; the last write wins.
///
/// # Errors
///
/// Both methods report backend failures, such as I/O or a corrupt document.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Loads the state stored for `id`.
    async fn get(&self, id: &str) -> Result<Option<ThreadState>>;

    /// Stores `state`, replacing whatever was there.
    async fn put(&self, state: &ThreadState) -> Result<()>;
}

/// A store that holds nothing; every lookup is cold.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

#[async_trait]
impl ThreadStore for NoStore {
    async fn get(&self, _id: &str) -> Result<Option<ThreadState>> {
        Ok(None)
    }

    async fn put(&self, _state: &ThreadState) -> Result<()> {
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    threads: DashMap<String, ThreadState>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored threads.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[async_trait]
impl ThreadStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<ThreadState>> {
        Ok(self.threads.get(id).map(|s| s.value().clone()))
    }

    async fn put(&self, state: &ThreadState) -> Result<()> {
        self.threads.insert(state.id().to_string(), state.clone());
        Ok(())
    }
}

/// Stores each thread as a JSON document in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Uses `dir`, which is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    fn path(&self, id: &str) -> PathBuf {
        let name: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl ThreadStore for FileStore {
    async fn get(&self, id: &str) -> Result<Option<ThreadState>> {
        match tokio::fs::read(self.path(id)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, state: &ThreadState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(state.id());
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(state)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Per-thread mutual exclusion.
///
/// A request holds its thread's lock from cache lookup until its commit lands,
/// so two cold requests for one thread fetch it once.
#[derive(Debug, Clone, Default)]
pub struct ThreadLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadLocks {
    /// Waits for and takes the lock on `id`.
    pub async fn lock(&self, id: &str) -> ThreadGuard {
        let mutex = self
            .locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        ThreadGuard {
            id: id.to_string(),
            locks: self.locks.clone(),
            guard: Some(mutex.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn held(&self) -> usize {
        self.locks.len()
    }
}

/// Held lock on one thread ID; released on drop.
#[derive(Debug)]
pub struct ThreadGuard {
    id: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // nobody else holds or waits on it
        self.locks
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// A working copy of a thread and whether it may be stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The merged state.
    pub state: ThreadState,
    /// Set when the state must stay out of the store.
    pub danger: Option<Danger>,
}

impl CacheEntry {
    /// Runs the policy gate over `state`.
    pub fn assess(state: ThreadState) -> Self {
        let danger = policy::assess(&state);
        CacheEntry { state, danger }
    }
}

/// Handle on the thread store, shared by every request.
#[derive(Clone)]
pub struct ThreadCache {
    store: Arc<dyn ThreadStore>,
    mode: CommitMode,
    locks: ThreadLocks,
}

impl std::fmt::Debug for ThreadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadCache")
            .field("mode", &self.mode)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl ThreadCache {
    /// Wraps `store`.
    pub fn new(store: Arc<dyn ThreadStore>, mode: CommitMode) -> Self {
        ThreadCache {
            store,
            mode,
            locks: ThreadLocks::default(),
        }
    }

    /// Builds the configured backend.
    ///
    /// # Errors
    ///
    /// Fails when the file backend has no directory.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let store: Arc<dyn ThreadStore> = match config.backend {
            Backend::None => Arc::new(NoStore),
            Backend::Memory => Arc::new(MemoryStore::new()),
            Backend::File => {
                let dir = config.directory.as_deref().ok_or_else(|| {
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "file cache needs a directory",
                    ))
                })?;
                Arc::new(FileStore::new(Path::new(dir)))
            }
        };
        Ok(Self::new(store, config.commit))
    }

    /// Takes the per-thread lock for `id`.
    pub async fn lock(&self, id: &str) -> ThreadGuard {
        self.locks.lock(id).await
    }

    /// Last committed state for `id`. A failing store reads as a miss.
    pub async fn get(&self, id: &str) -> Option<ThreadState> {
        match self.store.get(id).await {
            Ok(Some(state)) => {
                log::debug!("cache hit for thread {id} ({} messages)", state.len());
                Some(state)
            }
            Ok(None) => {
                log::debug!("cache miss for thread {id}");
                None
            }
            Err(e) => {
                log::warn!("cache read for thread {id} failed: {e}");
                None
            }
        }
    }

    /// Writes `entry` unless the policy gate flagged it.
    ///
    /// `guard` is released once the write finishes. In [`CommitMode::Detached`]
    /// this returns before the write happens. Returns whether a write was issued.
    pub async fn commit(&self, entry: CacheEntry, guard: ThreadGuard) -> bool {
        if let Some(danger) = entry.danger {
            log::warn!("not caching thread {}: {danger}", entry.state.id());
            return false;
        }

        let store = self.store.clone();
        let state = entry.state;
        match self.mode {
            CommitMode::Detached => {
                tokio::spawn(async move {
                    put(&*store, &state).await;
                    drop(guard);
                });
            }
            CommitMode::Inline => {
                put(&*store, &state).await;
                drop(guard);
            }
        }
        true
    }
}

async fn put(store: &dyn ThreadStore, state: &ThreadState) {
    match store.put(state).await {
        Ok(()) => log::debug!("cached thread {} ({} messages)", state.id(), state.len()),
        Err(e) => log::warn!("caching thread {} failed: {e}", state.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::thread::{Message, ThreadMeta};
    use std::time::Duration;

    fn state(id: &str, tags: &[&str], n: usize) -> ThreadState {
        let mut s = ThreadState::new(
            id,
            ThreadMeta {
                title: String::from("t"),
                tags: tags.iter().map(ToString::to_string).collect(),
                pages: 1,
                ..ThreadMeta::default()
            },
        );
        s.append(
            (1..=n)
                .map(|i| Message::new(i.to_string(), "a", "1", "", "body"))
                .collect(),
        );
        s
    }

    #[tokio::test]
    async fn inline_commit_is_visible() {
        let cache = ThreadCache::new(Arc::new(MemoryStore::new()), CommitMode::Inline);
        let guard = cache.lock("1").await;
        assert!(cache.commit(CacheEntry::assess(state("1", &["LUE"], 3)), guard).await);
        assert_eq!(cache.get("1").await.unwrap().total(), 3);
    }

    #[tokio::test]
    async fn restricted_state_never_stored() {
        let store = Arc::new(MemoryStore::new());
        let cache = ThreadCache::new(store.clone(), CommitMode::Inline);

        let guard = cache.lock("1").await;
        cache.commit(CacheEntry::assess(state("1", &["LUE"], 2)), guard).await;

        let guard = cache.lock("1").await;
        let flagged = CacheEntry::assess(state("1", &["TCF"], 5));
        assert!(flagged.danger.is_some());
        assert!(!cache.commit(flagged, guard).await);

        // still the pre-merge state
        assert_eq!(cache.get("1").await.unwrap().total(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn detached_commit_lands_after_lock_release() {
        let cache = ThreadCache::new(Arc::new(MemoryStore::new()), CommitMode::Detached);
        let guard = cache.lock("9").await;
        assert!(cache.commit(CacheEntry::assess(state("9", &[], 1)), guard).await);
        // the next holder of the lock sees the write
        let _guard = cache.lock("9").await;
        assert_eq!(cache.get("9").await.unwrap().total(), 1);
    }

    #[tokio::test]
    async fn no_store_is_always_cold() {
        let cache = ThreadCache::new(Arc::new(NoStore), CommitMode::Inline);
        let guard = cache.lock("1").await;
        cache.commit(CacheEntry::assess(state("1", &[], 1)), guard).await;
        assert!(cache.get("1").await.is_none());
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("threads"));
        assert!(store.get("12/../x").await.unwrap().is_none());

        store.put(&state("12/../x", &["LUE"], 4)).await.unwrap();
        let back = store.get("12/../x").await.unwrap().unwrap();
        assert_eq!(back.total(), 4);
        assert_eq!(back.tags(), &["LUE"]);
        assert!(dir.path().join("threads").join("12____x.json").exists());
    }

    #[tokio::test]
    async fn file_store_corruption_reads_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("3.json"), b"{nope").await.unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(store.get("3").await, Err(Error::Json(_))));

        let cache = ThreadCache::new(Arc::new(store), CommitMode::Inline);
        assert!(cache.get("3").await.is_none());
    }

    #[test]
    fn file_backend_needs_directory() {
        let config = CacheConfig {
            backend: Backend::File,
            ..CacheConfig::default()
        };
        assert!(ThreadCache::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn locks_serialize_and_clean_up() {
        let locks = ThreadLocks::default();
        let first = locks.lock("5").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("5").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap();
        assert_eq!(locks.held(), 0);
    }
}
