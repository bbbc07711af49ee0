//! In-memory tag dictionary with write-coalescing persistence.
//!
//! The in-memory snapshot, not the durable copy, is the UI's source of
//! truth: category updates land in the snapshot (and the watch channel)
//! immediately, while durable writes are debounced to at most one per
//! interval. `flush` bypasses the debounce and is wired to the host's
//! stop/low-memory hooks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::TagCategory;
use crate::api::MetadataApi;
use crate::blob_store::{keys, BlobStore};

/// Latest merged view of the dictionary, shared with subscribers.
pub type TagSnapshot = Arc<HashMap<String, TagCategory>>;

/// How long the background worker sleeps while priority work or a
/// foreground detail view has precedence.
const BACKGROUND_BACKOFF: Duration = Duration::from_millis(50);

/// Pause between background items so priority work can interleave.
const BACKGROUND_ITEM_DELAY: Duration = Duration::from_millis(120);

#[derive(Debug, Clone)]
pub struct TagCacheConfig {
    /// Minimum interval between durable dictionary writes.
    pub write_debounce: Duration,
}

impl Default for TagCacheConfig {
    fn default() -> Self {
        Self {
            write_debounce: Duration::from_millis(800),
        }
    }
}

/// State guarded by the cache's single lock. The lock is held for map
/// and buffer manipulation only, never across network or disk I/O.
struct TagState {
    map: TagSnapshot,
    /// Updates applied to `map` but not yet durably written.
    pending: HashMap<String, TagCategory>,
    /// Names with a priority lookup in flight, to dedup overlapping calls.
    in_flight: HashSet<String>,
    last_write: Option<Instant>,
}

#[derive(Default)]
struct BackgroundQueue {
    items: VecDeque<String>,
    queued: HashSet<String>,
}

/// Authoritative `tag -> category` cache.
pub struct TagCache {
    store: Arc<dyn BlobStore>,
    api: Arc<dyn MetadataApi>,
    debounce: Duration,
    initialized: AtomicBool,
    state: Mutex<TagState>,
    publisher: watch::Sender<TagSnapshot>,
    /// Count of priority batches currently in flight; the background
    /// worker defers while this is non-zero.
    priority_in_flight: AtomicUsize,
    detail_view_active: AtomicBool,
    queue: Mutex<BackgroundQueue>,
    queue_notify: Notify,
}

impl TagCache {
    pub fn new(
        store: Arc<dyn BlobStore>,
        api: Arc<dyn MetadataApi>,
        config: TagCacheConfig,
    ) -> Self {
        let empty: TagSnapshot = Arc::new(HashMap::new());
        let (publisher, _) = watch::channel(empty.clone());
        Self {
            store,
            api,
            debounce: config.write_debounce,
            initialized: AtomicBool::new(false),
            state: Mutex::new(TagState {
                map: empty,
                pending: HashMap::new(),
                in_flight: HashSet::new(),
                last_write: None,
            }),
            publisher,
            priority_in_flight: AtomicUsize::new(0),
            detail_view_active: AtomicBool::new(false),
            queue: Mutex::new(BackgroundQueue::default()),
            queue_notify: Notify::new(),
        }
    }

    /// Load the persisted dictionary and publish it. On the first run
    /// (no persisted blob) the bundled seed snapshot is copied into the
    /// store and used instead. Idempotent.
    pub fn initialize(&self, seed: Option<&Path>) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let bytes = match self.store.load(keys::TAG_DICTIONARY)? {
            Some(bytes) => Some(bytes),
            None => self.copy_seed(seed),
        };

        let map: HashMap<String, TagCategory> = match bytes {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!("Discarding corrupt tag dictionary: {}", err);
                HashMap::new()
            }),
            None => HashMap::new(),
        };

        info!("Tag dictionary loaded with {} entries", map.len());
        let snapshot: TagSnapshot = Arc::new(map);
        self.state.lock().unwrap().map = snapshot.clone();
        self.publisher.send_replace(snapshot);
        Ok(())
    }

    fn copy_seed(&self, seed: Option<&Path>) -> Option<Vec<u8>> {
        let path = seed?;
        match std::fs::read(path) {
            Ok(bytes) => {
                if let Err(err) = self.store.save(keys::TAG_DICTIONARY, &bytes) {
                    warn!("Failed to copy seed dictionary into store: {}", err);
                }
                Some(bytes)
            }
            Err(err) => {
                debug!("No seed dictionary at {:?}: {}", path, err);
                None
            }
        }
    }

    /// Latest merged view, including not-yet-flushed pending writes.
    pub fn snapshot(&self) -> TagSnapshot {
        self.state.lock().unwrap().map.clone()
    }

    /// Replay-latest subscription for the UI.
    pub fn subscribe(&self) -> watch::Receiver<TagSnapshot> {
        self.publisher.subscribe()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deprioritize background resolution while a detail screen is in
    /// the foreground. Priority resolution and syncing are unaffected.
    pub fn set_detail_view_active(&self, active: bool) {
        self.detail_view_active.store(active, Ordering::SeqCst);
    }

    /// Merge category updates into the cache.
    ///
    /// Updates are visible in the snapshot immediately; the durable
    /// write is skipped if one happened within the debounce interval
    /// (the pending buffer carries the updates until the next write).
    pub fn add_tags(&self, new_tags: HashMap<String, TagCategory>) -> Result<()> {
        if new_tags.is_empty() {
            return Ok(());
        }

        let to_persist = {
            let mut state = self.state.lock().unwrap();
            state.pending.extend(new_tags.clone());

            let mut merged = (*state.map).clone();
            merged.extend(new_tags);
            state.map = Arc::new(merged);
            self.publisher.send_replace(state.map.clone());

            let due = state
                .last_write
                .map_or(true, |at| at.elapsed() >= self.debounce);
            if due {
                state.pending.clear();
                state.last_write = Some(Instant::now());
                Some(state.map.clone())
            } else {
                None
            }
        };

        match to_persist {
            Some(map) => self.persist(&map),
            None => Ok(()),
        }
    }

    /// Write any buffered updates through to the store, bypassing the
    /// debounce.
    pub fn flush(&self) -> Result<()> {
        let to_persist = {
            let mut state = self.state.lock().unwrap();
            if state.pending.is_empty() {
                None
            } else {
                state.pending.clear();
                state.last_write = Some(Instant::now());
                Some(state.map.clone())
            }
        };

        match to_persist {
            Some(map) => self.persist(&map),
            None => Ok(()),
        }
    }

    fn persist(&self, map: &TagSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec(&**map).context("Failed to serialize tag dictionary")?;
        self.store.save(keys::TAG_DICTIONARY, &bytes)
    }

    /// Resolve categories for names currently visible to the user,
    /// ahead of any background work.
    ///
    /// Names already in the snapshot or with a lookup in flight are
    /// skipped; the rest are fetched concurrently and merged as one
    /// batch. A lookup miss or failure records `Unknown` so the UI has
    /// a defined (if degraded) category; a later sync overwrites it.
    pub async fn resolve_priority(&self, names: &HashSet<String>) {
        let mut to_fetch = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            for name in names {
                if !state.map.contains_key(name) && state.in_flight.insert(name.clone()) {
                    to_fetch.push(name.clone());
                }
            }
        }
        if to_fetch.is_empty() {
            return;
        }

        self.priority_in_flight.fetch_add(1, Ordering::SeqCst);

        let lookups = to_fetch.iter().map(|name| async {
            let category = self.lookup_category(name).await;
            (name.clone(), category)
        });
        let resolved: HashMap<String, TagCategory> = join_all(lookups).await.into_iter().collect();

        if let Err(err) = self.add_tags(resolved) {
            warn!("Failed to persist priority-resolved tags: {}", err);
        }

        {
            let mut state = self.state.lock().unwrap();
            for name in &to_fetch {
                state.in_flight.remove(name);
            }
        }
        self.priority_in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Queue names discovered during bulk content paging for
    /// low-priority resolution by the background worker.
    pub fn queue_background(&self, names: &HashSet<String>) {
        let snapshot = self.snapshot();
        let mut added = false;
        {
            let mut queue = self.queue.lock().unwrap();
            for name in names {
                if snapshot.contains_key(name) || !queue.queued.insert(name.clone()) {
                    continue;
                }
                queue.items.push_back(name.clone());
                added = true;
            }
        }
        if added {
            self.queue_notify.notify_one();
        }
    }

    /// Background resolution loop. Processes one queued name at a
    /// time, deferring whenever priority work is outstanding or a
    /// detail view is active, and checks for cancellation between
    /// items. Spawned once by the engine.
    pub async fn run_background_worker(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let Some(name) = self.next_queued(&cancel).await else {
                return;
            };

            while self.priority_in_flight.load(Ordering::SeqCst) > 0
                || self.detail_view_active.load(Ordering::SeqCst)
            {
                tokio::select! {
                    _ = tokio::time::sleep(BACKGROUND_BACKOFF) => {}
                    _ = cancel.cancelled() => return,
                }
            }

            if self.is_known_or_in_flight(&name) {
                continue;
            }

            let category = self.lookup_category(&name).await;
            if let Err(err) = self.add_tags(HashMap::from([(name, category)])) {
                warn!("Failed to persist background-resolved tag: {}", err);
            }

            tokio::select! {
                _ = tokio::time::sleep(BACKGROUND_ITEM_DELAY) => {}
                _ = cancel.cancelled() => return,
            }
        }
    }

    async fn next_queued(&self, cancel: &CancellationToken) -> Option<String> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            let popped = {
                let mut queue = self.queue.lock().unwrap();
                let name = queue.items.pop_front();
                if let Some(name) = &name {
                    queue.queued.remove(name);
                }
                name
            };
            if popped.is_some() {
                return popped;
            }
            tokio::select! {
                _ = self.queue_notify.notified() => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    fn is_known_or_in_flight(&self, name: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.map.contains_key(name) || state.in_flight.contains(name)
    }

    async fn lookup_category(&self, name: &str) -> TagCategory {
        match self.api.tag_by_name(name).await {
            Ok(candidates) => candidates
                .into_iter()
                .find(|tag| tag.name == name)
                .map(|tag| tag.category)
                .unwrap_or(TagCategory::Unknown),
            Err(err) => {
                warn!("Tag lookup for '{}' failed: {}", name, err);
                TagCategory::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ArtistDto, TagDto};
    use crate::blob_store::MemoryBlobStore;
    use async_trait::async_trait;
    use std::io::Write;

    /// Scripted lookup API: answers `tag_by_name` from a fixed table
    /// and records every call. Unlisted names return no candidates.
    struct LookupApi {
        categories: HashMap<String, TagCategory>,
        calls: Mutex<Vec<String>>,
        delay: Duration,
        /// Names whose lookup blocks until this flips to true.
        gate: Option<(Vec<String>, watch::Receiver<bool>)>,
    }

    impl LookupApi {
        fn new(categories: &[(&str, TagCategory)]) -> Self {
            Self {
                categories: categories
                    .iter()
                    .map(|(name, category)| (name.to_string(), *category))
                    .collect(),
                calls: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                gate: None,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl crate::api::MetadataApi for LookupApi {
        async fn tag_page(&self, _page: u32) -> Result<Vec<TagDto>, ApiError> {
            Ok(vec![])
        }

        async fn tag_by_name(&self, name: &str) -> Result<Vec<TagDto>, ApiError> {
            self.calls.lock().unwrap().push(name.to_string());
            if let Some((gated, release)) = &self.gate {
                if gated.iter().any(|g| g == name) {
                    let mut release = release.clone();
                    release.wait_for(|open| *open).await.unwrap();
                }
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self
                .categories
                .get(name)
                .map(|category| {
                    vec![TagDto {
                        id: 1,
                        name: name.to_string(),
                        category: *category,
                        count: 0,
                        ambiguous: false,
                    }]
                })
                .unwrap_or_default())
        }

        async fn artist_page(&self, _page: u32) -> Result<Vec<ArtistDto>, ApiError> {
            Ok(vec![])
        }
    }

    fn cache_with(api: LookupApi, debounce: Duration) -> (Arc<TagCache>, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryBlobStore::new());
        let cache = Arc::new(TagCache::new(
            store.clone(),
            Arc::new(api),
            TagCacheConfig {
                write_debounce: debounce,
            },
        ));
        (cache, store)
    }

    fn persisted_dictionary(store: &MemoryBlobStore) -> HashMap<String, TagCategory> {
        store
            .load(keys::TAG_DICTIONARY)
            .unwrap()
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_initialize_seeds_from_bundled_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let seed_path = dir.path().join("tag_dictionary.json");
        let mut seed = std::fs::File::create(&seed_path).unwrap();
        seed.write_all(br#"{"landscape":0,"some_artist":1}"#).unwrap();

        let (cache, store) = cache_with(LookupApi::new(&[]), Duration::from_millis(800));
        cache.initialize(Some(&seed_path)).unwrap();

        let snapshot = cache.snapshot();
        assert_eq!(snapshot["landscape"], TagCategory::General);
        assert_eq!(snapshot["some_artist"], TagCategory::Artist);
        // The seed was copied into the store for subsequent runs.
        assert!(store.load(keys::TAG_DICTIONARY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (cache, _store) = cache_with(LookupApi::new(&[]), Duration::from_millis(800));
        cache.initialize(None).unwrap();
        cache
            .add_tags(HashMap::from([("a".to_string(), TagCategory::Style)]))
            .unwrap();

        cache.initialize(None).unwrap();
        assert_eq!(cache.snapshot()["a"], TagCategory::Style);
    }

    #[tokio::test]
    async fn test_corrupt_dictionary_falls_back_to_empty() {
        let (cache, store) = cache_with(LookupApi::new(&[]), Duration::from_millis(800));
        store.save(keys::TAG_DICTIONARY, b"{not json").unwrap();

        cache.initialize(None).unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_writes_are_debounced_until_flush() {
        let (cache, store) = cache_with(LookupApi::new(&[]), Duration::from_secs(3600));
        cache.initialize(None).unwrap();

        // First write is durable immediately (nothing was ever written).
        cache
            .add_tags(HashMap::from([("first".to_string(), TagCategory::General)]))
            .unwrap();
        assert!(persisted_dictionary(&store).contains_key("first"));

        // Second write lands in the snapshot but stays buffered.
        cache
            .add_tags(HashMap::from([("second".to_string(), TagCategory::Artist)]))
            .unwrap();
        assert_eq!(cache.snapshot()["second"], TagCategory::Artist);
        assert!(!persisted_dictionary(&store).contains_key("second"));

        cache.flush().unwrap();
        assert!(persisted_dictionary(&store).contains_key("second"));

        // Nothing pending: flush is a no-op.
        cache.flush().unwrap();
    }

    #[tokio::test]
    async fn test_priority_resolution_defines_snapshot_entries() {
        let api = LookupApi::new(&[("some_artist", TagCategory::Artist)]);
        let (cache, _store) = cache_with(api, Duration::from_millis(800));
        cache.initialize(None).unwrap();

        let names = HashSet::from(["some_artist".to_string(), "no_such_tag".to_string()]);
        cache.resolve_priority(&names).await;

        let snapshot = cache.snapshot();
        assert_eq!(snapshot["some_artist"], TagCategory::Artist);
        // A miss still defines the entry, as the degraded fallback.
        assert_eq!(snapshot["no_such_tag"], TagCategory::Unknown);
    }

    #[tokio::test]
    async fn test_priority_skips_known_names() {
        let store = Arc::new(MemoryBlobStore::new());
        let api = Arc::new(LookupApi::new(&[]));
        let cache = Arc::new(TagCache::new(store, api.clone(), TagCacheConfig::default()));
        cache.initialize(None).unwrap();
        cache
            .add_tags(HashMap::from([("known".to_string(), TagCategory::General)]))
            .unwrap();

        cache
            .resolve_priority(&HashSet::from(["known".to_string()]))
            .await;

        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_priority_calls_share_one_lookup() {
        let mut api = LookupApi::new(&[("tag", TagCategory::General)]);
        api.delay = Duration::from_millis(50);
        let store = Arc::new(MemoryBlobStore::new());
        let api = Arc::new(api);
        let cache = Arc::new(TagCache::new(
            store,
            api.clone(),
            TagCacheConfig::default(),
        ));
        cache.initialize(None).unwrap();

        let names = HashSet::from(["tag".to_string()]);
        tokio::join!(cache.resolve_priority(&names), cache.resolve_priority(&names));

        assert_eq!(api.calls().len(), 1);
        assert_eq!(cache.snapshot()["tag"], TagCategory::General);
    }

    #[tokio::test]
    async fn test_background_worker_resolves_queued_names() {
        let store = Arc::new(MemoryBlobStore::new());
        let api = Arc::new(LookupApi::new(&[("queued", TagCategory::Copyright)]));
        let cache = Arc::new(TagCache::new(store, api.clone(), TagCacheConfig::default()));
        cache.initialize(None).unwrap();

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(cache.clone().run_background_worker(cancel.clone()));

        cache.queue_background(&HashSet::from(["queued".to_string()]));

        let deadline = Instant::now() + Duration::from_secs(2);
        while !cache.snapshot().contains_key("queued") {
            assert!(Instant::now() < deadline, "background item never resolved");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.snapshot()["queued"], TagCategory::Copyright);

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_background_never_fetches_known_names() {
        let store = Arc::new(MemoryBlobStore::new());
        let api = Arc::new(LookupApi::new(&[]));
        let cache = Arc::new(TagCache::new(store, api.clone(), TagCacheConfig::default()));
        cache.initialize(None).unwrap();
        cache
            .add_tags(HashMap::from([("known".to_string(), TagCategory::General)]))
            .unwrap();

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(cache.clone().run_background_worker(cancel.clone()));

        cache.queue_background(&HashSet::from(["known".to_string()]));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(api.calls().is_empty());

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_background_defers_to_priority_work() {
        let (release_tx, release_rx) = watch::channel(false);
        let mut api = LookupApi::new(&[
            ("visible", TagCategory::Artist),
            ("bulk", TagCategory::General),
        ]);
        api.gate = Some((vec!["visible".to_string()], release_rx));
        let store = Arc::new(MemoryBlobStore::new());
        let api = Arc::new(api);
        let cache = Arc::new(TagCache::new(store, api.clone(), TagCacheConfig::default()));
        cache.initialize(None).unwrap();

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(cache.clone().run_background_worker(cancel.clone()));

        // A priority batch goes in flight and blocks on the gate.
        let priority_cache = cache.clone();
        let priority = tokio::spawn(async move {
            priority_cache
                .resolve_priority(&HashSet::from(["visible".to_string()]))
                .await;
        });
        let deadline = Instant::now() + Duration::from_secs(2);
        while api.calls().is_empty() {
            assert!(Instant::now() < deadline, "priority lookup never started");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Background work queued now must wait for the priority batch.
        cache.queue_background(&HashSet::from(["bulk".to_string()]));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(api.calls(), vec!["visible".to_string()]);

        release_tx.send(true).unwrap();
        priority.await.unwrap();
        assert_eq!(cache.snapshot()["visible"], TagCategory::Artist);

        let deadline = Instant::now() + Duration::from_secs(2);
        while !cache.snapshot().contains_key("bulk") {
            assert!(Instant::now() < deadline, "background item never resolved");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_detail_view_pauses_background_work() {
        let store = Arc::new(MemoryBlobStore::new());
        let api = Arc::new(LookupApi::new(&[("bulk", TagCategory::General)]));
        let cache = Arc::new(TagCache::new(store, api.clone(), TagCacheConfig::default()));
        cache.initialize(None).unwrap();
        cache.set_detail_view_active(true);

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(cache.clone().run_background_worker(cancel.clone()));

        cache.queue_background(&HashSet::from(["bulk".to_string()]));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(api.calls().is_empty());

        cache.set_detail_view_active(false);
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cache.snapshot().contains_key("bulk") {
            assert!(Instant::now() < deadline, "background item never resolved");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribers_see_latest_snapshot() {
        let (cache, _store) = cache_with(LookupApi::new(&[]), Duration::from_millis(800));
        cache.initialize(None).unwrap();

        let receiver = cache.subscribe();
        cache
            .add_tags(HashMap::from([("a".to_string(), TagCategory::Character)]))
            .unwrap();

        assert_eq!(receiver.borrow()["a"], TagCategory::Character);

        // A late subscriber replays the latest value.
        let late = cache.subscribe();
        assert_eq!(late.borrow()["a"], TagCategory::Character);
    }
}
