//! Engine façade: wires the caches and syncers together and exposes the
//! host application's lifecycle hooks.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::MetadataApi;
use crate::artists::{ArtistCache, ArtistSyncer};
use crate::blob_store::BlobStore;
use crate::config::EngineConfig;
use crate::sync::{SyncError, SyncOutcome};
use crate::tags::{TagCache, TagSyncer};

/// Seed snapshot file names looked up inside the configured seed dir.
pub const SEED_TAG_DICTIONARY: &str = "tag_dictionary.json";
pub const SEED_ARTIST_ARCHIVE: &str = "artist_archive.json";

/// Owns both metadata domains for one host process.
///
/// Constructed once with its dependencies injected; there are no
/// process-wide singletons. The host calls [`on_start`] when it comes
/// to the foreground and [`on_stop`]/[`on_low_memory`] when it leaves
/// it; everything else happens through the cache handles.
///
/// [`on_start`]: MetadataEngine::on_start
/// [`on_stop`]: MetadataEngine::on_stop
/// [`on_low_memory`]: MetadataEngine::on_low_memory
pub struct MetadataEngine {
    tags: Arc<TagCache>,
    artists: Arc<ArtistCache>,
    tag_syncer: Arc<TagSyncer>,
    artist_syncer: Arc<ArtistSyncer>,
    seed_dir: Option<PathBuf>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MetadataEngine {
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn BlobStore>,
        api: Arc<dyn MetadataApi>,
    ) -> Self {
        let tags = Arc::new(TagCache::new(
            store.clone(),
            api.clone(),
            config.tag_cache(),
        ));
        let artists = Arc::new(ArtistCache::new(store.clone()));
        let tag_syncer = Arc::new(TagSyncer::new(
            store.clone(),
            api.clone(),
            tags.clone(),
            config.page_delay(),
        ));
        let artist_syncer = Arc::new(ArtistSyncer::new(
            store,
            api,
            artists.clone(),
            config.page_delay(),
        ));

        Self {
            tags,
            artists,
            tag_syncer,
            artist_syncer,
            seed_dir: config.seed_dir.clone(),
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    pub fn tags(&self) -> &Arc<TagCache> {
        &self.tags
    }

    pub fn artists(&self) -> &Arc<ArtistCache> {
        &self.artists
    }

    /// Load both caches from the store, seeding from the bundled
    /// snapshots on first run. Idempotent.
    pub fn initialize(&self) -> Result<()> {
        let tag_seed = self
            .seed_dir
            .as_ref()
            .map(|dir| dir.join(SEED_TAG_DICTIONARY));
        self.tags.initialize(tag_seed.as_deref())?;

        let artist_seed = self
            .seed_dir
            .as_ref()
            .map(|dir| dir.join(SEED_ARTIST_ARCHIVE));
        self.artists.initialize(artist_seed.as_deref())?;
        Ok(())
    }

    /// Host startup hook: initialize both caches, start the background
    /// resolution worker and trigger one sync per domain. Must be
    /// called from within the tokio runtime.
    pub fn on_start(&self) -> Result<()> {
        self.initialize()?;

        {
            let mut worker = self.worker.lock().unwrap();
            if worker.is_none() {
                *worker = Some(tokio::spawn(
                    self.tags
                        .clone()
                        .run_background_worker(self.cancel.child_token()),
                ));
            }
        }

        let tag_syncer = self.tag_syncer.clone();
        tokio::spawn(async move {
            log_outcome("tag", tag_syncer.sync().await);
        });
        let artist_syncer = self.artist_syncer.clone();
        tokio::spawn(async move {
            log_outcome("artist", artist_syncer.sync().await);
        });
        Ok(())
    }

    /// Host backgrounding hook: make buffered tag updates durable.
    pub fn on_stop(&self) {
        if let Err(err) = self.tags.flush() {
            warn!("Flush on stop failed: {}", err);
        }
    }

    /// Host memory-pressure hook: same flush as [`Self::on_stop`].
    pub fn on_low_memory(&self) {
        if let Err(err) = self.tags.flush() {
            warn!("Flush on low memory failed: {}", err);
        }
    }

    /// Run a tag sync and wait for it.
    pub async fn sync_tags(&self) -> Result<SyncOutcome, SyncError> {
        self.tag_syncer.sync().await
    }

    /// Run an artist sync and wait for it.
    pub async fn sync_artists(&self) -> Result<SyncOutcome, SyncError> {
        self.artist_syncer.sync().await
    }

    /// Stop the background worker. Further queued names are dropped.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

fn log_outcome(domain: &str, result: Result<SyncOutcome, SyncError>) {
    match result {
        Ok(outcome) => debug!("{} sync finished: {:?}", domain, outcome),
        Err(err) => warn!("{} sync failed: {}", domain, err),
    }
}
