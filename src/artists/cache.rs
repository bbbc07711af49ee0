//! In-memory artist archive with write-through persistence.
//!
//! Unlike the tag dictionary, archive merges are infrequent batch
//! operations, so every merge is written straight through to the store
//! with no debounce.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{ArtistArchive, ArtistRecord};
use crate::blob_store::{keys, BlobStore};

/// Archive summary for logs and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveStats {
    pub artist_count: usize,
    pub name_count: usize,
    pub max_id: u64,
}

/// Authoritative `artist id -> record` cache with the derived
/// `name/alias -> id` index.
pub struct ArtistCache {
    store: Arc<dyn BlobStore>,
    initialized: AtomicBool,
    state: Mutex<Arc<ArtistArchive>>,
    publisher: watch::Sender<Arc<ArtistArchive>>,
}

impl ArtistCache {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        let empty = Arc::new(ArtistArchive::default());
        let (publisher, _) = watch::channel(empty.clone());
        Self {
            store,
            initialized: AtomicBool::new(false),
            state: Mutex::new(empty),
            publisher,
        }
    }

    /// Load the persisted archive, falling back to the bundled seed on
    /// the first run, then to an empty archive. Idempotent.
    pub fn initialize(&self, seed: Option<&Path>) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let bytes = match self.store.load(keys::ARTIST_ARCHIVE)? {
            Some(bytes) => Some(bytes),
            None => self.copy_seed(seed),
        };

        let archive: ArtistArchive = match bytes {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!("Discarding corrupt artist archive: {}", err);
                ArtistArchive::default()
            }),
            None => ArtistArchive::default(),
        };

        info!(
            "Artist archive loaded: {} artists, max id {}",
            archive.artist_count(),
            archive.max_id
        );
        let archive = Arc::new(archive);
        *self.state.lock().unwrap() = archive.clone();
        self.publisher.send_replace(archive);
        Ok(())
    }

    fn copy_seed(&self, seed: Option<&Path>) -> Option<Vec<u8>> {
        let path = seed?;
        match std::fs::read(path) {
            Ok(bytes) => {
                if let Err(err) = self.store.save(keys::ARTIST_ARCHIVE, &bytes) {
                    warn!("Failed to copy seed archive into store: {}", err);
                }
                Some(bytes)
            }
            Err(err) => {
                debug!("No seed archive at {:?}: {}", path, err);
                None
            }
        }
    }

    /// Latest archive snapshot.
    pub fn archive(&self) -> Arc<ArtistArchive> {
        self.state.lock().unwrap().clone()
    }

    /// Replay-latest subscription for the UI.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ArtistArchive>> {
        self.publisher.subscribe()
    }

    /// Resolve a primary name or any alias spelling to the artist id.
    pub fn lookup_id(&self, name: &str) -> Option<u64> {
        self.archive().lookup_id(name)
    }

    pub fn lookup_record(&self, id: u64) -> Option<ArtistRecord> {
        self.archive().lookup_record(id).cloned()
    }

    /// Batch name resolution; names without a match are omitted.
    pub fn lookup_many(&self, names: &[String]) -> HashMap<String, u64> {
        let archive = self.archive();
        names
            .iter()
            .filter_map(|name| archive.lookup_id(name).map(|id| (name.clone(), id)))
            .collect()
    }

    /// Every known name and alias spelling, for autocomplete.
    pub fn all_names(&self) -> Vec<String> {
        self.archive().all_names().map(str::to_string).collect()
    }

    pub fn stats(&self) -> ArchiveStats {
        let archive = self.archive();
        ArchiveStats {
            artist_count: archive.artist_count(),
            name_count: archive.name_index.len(),
            max_id: archive.max_id,
        }
    }

    /// Deep-merge `incoming` into the archive, publish the result and
    /// write it through to the store.
    pub fn merge_archive(&self, incoming: &ArtistArchive) -> Result<()> {
        let merged = {
            let mut state = self.state.lock().unwrap();
            let merged = Arc::new(state.merged_with(incoming));
            *state = merged.clone();
            self.publisher.send_replace(merged.clone());
            merged
        };

        let bytes = serde_json::to_vec(&*merged).context("Failed to serialize artist archive")?;
        self.store.save(keys::ARTIST_ARCHIVE, &bytes)
    }
}
