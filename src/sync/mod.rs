//! Shared plumbing for the incremental syncers.
//!
//! Each domain keeps a high-water mark: the id boundary already merged
//! into local state. Marks are persisted under their own storage key and
//! written strictly after the data they cover, so a crash between the
//! two writes re-examines the same boundary instead of skipping records.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::ApiError;
use crate::blob_store::BlobStore;

/// Persisted high-water mark for one sync domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMark {
    pub last_seen_id: u64,
    /// When the mark was last advanced. Diagnostic only.
    pub updated_at: DateTime<Utc>,
}

impl Default for SyncMark {
    fn default() -> Self {
        Self {
            last_seen_id: 0,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Result of a completed (non-error) sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another run for this domain was already in flight; nothing done.
    AlreadyRunning,
    /// The listing had nothing newer than the mark.
    NoNewRecords,
    /// New records were merged and the mark advanced.
    Merged {
        new_records: usize,
        last_seen_id: u64,
    },
}

/// Why a sync run aborted. An aborted run merges nothing and leaves the
/// mark untouched; the next trigger retries from the same boundary.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("fetching page {page} failed: {source}")]
    Fetch { page: u32, source: ApiError },
    #[error("persisting sync results failed: {0}")]
    Store(#[from] anyhow::Error),
}

/// Load the mark stored under `key`. A missing or corrupt blob starts
/// the domain over from id 0.
pub fn load_mark(store: &dyn BlobStore, key: &str) -> u64 {
    let bytes = match store.load(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return 0,
        Err(err) => {
            warn!("Failed to load sync mark {}: {}", key, err);
            return 0;
        }
    };
    match serde_json::from_slice::<SyncMark>(&bytes) {
        Ok(mark) => mark.last_seen_id,
        Err(err) => {
            warn!("Discarding corrupt sync mark {}: {}", key, err);
            0
        }
    }
}

/// Persist a new mark under `key`. Callers must have durably written
/// the data the mark covers first.
pub fn advance_mark(store: &dyn BlobStore, key: &str, last_seen_id: u64) -> Result<()> {
    let mark = SyncMark {
        last_seen_id,
        updated_at: Utc::now(),
    };
    let bytes = serde_json::to_vec(&mark).context("Failed to serialize sync mark")?;
    store.save(key, &bytes)
}
