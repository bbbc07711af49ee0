//! Incremental sync of the tag dictionary from the remote listing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::{TagCache, TagCategory};
use crate::api::MetadataApi;
use crate::blob_store::{keys, BlobStore};
use crate::sync::{advance_mark, load_mark, SyncError, SyncOutcome};

/// Walks the remote tag listing newest-first and merges everything at
/// or above the high-water mark into the [`TagCache`].
///
/// The walk accumulates records across pages and merges once at the
/// end, so an aborted run merges nothing and leaves the mark where it
/// was. One run at a time per domain; a second trigger while a run is
/// in flight is a silent no-op.
pub struct TagSyncer {
    store: Arc<dyn BlobStore>,
    api: Arc<dyn MetadataApi>,
    cache: Arc<TagCache>,
    page_delay: Duration,
    running: AtomicBool,
}

impl TagSyncer {
    pub fn new(
        store: Arc<dyn BlobStore>,
        api: Arc<dyn MetadataApi>,
        cache: Arc<TagCache>,
        page_delay: Duration,
    ) -> Self {
        Self {
            store,
            api,
            cache,
            page_delay,
            running: AtomicBool::new(false),
        }
    }

    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Tag sync already in progress");
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let result = self.run().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run(&self) -> Result<SyncOutcome, SyncError> {
        let last_seen = load_mark(self.store.as_ref(), keys::TAG_SYNC_MARK);
        debug!("Starting tag sync from mark {}", last_seen);

        let mut staged: HashMap<String, TagCategory> = HashMap::new();
        // Minimum new id: the next mark re-examines the boundary rather
        // than risking a gap.
        let mut candidate: Option<u64> = None;
        let mut page = 1u32;

        loop {
            if page > 1 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let records = self
                .api
                .tag_page(page)
                .await
                .map_err(|source| SyncError::Fetch { page, source })?;

            if records.is_empty() {
                break;
            }

            let mut new_in_page = false;
            for tag in records {
                if tag.id < last_seen {
                    continue;
                }
                new_in_page = true;
                candidate = Some(candidate.map_or(tag.id, |id| id.min(tag.id)));
                staged.insert(tag.name, tag.category);
            }

            if page == 1 && !new_in_page {
                debug!("Tag listing has nothing newer than mark {}", last_seen);
                return Ok(SyncOutcome::NoNewRecords);
            }
            page += 1;
        }

        if staged.is_empty() {
            return Ok(SyncOutcome::NoNewRecords);
        }

        let new_records = staged.len();
        self.cache.add_tags(staged).map_err(SyncError::Store)?;
        // Data must be durable before the mark moves past it.
        self.cache.flush().map_err(SyncError::Store)?;

        let next_mark = candidate.unwrap_or(last_seen).max(last_seen);
        advance_mark(self.store.as_ref(), keys::TAG_SYNC_MARK, next_mark)?;

        info!(
            "Tag sync merged {} records, mark {} -> {}",
            new_records, last_seen, next_mark
        );
        Ok(SyncOutcome::Merged {
            new_records,
            last_seen_id: next_mark,
        })
    }
}
