//! Incremental sync of the artist archive from the remote listing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::language::classify;
use super::{AliasRecord, ArtistArchive, ArtistCache, ArtistRecord};
use crate::api::{ArtistDto, MetadataApi};
use crate::blob_store::{keys, BlobStore};
use crate::sync::{advance_mark, load_mark, SyncError, SyncOutcome};

/// Walks the remote artist listing newest-first, assembles the new
/// records into a partial [`ArtistArchive`] and merges it into the
/// [`ArtistCache`] on clean completion.
///
/// A listing record either carries an artist's primary name
/// (`alias_of == None`) or one spelling of an alias; alias spellings
/// are classified by language and folded into the parent's alias list,
/// merging slots when the same alias id appears more than once. URLs
/// from every record contributing to a parent are unioned.
pub struct ArtistSyncer {
    store: Arc<dyn BlobStore>,
    api: Arc<dyn MetadataApi>,
    cache: Arc<ArtistCache>,
    page_delay: Duration,
    running: AtomicBool,
}

impl ArtistSyncer {
    pub fn new(
        store: Arc<dyn BlobStore>,
        api: Arc<dyn MetadataApi>,
        cache: Arc<ArtistCache>,
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
            debug!("Artist sync already in progress");
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let result = self.run().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run(&self) -> Result<SyncOutcome, SyncError> {
        let last_seen = load_mark(self.store.as_ref(), keys::ARTIST_SYNC_MARK);
        debug!("Starting artist sync from mark {}", last_seen);

        let mut staged: BTreeMap<u64, ArtistRecord> = BTreeMap::new();
        let mut candidate: Option<u64> = None;
        let mut highest = 0u64;
        let mut new_records = 0usize;
        let mut page = 1u32;

        loop {
            if page > 1 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let records = self
                .api
                .artist_page(page)
                .await
                .map_err(|source| SyncError::Fetch { page, source })?;

            if records.is_empty() {
                break;
            }

            let mut new_in_page = false;
            for record in records {
                if record.id < last_seen {
                    continue;
                }
                new_in_page = true;
                candidate = Some(candidate.map_or(record.id, |id| id.min(record.id)));
                // An alias implies its parent id, which must be covered
                // by max_id even if the parent record itself is older.
                let parent_id = record.alias_of.unwrap_or(record.id);
                highest = highest.max(record.id).max(parent_id);
                new_records += 1;
                stage_record(&mut staged, record);
            }

            if page == 1 && !new_in_page {
                debug!("Artist listing has nothing newer than mark {}", last_seen);
                return Ok(SyncOutcome::NoNewRecords);
            }
            page += 1;
        }

        if staged.is_empty() {
            return Ok(SyncOutcome::NoNewRecords);
        }

        let mut archive = ArtistArchive {
            max_id: highest,
            artists: staged
                .into_iter()
                .map(|(id, record)| (id.to_string(), record))
                .collect(),
            name_index: BTreeMap::new(),
        };
        archive.rebuild_index();

        self.cache.merge_archive(&archive).map_err(SyncError::Store)?;

        let next_mark = candidate.unwrap_or(last_seen).max(last_seen);
        advance_mark(self.store.as_ref(), keys::ARTIST_SYNC_MARK, next_mark)?;

        info!(
            "Artist sync merged {} records, mark {} -> {}",
            new_records, last_seen, next_mark
        );
        Ok(SyncOutcome::Merged {
            new_records,
            last_seen_id: next_mark,
        })
    }
}

/// Fold one listing record into the staged archive under its parent id.
fn stage_record(staged: &mut BTreeMap<u64, ArtistRecord>, record: ArtistDto) {
    let parent_id = record.alias_of.unwrap_or(record.id);
    let entry = staged.entry(parent_id).or_default();

    match record.alias_of {
        None => entry.name = record.name,
        Some(_) => {
            let language = classify(&record.name);
            if let Some(existing) = entry.aliases.iter_mut().find(|alias| alias.id == record.id) {
                existing.fill(language, record.name);
            } else {
                entry
                    .aliases
                    .push(AliasRecord::new(record.id, language, record.name));
            }
        }
    }

    entry.urls.extend(record.urls);
}
