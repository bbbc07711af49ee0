//! Durable key/value storage for the engine's persisted blobs.
//!
//! The engine owns four logical blobs: the tag dictionary, the artist
//! archive and one sync mark per domain. Each is serialized as JSON and
//! stored under a stable key. Implementations must treat a missing key
//! as `Ok(None)`, never as an error; corrupt content is a caller
//! concern (the caches fall back to seed/empty state on parse failure).

mod file_store;
mod memory_store;

pub use file_store::FileBlobStore;
pub use memory_store::MemoryBlobStore;

use anyhow::Result;

/// Storage keys for the engine's persisted state.
pub mod keys {
    /// The `tag name -> category code` dictionary.
    pub const TAG_DICTIONARY: &str = "tag_dictionary";
    /// High-water mark of the tag listing sync.
    pub const TAG_SYNC_MARK: &str = "tag_sync_mark";
    /// The artist archive (records plus name index).
    pub const ARTIST_ARCHIVE: &str = "artist_archive";
    /// High-water mark of the artist listing sync.
    pub const ARTIST_SYNC_MARK: &str = "artist_sync_mark";
}

/// Opaque blob storage, one blob per logical key.
pub trait BlobStore: Send + Sync {
    /// Load the blob stored under `key`. A key that was never written
    /// yields `Ok(None)`.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob stored under `key`. The write must be atomic:
    /// a reader never observes a partially written blob.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;
}
