//! Client-side metadata synchronization and caching engine for an
//! image-browsing application.
//!
//! Two metadata domains are kept locally available for instant UI
//! rendering: tag classification (tag name to semantic category, for
//! chip coloring) and artist identity (any name or multilingual alias
//! to a canonical artist record, for display-name resolution and
//! autocomplete). The authoritative data lives on a remote paginated
//! API that only this engine queries; incremental syncs advance a
//! persisted high-water mark per domain.

pub mod api;
pub mod artists;
pub mod blob_store;
pub mod config;
pub mod engine;
pub mod sync;
pub mod tags;

// Re-export commonly used types for convenience
pub use api::{HttpMetadataApi, MetadataApi};
pub use blob_store::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use config::{CliConfig, EngineConfig, FileConfig};
pub use engine::MetadataEngine;
pub use sync::{SyncError, SyncOutcome};
