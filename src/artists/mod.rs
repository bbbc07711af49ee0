//! Artist identity domain: multilingual artist records, the archive
//! cache with its name index and the incremental listing sync.

mod cache;
mod language;
mod models;
mod syncer;

pub use cache::{ArchiveStats, ArtistCache};
pub use language::classify;
pub use models::{AliasRecord, ArtistArchive, ArtistRecord, Language};
pub use syncer::ArtistSyncer;
